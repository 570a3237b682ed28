//! Reconnect backoff calculation.
//!
//! Pure, sync-only math. The realtime driver owns the timers; this module
//! only answers "how long until attempt N".

use std::time::Duration;

/// Default base delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
/// Default maximum delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
/// Default number of automatic reconnect attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Exponential delay for a 1-indexed attempt.
///
/// Formula: `min(max_delay, base_delay * 2^(attempt - 1))`. Attempt 0 is
/// treated like attempt 1.
#[must_use]
pub fn exponential_delay_ms(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    let exponent = attempt.saturating_sub(1).min(31);
    base_delay_ms
        .saturating_mul(1u64 << exponent)
        .min(max_delay_ms)
}

/// [`exponential_delay_ms`] as a [`Duration`].
#[must_use]
pub fn exponential_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> Duration {
    Duration::from_millis(exponential_delay_ms(attempt, base_delay_ms, max_delay_ms))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
