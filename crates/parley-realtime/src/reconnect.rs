//! Reconnection policy and attempt bookkeeping.
//!
//! The policy answers "how long until attempt N" and "is attempt N allowed".
//! [`Reconnector`] adds the mutable part: the attempt counter, the single
//! pending-timer flag, and the terminal exhausted flag.

use std::time::Duration;

use parley_core::backoff::exponential_delay;

use crate::config::RealtimeConfig;

/// Bounded exponential backoff.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Automatic attempts allowed before giving up.
    pub max_attempts: u32,
    /// Delay for attempt 1, in milliseconds.
    pub base_delay_ms: u64,
    /// Cap for any delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl ReconnectPolicy {
    /// Delay before the 1-indexed `attempt`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        exponential_delay(attempt, self.base_delay_ms, self.max_delay_ms)
    }

    /// Whether the 1-indexed `attempt` is within budget.
    pub fn allows(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }
}

impl From<&RealtimeConfig> for ReconnectPolicy {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }
}

/// Outcome of asking for a reconnect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Schedule {
    /// Arm a timer for `delay`; this is attempt number `attempt`.
    Retry {
        /// 1-indexed attempt number.
        attempt: u32,
        /// Delay before the attempt.
        delay: Duration,
    },
    /// A timer is already armed; nothing to do.
    AlreadyPending,
    /// The budget just ran out. Report it.
    Exhausted,
    /// The budget ran out earlier and was already reported.
    AlreadyExhausted,
}

/// Mutable reconnect state owned by the connection state machine.
#[derive(Debug)]
pub struct Reconnector {
    policy: ReconnectPolicy,
    attempts: u32,
    pending: bool,
    exhausted: bool,
}

impl Reconnector {
    /// Fresh state for `policy`.
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            pending: false,
            exhausted: false,
        }
    }

    /// Request the next attempt.
    pub fn schedule(&mut self) -> Schedule {
        if self.exhausted {
            return Schedule::AlreadyExhausted;
        }
        if self.pending {
            return Schedule::AlreadyPending;
        }
        let attempt = self.attempts.saturating_add(1);
        if !self.policy.allows(attempt) {
            self.exhausted = true;
            return Schedule::Exhausted;
        }
        self.attempts = attempt;
        self.pending = true;
        Schedule::Retry {
            attempt,
            delay: self.policy.next_delay(attempt),
        }
    }

    /// The armed timer fired.
    pub fn timer_fired(&mut self) {
        self.pending = false;
    }

    /// Disarm the pending timer, if any. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        std::mem::replace(&mut self.pending, false)
    }

    /// A connection opened: the budget starts over.
    pub fn on_connected(&mut self) {
        self.attempts = 0;
        self.pending = false;
        self.exhausted = false;
    }

    /// Explicit reset of an exhausted (or partially used) budget.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.exhausted = false;
    }

    /// Attempts scheduled since the last successful connection.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether a retry timer is armed.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Whether the budget ran out.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// The policy in use.
    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
