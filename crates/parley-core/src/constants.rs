//! Package-level constants.

/// Current version of Parley (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name.
pub const NAME: &str = "parley";

/// WebSocket close code for a clean, intentional shutdown (RFC 6455 §7.4.1).
pub const CLOSE_NORMAL: u16 = 1000;

/// WebSocket close code reported when the connection dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;
