/// Application name, used in delivered messages.
pub const APP_NAME: &str = "Dnevnik";

/// Minimum accepted token length.
pub const TOKEN_MIN_LEN: usize = 8;

/// Maximum accepted token length.
pub const TOKEN_MAX_LEN: usize = 128;

/// Number of random bytes behind a freshly generated token (192 bits).
pub const TOKEN_ENTROPY_BYTES: usize = 24;

/// Default lifetime of a pending login confirmation, in seconds.
pub const DEFAULT_CHALLENGE_TTL_SECS: i64 = 300;

/// Timeout for a single outbound notification request, in seconds.
pub const NOTIFY_TIMEOUT_SECS: u64 = 10;

/// Default HTTP API port.
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Callback action prefix that approves a pending login.
pub const ACTION_CONFIRM_LOGIN: &str = "confirm_login";

/// Callback action prefix that denies a pending login.
pub const ACTION_DENY_LOGIN: &str = "deny_login";
