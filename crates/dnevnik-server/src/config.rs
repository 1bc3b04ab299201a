//! Server configuration loaded from environment variables.
//!
//! All settings except the bot token have defaults so the server can start
//! with near-zero configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use dnevnik_shared::constants::{DEFAULT_CHALLENGE_TTL_SECS, DEFAULT_HTTP_PORT};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Filesystem path of the SQLite database.
    /// Env: `DB_PATH`
    /// Default: `./dnevnik.db`
    pub db_path: PathBuf,

    /// Telegram bot token used for outbound notifications.
    /// Env: `TELEGRAM_BOT_TOKEN`
    /// Default: unset. Startup fails without it unless
    /// `ALLOW_NO_NOTIFIER` is set.
    pub telegram_bot_token: Option<String>,

    /// Allow starting without any notification channel (development only;
    /// prompts and tokens are then silently undeliverable).
    /// Env: `ALLOW_NO_NOTIFIER` (true/false)
    /// Default: `false`
    pub allow_no_notifier: bool,

    /// Lifetime of a pending login confirmation, in seconds.
    /// Env: `CHALLENGE_TTL_SECS`
    /// Default: `300`
    pub challenge_ttl_secs: i64,

    /// Admin API bearer token. Required to access /admin/* endpoints.
    /// Env: `ADMIN_TOKEN`
    /// Default: empty (admin API disabled).
    pub admin_token: Option<String>,

    /// Human-readable name for this instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"Dnevnik"`
    pub instance_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            db_path: PathBuf::from("./dnevnik.db"),
            telegram_bot_token: None,
            allow_no_notifier: false,
            challenge_ttl_secs: DEFAULT_CHALLENGE_TTL_SECS,
            admin_token: None,
            instance_name: "Dnevnik".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(path) = std::env::var("DB_PATH") {
            config.db_path = PathBuf::from(path);
        }

        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            if !token.is_empty() {
                config.telegram_bot_token = Some(token);
            }
        }

        if let Ok(val) = std::env::var("ALLOW_NO_NOTIFIER") {
            config.allow_no_notifier = val == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("CHALLENGE_TTL_SECS") {
            match val.parse::<i64>() {
                Ok(secs) if secs > 0 => config.challenge_ttl_secs = secs,
                _ => {
                    tracing::warn!(value = %val, "Invalid CHALLENGE_TTL_SECS, using default");
                }
            }
        }

        if let Ok(token) = std::env::var("ADMIN_TOKEN") {
            if !token.is_empty() {
                config.admin_token = Some(token);
            }
        }

        if let Ok(name) = std::env::var("INSTANCE_NAME") {
            config.instance_name = name;
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}
