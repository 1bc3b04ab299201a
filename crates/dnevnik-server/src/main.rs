//! # dnevnik-server
//!
//! HTTP surface for the out-of-band confirmation subsystem.
//!
//! This binary provides:
//! - **Inbound webhook** for the external messaging channel (binding
//!   requests and approve/deny button callbacks)
//! - **Auth integration API** the login page uses to create, poll, and
//!   finalize login confirmations
//! - **Binding redemption** endpoint for the profile page
//! - **Admin API** for audit review and unbinding, behind a bearer token
//! - **Per-IP rate limiting** to protect against abuse

mod api;
mod config;
mod error;
mod rate_limit;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use dnevnik_confirm::{
    shared_db, AuditRecorder, BindingManager, Dispatcher, LoginConfirmations,
};
use dnevnik_notify::{NoopNotifier, Notifier, TelegramNotifier};
use dnevnik_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::rate_limit::RateLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,dnevnik_server=debug")),
        )
        .init();

    info!("Starting Dnevnik confirmation server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        instance = %config.instance_name,
        db_path = %config.db_path.display(),
        challenge_ttl_secs = config.challenge_ttl_secs,
        admin_enabled = config.admin_token.is_some(),
        "Loaded configuration"
    );

    // The notification channel must be configured at startup; the dev
    // override swaps in a no-op notifier instead.
    let notifier: Arc<dyn Notifier> = match config.telegram_bot_token.as_deref() {
        Some(token) => Arc::new(TelegramNotifier::new(token)),
        None if config.allow_no_notifier => {
            tracing::warn!("no notification channel configured; deliveries will be dropped");
            Arc::new(NoopNotifier)
        }
        None => anyhow::bail!(
            "TELEGRAM_BOT_TOKEN is not set; set it or start with ALLOW_NO_NOTIFIER=true"
        ),
    };

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let db = shared_db(Database::open_at(&config.db_path)?);

    let audit = AuditRecorder::new(db.clone());
    let bindings = BindingManager::new(db.clone(), notifier.clone(), audit.clone());
    let logins = LoginConfirmations::new(db.clone(), notifier.clone(), audit.clone());
    let dispatcher = Dispatcher::new(bindings.clone(), logins.clone(), notifier.clone());

    let rate_limiter = RateLimiter::default();

    let app_state = AppState {
        db: db.clone(),
        bindings,
        logins,
        dispatcher,
        audit,
        rate_limiter: rate_limiter.clone(),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic rate limiter cleanup (every 5 minutes, evict buckets idle >10 min)
    let rl = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            rl.purge_stale(600.0).await;
        }
    });

    // Hygiene sweep for overdue pending verifications. Expiry is enforced
    // lazily on every touch; this only keeps the table tidy between polls.
    let sweep_db = db.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            let db = sweep_db.lock().await;
            match db.expire_overdue_verifications(chrono::Utc::now()) {
                Ok(swept) if swept > 0 => {
                    tracing::debug!(swept, "hygiene sweep expired verifications")
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "hygiene sweep failed"),
            }
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    let http_addr = config.http_addr;
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
