use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, Method},
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use dnevnik_confirm::{
    AuditRecorder, BindingManager, Dispatcher, LoginConfirmations, SharedDb,
};
use dnevnik_shared::protocol::{Ack, InboundUpdate};
use dnevnik_store::{AuditEvent, StoreError, VerificationStatus};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};

#[derive(Clone)]
pub struct AppState {
    pub db: SharedDb,
    pub bindings: BindingManager,
    pub logins: LoginConfirmations,
    pub dispatcher: Dispatcher,
    pub audit: AuditRecorder,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/webhook/telegram", post(telegram_webhook))
        .route("/auth/challenge", post(auth_challenge))
        .route("/auth/challenge/:token", get(challenge_status))
        .route("/auth/challenge/:token/finalize", post(challenge_finalize))
        .route("/bindings/redeem", post(redeem_binding))
        .route("/admin/bindings/:user_id", delete(admin_unbind))
        .route("/admin/audit/:user_id", get(admin_audit))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct ChallengeRequest {
    user_id: i64,
    origin_addr: String,
}

#[derive(Serialize)]
struct ChallengeResponse {
    required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct ChallengeStatusResponse {
    status: VerificationStatus,
}

#[derive(Serialize)]
struct FinalizeResponse {
    user_id: i64,
    username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct RedeemRequest {
    user_id: i64,
    token: String,
}

#[derive(Serialize)]
struct RedeemResponse {
    bound: bool,
    chat_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
}

#[derive(Serialize)]
struct UnbindResponse {
    removed: usize,
}

#[derive(Deserialize)]
struct AuditQuery {
    limit: Option<u32>,
}

/// Wording for polls that hit a missing or consumed token. Pollers never
/// see which of the two it was.
const TEXT_EXPIRED_OR_USED: &str = "Confirmation expired or already used";

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Inbound callback endpoint for the external messaging channel.
///
/// Always answers HTTP 200 with an `{ok, message}` acknowledgement; an
/// unparseable body counts as an unrecognized payload, not a fault.
async fn telegram_webhook(State(state): State<AppState>, body: axum::body::Bytes) -> Json<Ack> {
    let update: InboundUpdate = serde_json::from_slice(&body).unwrap_or_default();
    Json(state.dispatcher.dispatch(update).await)
}

/// Auth-integration entry point: decide whether this login attempt needs
/// out-of-band confirmation and create the pending challenge if so.
async fn auth_challenge(
    State(state): State<AppState>,
    Json(req): Json<ChallengeRequest>,
) -> Result<Json<ChallengeResponse>, ServerError> {
    let user = {
        let db = state.db.lock().await;
        db.get_user(req.user_id).map_err(|e| match e {
            StoreError::NotFound => ServerError::NotFound("User not found".into()),
            other => ServerError::Internal(other.to_string()),
        })?
    };

    if !state.logins.should_challenge(&user, &req.origin_addr) {
        return Ok(Json(ChallengeResponse {
            required: false,
            token: None,
            expires_at: None,
        }));
    }

    let ttl = Duration::seconds(state.config.challenge_ttl_secs);
    let verification = state.logins.create_challenge(&user, &req.origin_addr, ttl).await?;

    info!(user_id = user.id, origin = %req.origin_addr, "login challenge created");

    Ok(Json(ChallengeResponse {
        required: true,
        token: Some(verification.token),
        expires_at: Some(verification.expires_at),
    }))
}

/// Polled by the login page until the status turns terminal.
async fn challenge_status(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ChallengeStatusResponse>, ServerError> {
    match state.logins.query_status(&token).await? {
        Some(status) => Ok(Json(ChallengeStatusResponse { status })),
        None => Err(ServerError::NotFound(TEXT_EXPIRED_OR_USED.into())),
    }
}

/// Called by the login page after observing `confirmed`; completes the
/// session hand-off and records the verified origin as the user's last
/// known login origin.
async fn challenge_finalize(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<FinalizeResponse>, ServerError> {
    let user = state.logins.finalize(&token).await?;

    {
        let db = state.db.lock().await;
        if let Ok(verification) = db.get_verification_by_token(&token) {
            if let Some(origin) = verification.origin_addr.as_deref() {
                if let Err(e) = db.set_last_login_addr(user.id, origin) {
                    tracing::warn!(user_id = user.id, error = %e, "failed to record login origin");
                }
            }
        }
    }

    info!(user_id = user.id, "login finalized after confirmation");

    Ok(Json(FinalizeResponse {
        user_id: user.id,
        username: user.username,
        display_name: user.display_name,
    }))
}

async fn redeem_binding(
    State(state): State<AppState>,
    Json(req): Json<RedeemRequest>,
) -> Result<Json<RedeemResponse>, ServerError> {
    let outcome = state.bindings.redeem_token(req.user_id, &req.token).await?;

    info!(user_id = req.user_id, chat_id = %outcome.chat_id, "chat identity bound");

    Ok(Json(RedeemResponse {
        bound: true,
        chat_id: outcome.chat_id,
        display_name: outcome.display_name,
    }))
}

async fn admin_unbind(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<UnbindResponse>, ServerError> {
    verify_admin_token(&headers, &state.config)?;

    let removed = state.bindings.unbind_all_for_user(user_id).await?;

    info!(user_id, removed, "admin removed chat bindings");
    Ok(Json(UnbindResponse { removed }))
}

async fn admin_audit(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditEvent>>, ServerError> {
    verify_admin_token(&headers, &state.config)?;

    let limit = query.limit.unwrap_or(50).min(500);
    let events = state
        .audit
        .list_for_user(user_id, limit)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    Ok(Json(events))
}

fn verify_admin_token(headers: &HeaderMap, config: &ServerConfig) -> Result<(), ServerError> {
    let Some(ref expected) = config.admin_token else {
        return Err(ServerError::Forbidden(
            "Admin API is disabled (no ADMIN_TOKEN configured)".into(),
        ));
    };

    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or(auth);

    // Constant-time comparison to prevent timing attacks on admin token.
    use subtle::ConstantTimeEq;
    let token_bytes = token.as_bytes();
    let expected_bytes = expected.as_bytes();
    if token_bytes.len() != expected_bytes.len()
        || token_bytes.ct_eq(expected_bytes).unwrap_u8() != 1
    {
        return Err(ServerError::Forbidden("Invalid admin token".into()));
    }

    Ok(())
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_check_requires_configured_token() {
        let config = ServerConfig::default();
        let headers = HeaderMap::new();
        assert!(verify_admin_token(&headers, &config).is_err());
    }

    #[test]
    fn admin_check_accepts_matching_bearer() {
        let config = ServerConfig {
            admin_token: Some("secret-token".into()),
            ..ServerConfig::default()
        };

        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer secret-token".parse().unwrap());
        assert!(verify_admin_token(&headers, &config).is_ok());

        let mut wrong = HeaderMap::new();
        wrong.insert("authorization", "Bearer wrong".parse().unwrap());
        assert!(verify_admin_token(&wrong, &config).is_err());
    }
}
