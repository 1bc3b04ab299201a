//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` so it can be handed directly to the
//! HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A user account, reduced to the fields the confirmation subsystem needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    /// Whether the user opted into out-of-band login confirmation.
    pub two_factor_enabled: bool,
    /// External chat id of the bound messaging identity, if any.
    pub telegram_chat_id: Option<String>,
    /// Origin address of the last successful login, if any.
    pub last_login_addr: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Whether the user can receive out-of-band prompts at all.
    pub fn has_bound_chat(&self) -> bool {
        self.telegram_chat_id.is_some()
    }
}

// ---------------------------------------------------------------------------
// Chat binding
// ---------------------------------------------------------------------------

/// The association between an external chat identity and a user account.
///
/// A row starts unbound (`user_id` NULL) holding a one-time token; a
/// successful redemption sets `user_id` and `bound_at` exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatBinding {
    pub id: i64,
    /// External chat identifier (stringly typed, channel-specific).
    pub chat_id: String,
    /// One-time binding token.
    pub token: String,
    /// Owning user once the token has been redeemed.
    pub user_id: Option<i64>,
    /// Display name of the chat identity, if the channel reported one.
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub bound_at: Option<DateTime<Utc>>,
}

impl ChatBinding {
    /// A binding is consumed once it has an owner.
    pub fn is_bound(&self) -> bool {
        self.user_id.is_some()
    }
}

// ---------------------------------------------------------------------------
// Login verification
// ---------------------------------------------------------------------------

/// Lifecycle status of a [`LoginVerification`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Confirmed,
    Denied,
    Expired,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Confirmed => "confirmed",
            VerificationStatus::Denied => "denied",
            VerificationStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(VerificationStatus::Pending),
            "confirmed" => Some(VerificationStatus::Confirmed),
            "denied" => Some(VerificationStatus::Denied),
            "expired" => Some(VerificationStatus::Expired),
            _ => None,
        }
    }

    /// Terminal statuses admit no further transition.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, VerificationStatus::Pending)
    }
}

/// What a verification guards. Only login confirmation exists today; the
/// column keeps its discriminator role for future kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VerificationKind {
    Login,
}

impl VerificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationKind::Login => "login",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "login" => Some(VerificationKind::Login),
            _ => None,
        }
    }
}

/// A pending (or settled) out-of-band login confirmation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginVerification {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub kind: VerificationKind,
    pub status: VerificationStatus,
    /// Network origin of the login attempt being confirmed.
    pub origin_addr: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Number of callback attempts that touched this record.
    pub attempts: i64,
}

// ---------------------------------------------------------------------------
// Audit event
// ---------------------------------------------------------------------------

/// A security event in the append-only audit log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditEvent {
    pub id: i64,
    pub user_id: Option<i64>,
    pub event_type: String,
    pub origin_addr: Option<String>,
    pub client_info: Option<String>,
    /// Opaque JSON payload.
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An audit event about to be written (no id or timestamp yet).
#[derive(Debug, Clone, Default)]
pub struct NewAuditEvent {
    pub user_id: Option<i64>,
    pub event_type: String,
    pub origin_addr: Option<String>,
    pub client_info: Option<String>,
    pub details: Option<String>,
}
