use thiserror::Error;

use dnevnik_store::StoreError;

/// Errors from binding, challenge, and audit-read operations that are not
/// part of a more specific taxonomy.
#[derive(Error, Debug)]
pub enum ConfirmError {
    /// Store failure underneath a primary operation.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Why a token redemption was rejected.
///
/// The `Display` texts are the user-visible reasons; callers surface them
/// verbatim.
#[derive(Error, Debug)]
pub enum BindError {
    #[error("Invalid token format")]
    InvalidFormat,

    #[error("Token not found")]
    NotFound,

    #[error("Token already used")]
    AlreadyUsed,

    #[error("Failed to bind token")]
    Store(#[source] StoreError),
}

/// Why finalizing a confirmed login failed.
#[derive(Error, Debug)]
pub enum FinalizeError {
    /// The verification is missing or not in the `confirmed` state.
    #[error("Login confirmation is expired or already used")]
    NotConfirmed,

    /// The verification is confirmed but its owner no longer exists.
    #[error("User not found")]
    UserNotFound,

    #[error("Store error: {0}")]
    Store(#[source] StoreError),
}
