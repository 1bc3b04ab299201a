//! # dnevnik-store
//!
//! SQLite persistence for the chat-binding and login-confirmation
//! subsystem. The crate exposes a synchronous [`Database`] handle that
//! wraps a `rusqlite::Connection` and provides typed helpers for every
//! table.
//!
//! Conditional writes (claiming a binding token, transitioning a pending
//! verification) are expressed as single guarded `UPDATE` statements whose
//! affected-row count decides the outcome, so two racing callers always
//! produce exactly one winner regardless of how connections are shared.

pub mod audit;
pub mod bindings;
pub mod database;
pub mod migrations;
pub mod models;
pub mod users;
pub mod verifications;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
