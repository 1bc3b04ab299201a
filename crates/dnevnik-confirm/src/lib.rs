//! # dnevnik-confirm
//!
//! The out-of-band confirmation core: binding one-time tokens that link an
//! external chat identity to a user account, the login-verification state
//! machine, the append-only audit recorder, and the dispatcher that routes
//! inbound webhook payloads to the right component.
//!
//! Every component is stateless apart from the shared persisted store; the
//! only concurrency-control boundaries are the store's conditional writes.
//! Notifier and audit failures are absorbed where they happen and never
//! roll back or skip a state transition.

pub mod audit;
pub mod binding;
pub mod dispatch;
pub mod login;

mod error;

#[cfg(test)]
pub(crate) mod testutil;

use std::sync::Arc;

use tokio::sync::Mutex;

use dnevnik_store::Database;

pub use audit::{events, AuditRecorder};
pub use binding::{BindOutcome, BindingManager};
pub use dispatch::Dispatcher;
pub use error::{BindError, ConfirmError, FinalizeError};
pub use login::{Decision, LoginConfirmations};

/// The store handle shared by every component and request context.
pub type SharedDb = Arc<Mutex<Database>>;

/// Wrap a freshly opened [`Database`] for shared use.
pub fn shared_db(db: Database) -> SharedDb {
    Arc::new(Mutex::new(db))
}
