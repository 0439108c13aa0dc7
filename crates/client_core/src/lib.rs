//! Client-side view of remotely provisioned stores.
//!
//! [`StoreSession`] owns the local snapshot, the activity log and the create
//! gate. A [`Poller`] keeps the snapshot in step with the [`StoreAuthority`];
//! the [`ActionDispatcher`] sends create and delete requests and refreshes the
//! snapshot once they succeed.

use shared::domain::Store;

pub mod authority;
pub mod busy_gate;
pub mod dispatcher;
pub mod error;
pub mod event_log;
pub mod poller;
pub mod reconciler;
mod session;

pub use authority::{HttpAuthority, StoreAuthority};
pub use busy_gate::{BusyGate, BusyPermit};
pub use dispatcher::{ActionDispatcher, ConfirmedDelete, DeleteProposal};
pub use error::{ActionError, ActionKind};
pub use event_log::{EventLog, LogEntry};
pub use poller::{Poller, POLL_PERIOD};
pub use reconciler::{Reconciler, RefreshOutcome};
pub use session::StoreSession;

#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The local snapshot was replaced wholesale with this list.
    StoresReplaced(Vec<Store>),
    Logged(LogEntry),
    /// An action failed and the operator should be interrupted.
    Alert(String),
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
