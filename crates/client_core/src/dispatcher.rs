use std::sync::Arc;

use shared::protocol::ProvisionRequest;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::{
    authority::StoreAuthority,
    busy_gate::BusyGate,
    error::{ActionError, ActionKind},
    event_log::EventLog,
    reconciler::Reconciler,
    ClientEvent,
};

const PROVISION_STARTED: &str = "Initiating multi-tenant provisioning...";
const PROVISION_DISPATCHED: &str = "Provisioning command successfully dispatched to Kubernetes.";
const PROVISION_FAILED: &str = "ERROR: Provisioning failed. Check backend logs.";
const PROVISION_FAILED_ALERT: &str = "Provisioning failed";
const DELETE_FAILED_ALERT: &str = "Delete failed";

/// A delete that has been asked for but not yet confirmed.
///
/// Nothing has been sent or logged at this point. Dropping or declining the
/// proposal leaves no trace.
#[derive(Debug)]
pub struct DeleteProposal {
    name: String,
}

impl DeleteProposal {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prompt(&self) -> String {
        format!(
            "Are you sure you want to purge {} and all its resources?",
            self.name
        )
    }

    pub fn confirm(self) -> ConfirmedDelete {
        ConfirmedDelete { name: self.name }
    }

    pub fn decline(self) {
        debug!(store = %self.name, "delete declined");
    }
}

/// Only obtainable through [`DeleteProposal::confirm`].
#[derive(Debug)]
pub struct ConfirmedDelete {
    name: String,
}

impl ConfirmedDelete {
    pub fn name(&self) -> &str {
        &self.name
    }
}

pub struct ActionDispatcher {
    authority: Arc<dyn StoreAuthority>,
    reconciler: Arc<Reconciler>,
    log: Arc<EventLog>,
    gate: BusyGate,
    events: broadcast::Sender<ClientEvent>,
}

impl ActionDispatcher {
    pub fn new(
        authority: Arc<dyn StoreAuthority>,
        reconciler: Arc<Reconciler>,
        log: Arc<EventLog>,
        events: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            authority,
            reconciler,
            log,
            gate: BusyGate::new(),
            events,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    /// Asks the authority for a new store.
    ///
    /// Returns [`ActionError::Busy`] without touching the network or the log if
    /// a previous create has not settled yet.
    pub async fn create(&self) -> Result<(), ActionError> {
        let Some(permit) = self.gate.try_acquire() else {
            debug!("create dropped; provisioning already in flight");
            return Err(ActionError::Busy);
        };

        self.log.append(PROVISION_STARTED).await;
        let request = ProvisionRequest::default();
        info!(engine = ?request.engine, "dispatching provision request");

        match self.authority.provision(&request).await {
            Ok(()) => {
                self.log.append(PROVISION_DISPATCHED).await;
                drop(permit);
                self.reconciler.refresh().await;
                Ok(())
            }
            Err(source) => {
                error!("provision request failed: {source:#}");
                self.log.append(PROVISION_FAILED).await;
                self.alert(PROVISION_FAILED_ALERT);
                drop(permit);
                Err(ActionError::Failed {
                    action: ActionKind::Provision,
                    source,
                })
            }
        }
    }

    pub fn propose_delete(&self, name: impl Into<String>) -> Result<DeleteProposal, ActionError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ActionError::EmptyName);
        }
        Ok(DeleteProposal { name })
    }

    /// Tears down a confirmed store. Deletes are not serialized against each other.
    pub async fn delete(&self, confirmed: ConfirmedDelete) -> Result<(), ActionError> {
        let ConfirmedDelete { name } = confirmed;

        self.log
            .append(format!("Initiating teardown for {name}..."))
            .await;
        info!(store = %name, "dispatching delete request");

        match self.authority.delete_store(&name).await {
            Ok(()) => {
                self.log
                    .append(format!("Cleanup complete: {name} removed."))
                    .await;
                self.reconciler.refresh().await;
                Ok(())
            }
            Err(source) => {
                error!(store = %name, "delete request failed: {source:#}");
                self.log
                    .append(format!("ERROR: Failed to delete {name}."))
                    .await;
                self.alert(DELETE_FAILED_ALERT);
                Err(ActionError::Failed {
                    action: ActionKind::Delete,
                    source,
                })
            }
        }
    }

    fn alert(&self, message: &str) {
        let _ = self.events.send(ClientEvent::Alert(message.to_string()));
    }
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
