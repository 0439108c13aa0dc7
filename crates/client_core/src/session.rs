use std::{sync::Arc, time::Duration};

use anyhow::Result;
use shared::domain::Store;
use tokio::sync::{broadcast, Mutex};

use crate::{
    authority::{HttpAuthority, StoreAuthority},
    dispatcher::{ActionDispatcher, ConfirmedDelete, DeleteProposal},
    error::ActionError,
    event_log::{EventLog, LogEntry},
    poller::{Poller, POLL_PERIOD},
    reconciler::{Reconciler, RefreshOutcome},
    ClientEvent,
};

/// One operator session: the store snapshot, the activity log, the busy flag
/// and the poller that keeps the snapshot fresh.
///
/// All state starts empty and lives until the session is dropped.
pub struct StoreSession {
    reconciler: Arc<Reconciler>,
    dispatcher: ActionDispatcher,
    log: Arc<EventLog>,
    poller: Mutex<Option<Poller>>,
    poll_period: Duration,
    events: broadcast::Sender<ClientEvent>,
}

impl StoreSession {
    /// Creates an idle session; call [`StoreSession::start_polling`] to begin
    /// reconciling.
    pub fn new(authority: Arc<dyn StoreAuthority>) -> Arc<Self> {
        Self::with_poll_period(authority, POLL_PERIOD)
    }

    pub(crate) fn with_poll_period(
        authority: Arc<dyn StoreAuthority>,
        poll_period: Duration,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        let log = Arc::new(EventLog::new(events.clone()));
        let reconciler = Arc::new(Reconciler::new(Arc::clone(&authority), events.clone()));
        let dispatcher = ActionDispatcher::new(
            authority,
            Arc::clone(&reconciler),
            Arc::clone(&log),
            events.clone(),
        );
        Arc::new(Self {
            reconciler,
            dispatcher,
            log,
            poller: Mutex::new(None),
            poll_period,
            events,
        })
    }

    /// Creates a session and starts its poller.
    pub async fn init(authority: Arc<dyn StoreAuthority>) -> Arc<Self> {
        let session = Self::new(authority);
        session.start_polling().await;
        session
    }

    pub async fn connect(api_base: &str, timeout: Option<Duration>) -> Result<Arc<Self>> {
        let authority = HttpAuthority::new(api_base, timeout)?;
        Ok(Self::init(Arc::new(authority)).await)
    }

    /// Starts the poller unless one is already running for this session.
    pub async fn start_polling(&self) {
        let mut poller = self.poller.lock().await;
        if poller.as_ref().is_some_and(Poller::is_running) {
            return;
        }
        *poller = Some(Poller::start(Arc::clone(&self.reconciler), self.poll_period));
    }

    /// Stops the poller. Idempotent; the session stays usable for one-off calls.
    pub async fn dispose(&self) {
        if let Some(poller) = self.poller.lock().await.take() {
            poller.stop();
        }
    }

    pub async fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .await
            .as_ref()
            .is_some_and(Poller::is_running)
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        self.reconciler.refresh().await
    }

    pub async fn create(&self) -> Result<(), ActionError> {
        self.dispatcher.create().await
    }

    pub fn propose_delete(&self, name: impl Into<String>) -> Result<DeleteProposal, ActionError> {
        self.dispatcher.propose_delete(name)
    }

    pub async fn delete(&self, confirmed: ConfirmedDelete) -> Result<(), ActionError> {
        self.dispatcher.delete(confirmed).await
    }

    pub async fn stores(&self) -> Vec<Store> {
        self.reconciler.stores().await
    }

    pub async fn logs(&self) -> Vec<LogEntry> {
        self.log.entries().await
    }

    pub fn is_busy(&self) -> bool {
        self.dispatcher.is_busy()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
