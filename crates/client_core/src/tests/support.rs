use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use shared::{domain::Store, protocol::ProvisionRequest};
use tokio::{
    net::TcpListener,
    sync::{oneshot, Semaphore},
};

use crate::authority::StoreAuthority;

pub(crate) fn store(name: &str, status: &str) -> Store {
    Store {
        name: name.to_string(),
        status: status.to_string(),
        created: Some("2024-01-01T00:00:00Z".parse().expect("timestamp")),
    }
}

/// Scripted in-memory authority. Requests can be held open until released.
#[derive(Default)]
pub(crate) struct FakeAuthority {
    stores: Mutex<Vec<Store>>,
    list_error: Mutex<Option<String>>,
    provision_error: Mutex<Option<String>>,
    delete_error: Mutex<Option<String>>,
    hold_list: bool,
    list_waiters: Mutex<Vec<Option<oneshot::Sender<()>>>>,
    provision_gate: Option<Semaphore>,
    list_calls: AtomicUsize,
    provision_calls: AtomicUsize,
    provision_requests: Mutex<Vec<ProvisionRequest>>,
    deleted: Mutex<Vec<String>>,
}

impl FakeAuthority {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_stores(stores: Vec<Store>) -> Self {
        let fake = Self::new();
        fake.set_stores(stores);
        fake
    }

    pub(crate) fn holding_list(mut self) -> Self {
        self.hold_list = true;
        self
    }

    pub(crate) fn holding_provision(mut self) -> Self {
        self.provision_gate = Some(Semaphore::new(0));
        self
    }

    pub(crate) fn set_stores(&self, stores: Vec<Store>) {
        *self.stores.lock().expect("stores lock") = stores;
        *self.list_error.lock().expect("list lock") = None;
    }

    pub(crate) fn fail_list(&self, reason: &str) {
        *self.list_error.lock().expect("list lock") = Some(reason.to_string());
    }

    pub(crate) fn fail_provision(&self, reason: &str) {
        *self.provision_error.lock().expect("provision lock") = Some(reason.to_string());
    }

    pub(crate) fn clear_provision_failure(&self) {
        *self.provision_error.lock().expect("provision lock") = None;
    }

    pub(crate) fn fail_delete(&self, reason: &str) {
        *self.delete_error.lock().expect("delete lock") = Some(reason.to_string());
    }

    /// Lets the `call`-th list request (zero-based, in dispatch order) return.
    pub(crate) fn release_list_call(&self, call: usize) {
        let waiter = self
            .list_waiters
            .lock()
            .expect("waiters lock")
            .get_mut(call)
            .and_then(Option::take)
            .expect("no such held list call");
        let _ = waiter.send(());
    }

    pub(crate) fn release_all_lists(&self) {
        for waiter in self.list_waiters.lock().expect("waiters lock").iter_mut() {
            if let Some(waiter) = waiter.take() {
                let _ = waiter.send(());
            }
        }
    }

    pub(crate) fn release_provision(&self) {
        self.provision_gate
            .as_ref()
            .expect("provision is not held")
            .add_permits(1);
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn provision_calls(&self) -> usize {
        self.provision_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn provision_requests(&self) -> Vec<ProvisionRequest> {
        self.provision_requests.lock().expect("requests lock").clone()
    }

    pub(crate) fn deleted(&self) -> Vec<String> {
        self.deleted.lock().expect("deleted lock").clone()
    }

    async fn pass(gate: &Option<Semaphore>) {
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }
    }

    async fn hold_list_call(&self) {
        if !self.hold_list {
            return;
        }
        let (tx, rx) = oneshot::channel();
        self.list_waiters.lock().expect("waiters lock").push(Some(tx));
        let _ = rx.await;
    }
}

#[async_trait]
impl StoreAuthority for FakeAuthority {
    async fn list_stores(&self) -> Result<Vec<Store>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        // Snapshot the scripted answer at dispatch time, like a server would.
        let answer = match self.list_error.lock().expect("list lock").clone() {
            Some(reason) => Err(anyhow!(reason)),
            None => Ok(self.stores.lock().expect("stores lock").clone()),
        };
        self.hold_list_call().await;
        answer
    }

    async fn provision(&self, request: &ProvisionRequest) -> Result<()> {
        self.provision_calls.fetch_add(1, Ordering::SeqCst);
        self.provision_requests
            .lock()
            .expect("requests lock")
            .push(*request);
        Self::pass(&self.provision_gate).await;
        match self.provision_error.lock().expect("provision lock").clone() {
            Some(reason) => Err(anyhow!(reason)),
            None => Ok(()),
        }
    }

    async fn delete_store(&self, name: &str) -> Result<()> {
        if let Some(reason) = self.delete_error.lock().expect("delete lock").clone() {
            return Err(anyhow!(reason));
        }
        self.deleted.lock().expect("deleted lock").push(name.to_string());
        self.stores
            .lock()
            .expect("stores lock")
            .retain(|store| store.name != name);
        Ok(())
    }
}

/// Polls `condition` until it holds, failing the test after two seconds.
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[derive(Clone, Default)]
pub(crate) struct AuthorityServerState {
    pub(crate) stores: Arc<tokio::sync::Mutex<Vec<Store>>>,
    pub(crate) provision_bodies: Arc<tokio::sync::Mutex<Vec<serde_json::Value>>>,
    pub(crate) deleted: Arc<tokio::sync::Mutex<Vec<String>>>,
    /// When set, `POST /provision` waits for a permit before answering.
    pub(crate) provision_gate: Option<Arc<Semaphore>>,
    pub(crate) failing: bool,
}

async fn list_stores_handler(
    State(state): State<AuthorityServerState>,
) -> Result<Json<Vec<Store>>, StatusCode> {
    if state.failing {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    Ok(Json(state.stores.lock().await.clone()))
}

async fn provision_handler(
    State(state): State<AuthorityServerState>,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    state.provision_bodies.lock().await.push(body);
    if let Some(gate) = &state.provision_gate {
        if let Ok(permit) = gate.acquire().await {
            permit.forget();
        }
    }
    if state.failing {
        return StatusCode::CONFLICT;
    }
    StatusCode::ACCEPTED
}

async fn delete_store_handler(
    State(state): State<AuthorityServerState>,
    Path(name): Path<String>,
) -> StatusCode {
    if state.failing {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    let mut stores = state.stores.lock().await;
    let before = stores.len();
    stores.retain(|store| store.name != name);
    if stores.len() == before {
        return StatusCode::NOT_FOUND;
    }
    state.deleted.lock().await.push(name);
    StatusCode::NO_CONTENT
}

/// Serves the authority's REST contract on an ephemeral local port.
pub(crate) async fn spawn_authority_server(state: AuthorityServerState) -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new()
        .route("/stores", get(list_stores_handler))
        .route("/stores/:name", delete(delete_store_handler))
        .route("/provision", post(provision_handler))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}
