use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
};

use shared::domain::Store;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

use crate::{authority::StoreAuthority, ClientEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The snapshot was replaced with a list of this many stores.
    Replaced(usize),
    /// A refresh issued later had already been applied; this response was dropped.
    Superseded,
    /// The fetch failed and the previous snapshot was kept.
    Failed,
    /// Another refresh was still in flight, so none was issued.
    Skipped,
}

#[derive(Default)]
struct Snapshot {
    generation: u64,
    stores: Vec<Store>,
}

/// Keeps the local store list in step with the authority.
///
/// Every successful fetch replaces the whole list. There is no diffing, so a
/// store missing from one response is indistinguishable from a deleted store
/// until a later response brings it back.
pub struct Reconciler {
    authority: Arc<dyn StoreAuthority>,
    snapshot: RwLock<Snapshot>,
    issued: AtomicU64,
    in_flight: AtomicUsize,
    events: broadcast::Sender<ClientEvent>,
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Reconciler {
    pub fn new(authority: Arc<dyn StoreAuthority>, events: broadcast::Sender<ClientEvent>) -> Self {
        Self {
            authority,
            snapshot: RwLock::new(Snapshot::default()),
            issued: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            events,
        }
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        let _in_flight = InFlight::enter(&self.in_flight);
        self.fetch_and_apply().await
    }

    /// Like [`Reconciler::refresh`], but does nothing while another refresh is
    /// still outstanding.
    pub async fn refresh_if_idle(&self) -> RefreshOutcome {
        if self
            .in_flight
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("store refresh already in flight; skipping");
            return RefreshOutcome::Skipped;
        }
        let _in_flight = InFlight(&self.in_flight);
        self.fetch_and_apply().await
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) > 0
    }

    pub async fn stores(&self) -> Vec<Store> {
        self.snapshot.read().await.stores.clone()
    }

    async fn fetch_and_apply(&self) -> RefreshOutcome {
        let generation = self.issued.fetch_add(1, Ordering::AcqRel) + 1;

        let stores = match self.authority.list_stores().await {
            Ok(stores) => stores,
            Err(err) => {
                warn!(generation, "store list fetch failed: {err:#}");
                return RefreshOutcome::Failed;
            }
        };

        let count = stores.len();
        {
            let mut snapshot = self.snapshot.write().await;
            if generation < snapshot.generation {
                debug!(
                    generation,
                    applied = snapshot.generation,
                    "dropping superseded store list"
                );
                return RefreshOutcome::Superseded;
            }
            snapshot.generation = generation;
            snapshot.stores = stores.clone();
            // Published under the lock so observers see replacements in order.
            let _ = self.events.send(ClientEvent::StoresReplaced(stores));
        }
        debug!(generation, count, "store snapshot replaced");
        RefreshOutcome::Replaced(count)
    }
}

#[cfg(test)]
#[path = "tests/reconciler_tests.rs"]
mod tests;
