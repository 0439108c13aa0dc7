use chrono::Local;
use shared::domain::Store;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn store_line(store: &Store) -> String {
    let marker = if store.is_active() { '●' } else { '○' };
    let created = store.created.map_or_else(
        || "unknown".to_string(),
        |created| created.with_timezone(&Local).format(DATE_FORMAT).to_string(),
    );
    format!(
        "{marker} {:<24} {:<14} created {created}",
        store.name,
        store.status.to_uppercase(),
    )
}

/// Remembers the last snapshot shown so repeated identical polls stay quiet.
#[derive(Default)]
pub struct SnapshotTracker {
    last: Option<Vec<Store>>,
}

impl SnapshotTracker {
    /// Returns true when `stores` differs from what was last shown.
    pub fn observe(&mut self, stores: &[Store]) -> bool {
        if self.last.as_deref() == Some(stores) {
            return false;
        }
        self.last = Some(stores.to_vec());
        true
    }
}

pub fn store_table(stores: &[Store]) -> String {
    if stores.is_empty() {
        return "No active store instances found.".to_string();
    }
    stores
        .iter()
        .map(store_line)
        .collect::<Vec<_>>()
        .join("\n")
}
