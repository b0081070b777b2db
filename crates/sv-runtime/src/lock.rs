use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

#[derive(Debug, Default)]
struct Slot {
    gate: Arc<AsyncMutex<()>>,
    registered: usize,
}

type SlotMap = Arc<Mutex<HashMap<String, Slot>>>;

/// Serializes async operations per resource key. Operations on one key run one at a time in
/// arrival order; distinct keys never wait on each other.
#[derive(Debug, Clone, Default)]
pub struct LockManager {
    slots: SlotMap,
}

/// Keeps a key's slot alive while an operation is queued or running on it.
struct Registration {
    slots: SlotMap,
    key: String,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get_mut(&self.key) {
            slot.registered = slot.registered.saturating_sub(1);
            if slot.registered == 0 {
                slots.remove(&self.key);
            }
        }
    }
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, key: &str) -> (Registration, Arc<AsyncMutex<()>>) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = slots.entry(key.to_string()).or_default();
        slot.registered += 1;
        let gate = Arc::clone(&slot.gate);
        (
            Registration {
                slots: Arc::clone(&self.slots),
                key: key.to_string(),
            },
            gate,
        )
    }

    /// Runs `operation` once every earlier operation on `key` has finished, successfully or
    /// not. The operation's own result is handed back untouched.
    pub async fn acquire<F, Fut, T>(&self, key: &str, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let (_registration, gate) = self.register(key);
        let _guard = gate.lock().await;
        debug!(key, "lock acquired");
        let result = operation().await;
        debug!(key, "lock released");
        result
    }

    /// Keys with at least one queued or running operation.
    pub fn in_flight_keys(&self) -> Vec<String> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let mut keys = slots.keys().cloned().collect::<Vec<_>>();
        keys.sort();
        keys
    }
}
