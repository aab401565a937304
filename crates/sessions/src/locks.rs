use std::sync::Arc;

use {dashmap::DashMap, tokio::sync::Mutex};

use crate::key::SessionKey;

/// Per-session critical sections.
///
/// Turn processing is a read-modify-write on the session row; two
/// near-simultaneous replies on one thread must not both match against a
/// stale pending state. Callers acquire the session's mutex for the whole
/// turn. Different sessions proceed concurrently.
#[derive(Default)]
pub struct SessionLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lock_for(&self, key: &SessionKey) -> Arc<Mutex<()>> {
        let entry = self.locks.entry(key.to_string()).or_default();
        Arc::clone(&entry)
    }
}
