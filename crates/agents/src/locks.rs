use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Registry = Arc<Mutex<HashMap<String, Entry>>>;

struct Entry {
    lock: Arc<AsyncMutex<()>>,
    /// Turns holding or waiting on `lock`.
    users: usize,
}

/// One async mutex per user id. Entries exist only while a turn holds or waits on them.
#[derive(Clone, Default)]
pub struct UserLocks {
    inner: Registry,
}

/// Held for the whole turn. Fields drop in order, so the mutex is released before the
/// registry entry can be removed.
pub struct UserGuard {
    _guard: OwnedMutexGuard<()>,
    _lease: Lease,
}

/// Counts one user of a registry entry and gives it back on drop, including when the
/// waiting future is cancelled before the mutex is acquired.
struct Lease {
    key: String,
    registry: Registry,
}

impl Drop for Lease {
    fn drop(&mut self) {
        let mut registry = self.registry.lock();
        if let Some(entry) = registry.get_mut(&self.key) {
            entry.users -= 1;
            if entry.users == 0 {
                registry.remove(&self.key);
            }
        }
    }
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, user_id: &str) -> UserGuard {
        let lock = {
            let mut registry = self.inner.lock();
            let entry = registry.entry(user_id.to_string()).or_insert_with(|| Entry {
                lock: Arc::default(),
                users: 0,
            });
            entry.users += 1;
            entry.lock.clone()
        };
        let lease = Lease {
            key: user_id.to_string(),
            registry: self.inner.clone(),
        };
        let guard = lock.lock_owned().await;

        UserGuard {
            _guard: guard,
            _lease: lease,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
