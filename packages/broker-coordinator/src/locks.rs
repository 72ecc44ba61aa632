// ABOUTME: Per-sandbox lock map — lazy creation, reference-counted teardown
// ABOUTME: mirrors the Arc<RwLock<HashMap<...>>> bookkeeping shape used by packages/sandbox's health/monitor loops

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

struct Entry {
    mutex: Arc<AsyncMutex<()>>,
    refs: usize,
}

/// Keyed mutexes serializing Coordinator operations per sandbox id. Entries
/// are created on first use and removed once the last waiter drops its
/// guard, so a long-lived process never accumulates one lock per
/// historical sandbox.
#[derive(Default)]
pub struct SandboxLocks {
    entries: StdMutex<HashMap<String, Entry>>,
}

/// Held while a Coordinator operation is in flight against one sandbox.
/// Dropping it releases the underlying mutex and, if no other caller is
/// waiting, removes the map entry entirely.
pub struct LockGuard<'a> {
    locks: &'a SandboxLocks,
    sandbox_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl SandboxLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, sandbox_id: &str) -> LockGuard<'_> {
        let mutex = {
            let mut entries = self.entries.lock().unwrap();
            let entry = entries.entry(sandbox_id.to_string()).or_insert_with(|| Entry {
                mutex: Arc::new(AsyncMutex::new(())),
                refs: 0,
            });
            entry.refs += 1;
            entry.mutex.clone()
        };

        let guard = mutex.lock_owned().await;
        LockGuard {
            locks: self,
            sandbox_id: sandbox_id.to_string(),
            _guard: guard,
        }
    }

    fn release(&self, sandbox_id: &str) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(sandbox_id) {
            entry.refs -= 1;
            if entry.refs == 0 {
                entries.remove(sandbox_id);
            }
        }
    }

    #[cfg(test)]
    fn tracked_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.locks.release(&self.sandbox_id);
    }
}
