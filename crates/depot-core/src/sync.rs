//! Scoped locks over a local store
//!
//! Resolution takes a shared context, installation an exclusive one. Locks are
//! keyed by the store's base directory, so independent stores never contend.
//! The context releases its lock when dropped.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

/// Creates lock guards for local store access
pub trait SyncContextFactory: Send + Sync {
    fn new_context(&self, base_dir: &Path, shared: bool) -> SyncContext;
}

#[derive(Debug, Default)]
struct LockState {
    readers: usize,
    writer: bool,
}

#[derive(Debug, Default)]
struct StoreLock {
    state: Mutex<LockState>,
    released: Condvar,
}

impl StoreLock {
    fn acquire(&self, shared: bool) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            let available = if shared {
                !state.writer
            } else {
                !state.writer && state.readers == 0
            };
            if available {
                break;
            }
            state = self
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if shared {
            state.readers += 1;
        } else {
            state.writer = true;
        }
    }

    fn release(&self, shared: bool) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if shared {
            state.readers = state.readers.saturating_sub(1);
        } else {
            state.writer = false;
        }
        drop(state);
        self.released.notify_all();
    }
}

/// Held lock on a local store; released on drop
pub struct SyncContext {
    lock: Option<Arc<StoreLock>>,
    shared: bool,
    base_dir: PathBuf,
}

impl SyncContext {
    /// Context that holds no lock, for factories that do not serialize access
    pub fn unlocked(base_dir: &Path, shared: bool) -> Self {
        Self {
            lock: None,
            shared,
            base_dir: base_dir.to_path_buf(),
        }
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl Drop for SyncContext {
    fn drop(&mut self) {
        if let Some(lock) = self.lock.take() {
            lock.release(self.shared);
            tracing::trace!(base_dir = %self.base_dir.display(), shared = self.shared, "released store lock");
        }
    }
}

impl fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncContext")
            .field("base_dir", &self.base_dir)
            .field("shared", &self.shared)
            .field("locked", &self.lock.is_some())
            .finish()
    }
}

/// In-process readers/writer locks, one per store directory
#[derive(Debug, Default)]
pub struct LocalSyncContextFactory {
    locks: Mutex<HashMap<PathBuf, Arc<StoreLock>>>,
}

impl LocalSyncContextFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SyncContextFactory for LocalSyncContextFactory {
    fn new_context(&self, base_dir: &Path, shared: bool) -> SyncContext {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(base_dir.to_path_buf()).or_default())
        };
        lock.acquire(shared);
        tracing::trace!(base_dir = %base_dir.display(), shared, "acquired store lock");
        SyncContext {
            lock: Some(lock),
            shared,
            base_dir: base_dir.to_path_buf(),
        }
    }
}
