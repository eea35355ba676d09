//! In-process keyed lock manager.
//!
//! Each identity gets its own mutex, created on first use and removed when
//! the last scope holding or waiting on it goes away. Transitions on
//! different identities never contend beyond the map shard lookup.

use dashmap::DashMap;
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use statekeeper_core::{LockError, LockManager, LockScope};
use std::sync::Arc;
use std::time::Duration;

/// Lock manager with one mutex per identity.
#[derive(Debug, Default)]
pub struct KeyedLockManager {
    locks: DashMap<String, Arc<Mutex<()>>>,
    timeout: Option<Duration>,
}

impl KeyedLockManager {
    /// Creates a manager that waits indefinitely.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager that gives up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            timeout: Some(timeout),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Number of identities currently tracked.
    pub fn tracked_identities(&self) -> usize {
        self.locks.len()
    }

    /// Drops the mutexes of identities nobody holds or waits on.
    ///
    /// Released scopes already remove their own entry; this only sweeps
    /// entries left behind by scopes that were leaked. Returns how many were
    /// removed.
    pub fn prune(&self) -> usize {
        let before = self.locks.len();
        // The shard write lock blocks new lookups, so a count of one means idle.
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        let removed = before.saturating_sub(self.locks.len());
        if removed > 0 {
            tracing::debug!("Pruned {} idle lock identities", removed);
        }
        removed
    }

    fn mutex_for(&self, identity: &str) -> Arc<Mutex<()>> {
        if let Some(existing) = self.locks.get(identity) {
            return Arc::clone(existing.value());
        }
        Arc::clone(self.locks.entry(identity.to_string()).or_default().value())
    }
}

/// Held mutex for one identity; forgets the identity on release when idle.
struct IdentityGuard<'a> {
    manager: &'a KeyedLockManager,
    identity: String,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl Drop for IdentityGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Runs under the shard write lock, so no lookup can clone the Arc
        // between the count check and the removal.
        self.manager
            .locks
            .remove_if(self.identity.as_str(), |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl KeyedLockManager {
    fn scope(&self, identity: &str, guard: ArcMutexGuard<RawMutex, ()>) -> LockScope<'_> {
        LockScope::new(IdentityGuard {
            manager: self,
            identity: identity.to_string(),
            guard: Some(guard),
        })
    }
}

impl LockManager for KeyedLockManager {
    fn lock(&self, identity: &str) -> Result<LockScope<'_>, LockError> {
        let mutex = self.mutex_for(identity);
        match self.timeout {
            None => {
                let guard = mutex.lock_arc();
                drop(mutex);
                Ok(self.scope(identity, guard))
            }
            Some(timeout) => match mutex.try_lock_arc_for(timeout) {
                Some(guard) => {
                    drop(mutex);
                    Ok(self.scope(identity, guard))
                }
                None => {
                    drop(mutex);
                    self.locks
                        .remove_if(identity, |_, lock| Arc::strong_count(lock) == 1);
                    tracing::warn!("Timed out after {:?} waiting for lock on {}", timeout, identity);
                    Err(LockError::Timeout {
                        identity: identity.to_string(),
                        waited: timeout,
                    })
                }
            },
        }
    }
}
