//! Lock manager contract.
//!
//! A lock manager hands out exclusive scopes keyed by an opaque identity.
//! The scope is released when the returned [`LockScope`] is dropped, which
//! covers early returns, errors and panics alike.

use crate::error::LockError;
use std::fmt;

/// Anything held for the lifetime of a scope.
pub trait Held {}

impl<T: ?Sized> Held for T {}

/// An acquired exclusive scope. Dropping it releases the lock.
#[must_use = "the lock is released as soon as the scope is dropped"]
pub struct LockScope<'a> {
    _guard: Option<Box<dyn Held + 'a>>,
}

impl<'a> LockScope<'a> {
    /// Wraps a guard whose drop releases the lock.
    pub fn new(guard: impl Held + 'a) -> Self {
        Self {
            _guard: Some(Box::new(guard)),
        }
    }

    /// A scope that holds nothing.
    pub fn unlocked() -> Self {
        Self { _guard: None }
    }
}

impl fmt::Debug for LockScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockScope")
            .field("held", &self._guard.is_some())
            .finish()
    }
}

/// Provides exclusive scopes keyed by identity.
pub trait LockManager: Send + Sync {
    /// Blocks until the scope for `identity` is acquired, or fails.
    fn lock(&self, identity: &str) -> Result<LockScope<'_>, LockError>;
}

impl dyn LockManager + '_ {
    /// Runs `work` while holding the scope for `identity`.
    pub fn with_lock<R>(&self, identity: &str, work: impl FnOnce() -> R) -> Result<R, LockError> {
        let _scope = self.lock(identity)?;
        Ok(work())
    }
}

/// Lock manager that never locks.
///
/// Offers no exclusivity; suitable for single-threaded or externally
/// synchronized callers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLockManager;

impl LockManager for NullLockManager {
    fn lock(&self, _identity: &str) -> Result<LockScope<'_>, LockError> {
        Ok(LockScope::unlocked())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountOnDrop(Arc<AtomicUsize>);

    impl Drop for CountOnDrop {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct CountingLockManager {
        released: Arc<AtomicUsize>,
    }

    impl LockManager for CountingLockManager {
        fn lock(&self, _identity: &str) -> Result<LockScope<'_>, LockError> {
            Ok(LockScope::new(CountOnDrop(Arc::clone(&self.released))))
        }
    }

    struct RefusingLockManager;

    impl LockManager for RefusingLockManager {
        fn lock(&self, identity: &str) -> Result<LockScope<'_>, LockError> {
            Err(LockError::Unavailable {
                identity: identity.to_string(),
                reason: "refused".to_string(),
            })
        }
    }

    #[test]
    fn test_null_lock_runs_work() {
        let manager: &dyn LockManager = &NullLockManager;
        assert_eq!(manager.with_lock("a", || 42).unwrap(), 42);
    }

    #[test]
    fn test_scope_released_on_every_path() {
        let released = Arc::new(AtomicUsize::new(0));
        let manager: &dyn LockManager = &CountingLockManager {
            released: Arc::clone(&released),
        };

        manager.with_lock("a", || ()).unwrap();
        assert_eq!(released.load(Ordering::SeqCst), 1);

        let failed: Result<Result<(), &str>, _> = manager.with_lock("a", || Err("nope"));
        assert!(failed.unwrap().is_err());
        assert_eq!(released.load(Ordering::SeqCst), 2);

        let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            manager.with_lock("a", || panic!("boom")).ok();
        }));
        assert!(panicked.is_err());
        assert_eq!(released.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_acquisition_failure_skips_work() {
        let manager: &dyn LockManager = &RefusingLockManager;
        let mut ran = false;
        let result = manager.with_lock("order-1", || ran = true);
        assert!(matches!(result, Err(LockError::Unavailable { .. })));
        assert!(!ran);
    }
}
