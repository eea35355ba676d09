//! Global transition hooks.
//!
//! Hooks see every transition the engine runs, for every host type and
//! every machine. A hook that only cares about one kind of target should
//! downcast the `&dyn Any` it is handed and return `Ok(())` otherwise.

use crate::error::BoxError;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Invoked before the target's state is changed.
///
/// A failure aborts the transition; the state is left as it was.
pub trait PendingTransition: Send + Sync {
    fn on_pending(&self, target: &dyn Any, transition: &str) -> Result<(), BoxError>;
}

/// Invoked after the target's state was changed.
///
/// A failure is reported to the caller but the new state stays in place.
pub trait PostTransition: Send + Sync {
    fn on_post(&self, target: &dyn Any, transition: &str) -> Result<(), BoxError>;
}

impl<F> PendingTransition for F
where
    F: Fn(&dyn Any, &str) -> Result<(), BoxError> + Send + Sync,
{
    fn on_pending(&self, target: &dyn Any, transition: &str) -> Result<(), BoxError> {
        self(target, transition)
    }
}

impl<F> PostTransition for F
where
    F: Fn(&dyn Any, &str) -> Result<(), BoxError> + Send + Sync,
{
    fn on_post(&self, target: &dyn Any, transition: &str) -> Result<(), BoxError> {
        self(target, transition)
    }
}

/// The two hook sets, fixed when the context is built.
#[derive(Clone, Default)]
pub struct Hooks {
    pending: Vec<Arc<dyn PendingTransition>>,
    post: Vec<Arc<dyn PostTransition>>,
}

impl Hooks {
    pub fn new(
        pending: Vec<Arc<dyn PendingTransition>>,
        post: Vec<Arc<dyn PostTransition>>,
    ) -> Self {
        Self { pending, post }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn post_count(&self) -> usize {
        self.post.len()
    }

    /// Runs pending hooks, stopping at the first failure.
    pub fn run_pending(&self, target: &dyn Any, transition: &str) -> Result<(), BoxError> {
        for hook in &self.pending {
            hook.on_pending(target, transition)?;
        }
        Ok(())
    }

    /// Runs every post hook and returns all failures.
    pub fn run_post(&self, target: &dyn Any, transition: &str) -> Vec<BoxError> {
        self.post
            .iter()
            .filter_map(|hook| hook.on_post(target, transition).err())
            .collect()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("pending", &self.pending.len())
            .field("post", &self.post.len())
            .finish()
    }
}
