//! Transition engine - coordinates definitions, locks, hooks, and metrics.
//!
//! A transition runs as:
//!
//! 1. resolve and validate the target's current state (no lock taken yet)
//! 2. acquire the lock scope for the caller's identity
//! 3. re-resolve and re-validate under the lock
//! 4. run pending hooks (any failure aborts, state untouched)
//! 5. apply the next state through the invocation model
//! 6. run post hooks (failures are reported, state is kept)
//! 7. release the lock
//!
//! The whole call is timed and metered as success or failure.

use crate::definition::{State, StateMachine};
use crate::error::{BoxError, StateMachineError};
use crate::hook::{Hooks, PendingTransition, PostTransition};
use crate::invocation::ActiveStateMachine;
use crate::lock::{LockManager, NullLockManager};
use crate::metric::{MetricManager, NullMetricManager};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Metric prefix for every transition.
pub const TRANSITION_METRIC: &str = "statemachine.transition";

/// Result of a successful transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    pub transition: String,
    pub from_state: String,
    pub to_state: String,
}

/// The transition engine.
///
/// Holds no per-target state; every call works on the state recorded on the
/// target itself. Safe to share across threads.
pub struct Context {
    lock_manager: Arc<dyn LockManager>,
    metric_manager: Arc<dyn MetricManager>,
    hooks: Hooks,
}

impl Context {
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Returns the target's current state as known to the definition.
    pub fn current_state<'m, T: ?Sized>(
        &self,
        active: &'m ActiveStateMachine<T>,
        target: &T,
    ) -> Result<&'m State, StateMachineError> {
        let machine = active.state_machine();
        let name = active
            .invocation_model()
            .current_state(target)
            .ok_or_else(|| StateMachineError::MissingState {
                machine: machine.identifier().to_string(),
            })?;
        machine
            .state(&name)
            .ok_or_else(|| StateMachineError::UnknownState {
                machine: machine.identifier().to_string(),
                state: name,
            })
    }

    /// Returns true if `transition` is allowed from the target's current state.
    pub fn can_transition<T: ?Sized>(
        &self,
        active: &ActiveStateMachine<T>,
        target: &T,
        transition: &str,
    ) -> Result<bool, StateMachineError> {
        Ok(self.current_state(active, target)?.has_transition(transition))
    }

    /// Returns the transitions allowed from the target's current state, sorted.
    pub fn available_transitions<T: ?Sized>(
        &self,
        active: &ActiveStateMachine<T>,
        target: &T,
    ) -> Result<Vec<String>, StateMachineError> {
        Ok(self
            .current_state(active, target)?
            .transitions()
            .keys()
            .cloned()
            .collect())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Puts a target that has no state yet into the machine's initial state.
    ///
    /// Runs under the lock for `identity` but invokes no hooks.
    pub fn initialize<T: ?Sized>(
        &self,
        active: &ActiveStateMachine<T>,
        target: &T,
        identity: &str,
    ) -> Result<String, StateMachineError> {
        let machine = active.state_machine();
        let initial = machine.initial_state().ok_or_else(|| {
            StateMachineError::InitializationRejected {
                machine: machine.identifier().to_string(),
                reason: "no initial state defined".to_string(),
            }
        })?;

        let _scope = self
            .lock_manager
            .lock(identity)
            .map_err(|source| StateMachineError::Lock {
                machine: machine.identifier().to_string(),
                source,
            })?;

        let model = active.invocation_model();
        if let Some(existing) = model.current_state(target) {
            return Err(StateMachineError::InitializationRejected {
                machine: machine.identifier().to_string(),
                reason: format!("target already in state '{}'", existing),
            });
        }
        model.apply_state(target, initial);
        tracing::debug!("[{}] initialized {} to {}", machine.identifier(), identity, initial);
        Ok(initial.to_string())
    }

    /// Executes `transition` on `target`, serialized by `identity`.
    ///
    /// The caller must use the same identity for every transition on the same
    /// target; the engine cannot detect a mismatch.
    ///
    /// Unlike the queries and [`initialize`](Self::initialize), this requires
    /// `T: 'static`: hooks receive the target as `&dyn Any`, which only
    /// `'static` types can be viewed as. Hosts that borrow can still be
    /// queried and initialized.
    pub fn transition<T: Any>(
        &self,
        active: &ActiveStateMachine<T>,
        target: &T,
        transition: &str,
        identity: &str,
    ) -> Result<TransitionResult, StateMachineError> {
        let timer = format!("{}.{}", TRANSITION_METRIC, transition);
        let result = self
            .metric_manager
            .time(&timer, || self.run_transition(active, target, transition, identity));

        match &result {
            Ok(_) => self.metric_manager.meter(&format!("{}.success", timer), 1),
            Err(e) => {
                self.metric_manager.meter(&format!("{}.failure", timer), 1);
                tracing::debug!("{} ({})", e, e.error_code());
            }
        }
        result
    }

    fn run_transition<T: Any>(
        &self,
        active: &ActiveStateMachine<T>,
        target: &T,
        transition: &str,
        identity: &str,
    ) -> Result<TransitionResult, StateMachineError> {
        let machine = active.state_machine();

        // Fail fast without taking the lock
        self.resolve(machine, self.current_state(active, target)?, transition)?;

        let _scope = self
            .lock_manager
            .lock(identity)
            .map_err(|source| StateMachineError::Lock {
                machine: machine.identifier().to_string(),
                source,
            })?;

        // Another holder of this identity may have moved the target meanwhile
        let from = self.current_state(active, target)?;
        let to_state = self.resolve(machine, from, transition)?;

        tracing::debug!(
            "[{}] {} -> {} via {} ({})",
            machine.identifier(),
            from.name(),
            to_state,
            transition,
            identity
        );

        if let Err(source) = self.hooks.run_pending(target, transition) {
            tracing::warn!(
                "[{}] pending hook rejected {}: {}",
                machine.identifier(),
                transition,
                source
            );
            return Err(StateMachineError::PendingHook {
                machine: machine.identifier().to_string(),
                transition: transition.to_string(),
                source,
            });
        }

        active.invocation_model().apply_state(target, to_state);

        let failures: Vec<BoxError> = self.hooks.run_post(target, transition);
        if !failures.is_empty() {
            for failure in &failures {
                tracing::warn!(
                    "[{}] post hook failed after {}: {}",
                    machine.identifier(),
                    transition,
                    failure
                );
            }
            return Err(StateMachineError::PostHook {
                machine: machine.identifier().to_string(),
                transition: transition.to_string(),
                to_state: to_state.to_string(),
                failures,
            });
        }

        Ok(TransitionResult {
            transition: transition.to_string(),
            from_state: from.name().to_string(),
            to_state: to_state.to_string(),
        })
    }

    /// Looks up the next state for `transition` leaving `from`.
    fn resolve<'m>(
        &self,
        machine: &'m StateMachine,
        from: &'m State,
        transition: &str,
    ) -> Result<&'m str, StateMachineError> {
        from.transition(transition)
            .map(|t| t.next_state())
            .ok_or_else(|| StateMachineError::InvalidTransition {
                machine: machine.identifier().to_string(),
                state: from.name().to_string(),
                transition: transition.to_string(),
            })
    }
}

impl Default for Context {
    fn default() -> Self {
        ContextBuilder::default().build()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

/// Assembles a [`Context`].
///
/// Unset managers fall back to the no-op implementations.
#[derive(Default)]
pub struct ContextBuilder {
    lock_manager: Option<Arc<dyn LockManager>>,
    metric_manager: Option<Arc<dyn MetricManager>>,
    pending: Vec<Arc<dyn PendingTransition>>,
    post: Vec<Arc<dyn PostTransition>>,
}

impl ContextBuilder {
    pub fn lock_manager(mut self, lock_manager: Arc<dyn LockManager>) -> Self {
        self.lock_manager = Some(lock_manager);
        self
    }

    pub fn metric_manager(mut self, metric_manager: Arc<dyn MetricManager>) -> Self {
        self.metric_manager = Some(metric_manager);
        self
    }

    pub fn pending_transition(mut self, hook: Arc<dyn PendingTransition>) -> Self {
        self.pending.push(hook);
        self
    }

    pub fn pending_transitions(
        mut self,
        hooks: impl IntoIterator<Item = Arc<dyn PendingTransition>>,
    ) -> Self {
        self.pending.extend(hooks);
        self
    }

    pub fn post_transition(mut self, hook: Arc<dyn PostTransition>) -> Self {
        self.post.push(hook);
        self
    }

    pub fn post_transitions(
        mut self,
        hooks: impl IntoIterator<Item = Arc<dyn PostTransition>>,
    ) -> Self {
        self.post.extend(hooks);
        self
    }

    pub fn build(self) -> Context {
        let hooks = Hooks::new(self.pending, self.post);
        tracing::info!(
            "Building context ({} pending hook(s), {} post hook(s), custom lock: {}, custom metrics: {})",
            hooks.pending_count(),
            hooks.post_count(),
            self.lock_manager.is_some(),
            self.metric_manager.is_some()
        );
        Context {
            lock_manager: self
                .lock_manager
                .unwrap_or_else(|| Arc::new(NullLockManager)),
            metric_manager: self
                .metric_manager
                .unwrap_or_else(|| Arc::new(NullMetricManager)),
            hooks,
        }
    }
}

impl fmt::Debug for ContextBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextBuilder")
            .field("pending", &self.pending.len())
            .field("post", &self.post.len())
            .finish_non_exhaustive()
    }
}
