//! Binding definitions to live host objects.
//!
//! An [`InvocationModel`] knows how one host type records its current state.
//! The engine only ever reads and writes state names through it, so a host
//! may keep its state in a field, behind accessors, or in an external store.
//! Hosts are shared (`&T`); writes go through interior mutability and the
//! engine's lock manager provides exclusivity.

use crate::definition::StateMachine;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Reads and writes the current state name of a host object.
pub trait InvocationModel<T: ?Sized>: Send + Sync {
    /// Returns the state recorded on the target, or `None` if it has none yet.
    fn current_state(&self, target: &T) -> Option<String>;

    /// Records a new state on the target.
    ///
    /// Must be visible to the next `current_state` call on the same target.
    fn apply_state(&self, target: &T, state: &str);
}

/// Invocation model built from a getter/setter pair.
pub struct FnInvocationModel<G, S> {
    getter: G,
    setter: S,
}

impl<G, S> FnInvocationModel<G, S> {
    pub fn new(getter: G, setter: S) -> Self {
        Self { getter, setter }
    }
}

impl<T, G, S> InvocationModel<T> for FnInvocationModel<G, S>
where
    T: ?Sized,
    G: Fn(&T) -> Option<String> + Send + Sync,
    S: Fn(&T, &str) + Send + Sync,
{
    fn current_state(&self, target: &T) -> Option<String> {
        (self.getter)(target)
    }

    fn apply_state(&self, target: &T, state: &str) {
        (self.setter)(target, state)
    }
}

/// A state slot a host type can embed as a field.
#[derive(Default)]
pub struct StateCell(RwLock<Option<String>>);

impl StateCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: impl Into<String>) -> Self {
        Self(RwLock::new(Some(state.into())))
    }

    pub fn get(&self) -> Option<String> {
        self.0.read().clone()
    }

    pub fn set(&self, state: &str) {
        *self.0.write() = Some(state.to_string());
    }
}

impl fmt::Debug for StateCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StateCell").field(&*self.0.read()).finish()
    }
}

/// Invocation model for hosts that embed a [`StateCell`].
pub struct CellInvocationModel<T: ?Sized> {
    accessor: fn(&T) -> &StateCell,
}

impl<T: ?Sized> CellInvocationModel<T> {
    pub fn new(accessor: fn(&T) -> &StateCell) -> Self {
        Self { accessor }
    }
}

impl<T: ?Sized> InvocationModel<T> for CellInvocationModel<T> {
    fn current_state(&self, target: &T) -> Option<String> {
        (self.accessor)(target).get()
    }

    fn apply_state(&self, target: &T, state: &str) {
        (self.accessor)(target).set(state)
    }
}

/// A definition paired with the invocation model for one host type.
///
/// Cheap to clone; both halves are shared.
pub struct ActiveStateMachine<T: ?Sized> {
    state_machine: Arc<StateMachine>,
    invocation_model: Arc<dyn InvocationModel<T>>,
}

impl<T: ?Sized> ActiveStateMachine<T> {
    pub fn new(
        state_machine: Arc<StateMachine>,
        invocation_model: impl InvocationModel<T> + 'static,
    ) -> Self {
        Self {
            state_machine,
            invocation_model: Arc::new(invocation_model),
        }
    }

    pub fn state_machine(&self) -> &StateMachine {
        &self.state_machine
    }

    pub fn invocation_model(&self) -> &dyn InvocationModel<T> {
        self.invocation_model.as_ref()
    }

    pub fn identifier(&self) -> &str {
        self.state_machine.identifier()
    }
}

impl<T: ?Sized> Clone for ActiveStateMachine<T> {
    fn clone(&self) -> Self {
        Self {
            state_machine: Arc::clone(&self.state_machine),
            invocation_model: Arc::clone(&self.invocation_model),
        }
    }
}

impl<T: ?Sized> fmt::Debug for ActiveStateMachine<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveStateMachine")
            .field("state_machine", &self.state_machine.identifier())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Ticket {
        status: StateCell,
    }

    fn status(ticket: &Ticket) -> &StateCell {
        &ticket.status
    }

    fn machine() -> Arc<StateMachine> {
        Arc::new(
            StateMachine::builder("ticket")
                .state("open")
                .transition("close", "closed")
                .state("closed")
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_cell_model_read_your_writes() {
        let model = CellInvocationModel::new(status);
        let ticket = Ticket {
            status: StateCell::with_state("open"),
        };

        assert_eq!(model.current_state(&ticket).as_deref(), Some("open"));
        model.apply_state(&ticket, "closed");
        assert_eq!(model.current_state(&ticket).as_deref(), Some("closed"));
        assert_eq!(model.current_state(&ticket).as_deref(), Some("closed"));
    }

    #[test]
    fn test_fn_model_over_external_store() {
        let store: RwLock<HashMap<u32, String>> = RwLock::new(HashMap::new());
        let model = FnInvocationModel::new(
            |id: &u32| store.read().get(id).cloned(),
            |id: &u32, state: &str| {
                store.write().insert(*id, state.to_string());
            },
        );

        assert_eq!(model.current_state(&7u32), None);
        model.apply_state(&7u32, "open");
        assert_eq!(model.current_state(&7u32).as_deref(), Some("open"));
    }

    #[test]
    fn test_active_binding_shares_definition() {
        let def = machine();
        let active = ActiveStateMachine::new(
            Arc::clone(&def),
            CellInvocationModel::new(status),
        );
        let copy = active.clone();

        assert_eq!(copy.identifier(), "ticket");
        assert_eq!(Arc::strong_count(&def), 3);
        assert!(format!("{:?}", copy).contains("ticket"));
    }
}
