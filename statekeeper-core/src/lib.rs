//! # statekeeper-core
//!
//! Transition engine for statekeeper.
//!
//! This crate provides:
//! - State machine definition parsing and validation
//! - Invocation models binding definitions to host objects
//! - Lock and metric manager contracts with no-op defaults
//! - Global pending/post transition hooks
//! - The [`Context`] that executes transitions
//!
//! ```
//! use statekeeper_core::{ActiveStateMachine, CellInvocationModel, Context, StateCell, StateMachine};
//! use std::sync::Arc;
//!
//! struct Order {
//!     status: StateCell,
//! }
//!
//! fn status(order: &Order) -> &StateCell {
//!     &order.status
//! }
//!
//! let machine = StateMachine::builder("order")
//!     .state("NEW")
//!     .transition("pay", "PAID")
//!     .state("PAID")
//!     .build()
//!     .unwrap();
//! let active = ActiveStateMachine::new(Arc::new(machine), CellInvocationModel::new(status));
//!
//! let order = Order { status: StateCell::with_state("NEW") };
//! let context = Context::default();
//! context.transition(&active, &order, "pay", "order-1").unwrap();
//! assert_eq!(order.status.get().as_deref(), Some("PAID"));
//! ```

pub mod context;
pub mod definition;
pub mod error;
pub mod hook;
pub mod invocation;
pub mod lock;
pub mod metric;

pub use context::{Context, ContextBuilder, TransitionResult, TRANSITION_METRIC};
pub use definition::{State, StateMachine, StateMachineBuilder, Transition, TransitionName};
pub use error::{BoxError, LockError, StateMachineError};
pub use hook::{Hooks, PendingTransition, PostTransition};
pub use invocation::{ActiveStateMachine, CellInvocationModel, FnInvocationModel, InvocationModel, StateCell};
pub use lock::{LockManager, LockScope, NullLockManager};
pub use metric::{MetricManager, NullMetricManager};
