//! Core error types.

use std::time::Duration;
use thiserror::Error;

/// Boxed error raised by hooks and other caller-supplied callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors from the transition engine and definition model.
///
/// Every variant names the state machine it came from.
#[derive(Debug, Error)]
pub enum StateMachineError {
    #[error("[{machine}] invalid state machine definition: {reason}")]
    InvalidDefinition { machine: String, reason: String },

    #[error("[{machine}] unknown current state '{state}'")]
    UnknownState { machine: String, state: String },

    #[error("[{machine}] no current state recorded on target")]
    MissingState { machine: String },

    #[error("[{machine}] invalid transition: cannot apply '{transition}' in state '{state}'")]
    InvalidTransition {
        machine: String,
        state: String,
        transition: String,
    },

    #[error("[{machine}] cannot initialize: {reason}")]
    InitializationRejected { machine: String, reason: String },

    #[error("[{machine}] pending hook failed for '{transition}': {source}")]
    PendingHook {
        machine: String,
        transition: String,
        #[source]
        source: BoxError,
    },

    #[error(
        "[{machine}] {} post hook(s) failed for '{transition}' after entering '{to_state}'",
        .failures.len()
    )]
    PostHook {
        machine: String,
        transition: String,
        to_state: String,
        failures: Vec<BoxError>,
    },

    #[error("[{machine}] {source}")]
    Lock {
        machine: String,
        #[source]
        source: LockError,
    },
}

impl StateMachineError {
    /// Identifier of the state machine this error belongs to.
    pub fn machine(&self) -> &str {
        match self {
            StateMachineError::InvalidDefinition { machine, .. }
            | StateMachineError::UnknownState { machine, .. }
            | StateMachineError::MissingState { machine }
            | StateMachineError::InvalidTransition { machine, .. }
            | StateMachineError::InitializationRejected { machine, .. }
            | StateMachineError::PendingHook { machine, .. }
            | StateMachineError::PostHook { machine, .. }
            | StateMachineError::Lock { machine, .. } => machine,
        }
    }

    /// Returns whether the target's state was changed before the error was raised.
    ///
    /// Only a post hook failure leaves the new state in place.
    pub fn state_changed(&self) -> bool {
        matches!(self, StateMachineError::PostHook { .. })
    }

    /// Returns a stable error code for logs and metrics.
    pub fn error_code(&self) -> &'static str {
        match self {
            StateMachineError::InvalidDefinition { .. } => "INVALID_DEFINITION",
            StateMachineError::UnknownState { .. } => "UNKNOWN_STATE",
            StateMachineError::MissingState { .. } => "MISSING_STATE",
            StateMachineError::InvalidTransition { .. } => "INVALID_TRANSITION",
            StateMachineError::InitializationRejected { .. } => "INITIALIZATION_REJECTED",
            StateMachineError::PendingHook { .. } => "PENDING_HOOK_FAILED",
            StateMachineError::PostHook { .. } => "POST_HOOK_FAILED",
            StateMachineError::Lock { .. } => "LOCK_FAILED",
        }
    }

    pub(crate) fn invalid_definition(machine: &str, reason: impl Into<String>) -> Self {
        StateMachineError::InvalidDefinition {
            machine: machine.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by a lock manager while acquiring a scope.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("timed out after {waited:?} waiting for lock on '{identity}'")]
    Timeout { identity: String, waited: Duration },

    #[error("lock on '{identity}' unavailable: {reason}")]
    Unavailable { identity: String, reason: String },
}

impl LockError {
    /// Identity the failed acquisition was keyed by.
    pub fn identity(&self) -> &str {
        match self {
            LockError::Timeout { identity, .. } | LockError::Unavailable { identity, .. } => {
                identity
            }
        }
    }
}
