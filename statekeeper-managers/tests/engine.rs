//! The transition engine wired with the concrete managers.

use statekeeper_core::{
    ActiveStateMachine, CellInvocationModel, Context, StateCell, StateMachine, StateMachineError,
};
use statekeeper_managers::{KeyedLockManager, PrometheusMetricManager};
use std::sync::Arc;
use std::time::Duration;

struct Job {
    status: StateCell,
}

fn status(job: &Job) -> &StateCell {
    &job.status
}

fn job_machine() -> ActiveStateMachine<Job> {
    let def = StateMachine::from_json(&serde_json::json!({
        "identifier": "job",
        "states": {
            "queued": {"transitions": {"start": {"nextState": "running"}}},
            "running": {"transitions": {"finish": {"nextState": "done"}, "requeue": {"nextState": "queued"}}},
            "done": {}
        }
    }))
    .unwrap();
    ActiveStateMachine::new(Arc::new(def), CellInvocationModel::new(status))
}

#[test]
fn metered_transitions_under_keyed_locks() {
    let metrics = Arc::new(PrometheusMetricManager::new("engine").unwrap());
    let locks = Arc::new(KeyedLockManager::with_timeout(Duration::from_secs(5)));
    let context = Context::builder()
        .lock_manager(locks.clone())
        .metric_manager(metrics.clone())
        .build();
    let active = job_machine();
    let job = Job {
        status: StateCell::with_state("queued"),
    };

    context.transition(&active, &job, "start", "job-1").unwrap();
    context.transition(&active, &job, "finish", "job-1").unwrap();
    let err = context
        .transition(&active, &job, "start", "job-1")
        .unwrap_err();
    assert!(matches!(err, StateMachineError::InvalidTransition { .. }));

    assert_eq!(metrics.event_count("statemachine.transition.start.success"), 1);
    assert_eq!(metrics.event_count("statemachine.transition.start.failure"), 1);
    assert_eq!(metrics.event_count("statemachine.transition.finish.success"), 1);
    assert_eq!(metrics.sample_count("statemachine.transition.start"), 2);

    assert_eq!(locks.tracked_identities(), 0);
}

#[test]
fn finished_transitions_leave_no_lock_entries() {
    let locks = Arc::new(KeyedLockManager::new());
    let context = Context::builder().lock_manager(locks.clone()).build();
    let active = job_machine();

    for i in 0..1_000 {
        let job = Job {
            status: StateCell::with_state("queued"),
        };
        let identity = format!("job-{}", i);
        context.transition(&active, &job, "start", &identity).unwrap();
        context.transition(&active, &job, "finish", &identity).unwrap();
    }

    assert_eq!(locks.tracked_identities(), 0);
    assert_eq!(locks.prune(), 0);
}

#[test]
fn held_identity_times_out_the_transition() {
    let locks = Arc::new(KeyedLockManager::with_timeout(Duration::from_millis(20)));
    let context = Context::builder().lock_manager(locks.clone()).build();
    let active = job_machine();
    let job = Job {
        status: StateCell::with_state("queued"),
    };

    let err = std::thread::scope(|s| {
        let _held = statekeeper_core::LockManager::lock(locks.as_ref(), "job-2").unwrap();
        s.spawn(|| context.transition(&active, &job, "start", "job-2"))
            .join()
            .unwrap()
            .unwrap_err()
    });

    assert!(matches!(err, StateMachineError::Lock { .. }));
    assert_eq!(job.status.get().as_deref(), Some("queued"));
}
