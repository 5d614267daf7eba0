//! Training run lifecycle: completion, abort, failure, staleness

mod support;

use protege::session::{Sample, InputModality, TrainingStatus};
use protege::training::stale_classes;
use protege::ProtegeError;
use support::Stack;

fn collected_stack() -> (Stack, uuid::Uuid, uuid::Uuid) {
    let stack = Stack::new();
    stack.start_camera_session();
    let cat = stack.ready_class("Cat");
    let dog = stack.ready_class("Dog");
    (stack, cat, dog)
}

#[test]
fn completed_run_records_done_with_full_progress() {
    let (stack, _, _) = collected_stack();
    let marker = stack.store.state().newest_dataset_update();

    stack.training.start().unwrap().join();

    let snapshot = stack.store.state();
    assert_eq!(snapshot.training.status, TrainingStatus::Done);
    assert_eq!(snapshot.training.progress, 100);

    let last_run = snapshot.training.last_run.as_ref().unwrap();
    assert_eq!(last_run.status, TrainingStatus::Done);
    assert!(last_run.error.is_none());
    assert_eq!(last_run.dataset_updated_at, marker);

    // Every configured epoch ran to its boundary.
    assert_eq!(stack.model.epochs_run(), u64::from(snapshot.training.params.epochs));
}

#[test]
fn abort_is_optimistic_and_preserves_all_samples() {
    let (stack, cat, dog) = collected_stack();
    let counts_before: Vec<usize> = stack
        .store
        .state()
        .classes
        .iter()
        .map(|c| c.dataset.recorded_count)
        .collect();

    let gate = stack.model.gate_next_fit();
    let handle = stack.training.start().unwrap();
    assert_eq!(stack.store.state().training.status, TrainingStatus::Running);

    stack.training.abort();

    // Status flips immediately, before the backend has actually stopped.
    let snapshot = stack.store.state();
    assert_eq!(snapshot.training.status, TrainingStatus::Aborted);
    let last_run = snapshot.training.last_run.as_ref().unwrap();
    assert_eq!(last_run.status, TrainingStatus::Aborted);
    assert!(last_run.error.is_none());

    gate.send(()).unwrap();
    handle.join();

    // The cooperative stop must not overwrite the Aborted state.
    let snapshot = stack.store.state();
    assert_eq!(snapshot.training.status, TrainingStatus::Aborted);
    let counts_after: Vec<usize> = snapshot
        .classes
        .iter()
        .map(|c| c.dataset.recorded_count)
        .collect();
    assert_eq!(counts_after, counts_before);
    assert!(stack.features.class_len(cat) > 0);
    assert!(stack.features.class_len(dog) > 0);

    // The backend observed the stop at the first epoch boundary.
    assert_eq!(stack.model.epochs_run(), 1);
}

#[test]
fn abort_without_a_running_fit_is_a_no_op() {
    let (stack, _, _) = collected_stack();
    stack.training.abort();

    let snapshot = stack.store.state();
    assert_eq!(snapshot.training.status, TrainingStatus::Idle);
    assert!(snapshot.training.last_run.is_none());
}

#[test]
fn start_rejects_incomplete_datasets_and_concurrent_runs() {
    let stack = Stack::new();
    stack.start_camera_session();
    stack.ready_class("Cat");
    assert!(matches!(
        stack.training.start(),
        Err(ProtegeError::ValidationFailure(_))
    ));

    let (stack, _, _) = collected_stack();
    let gate = stack.model.gate_next_fit();
    let handle = stack.training.start().unwrap();
    assert!(matches!(
        stack.training.start(),
        Err(ProtegeError::ResourceBusy(_))
    ));
    gate.send(()).unwrap();
    handle.join();
}

#[test]
fn start_rejects_when_no_features_were_accumulated() {
    let (stack, cat, dog) = collected_stack();
    stack.features.clear_class(cat);
    stack.features.clear_class(dog);

    assert!(matches!(
        stack.training.start(),
        Err(ProtegeError::ValidationFailure(_))
    ));
    assert_eq!(stack.store.state().training.status, TrainingStatus::Idle);
}

#[test]
fn backend_failure_lands_in_error_with_the_message() {
    let (stack, _, _) = collected_stack();
    stack.model.fail_fit_at_epoch(2, "loss diverged");

    stack.training.start().unwrap().join();

    let snapshot = stack.store.state();
    assert_eq!(snapshot.training.status, TrainingStatus::Error);
    assert!(snapshot.training.error.as_deref().unwrap().contains("loss diverged"));

    let last_run = snapshot.training.last_run.as_ref().unwrap();
    assert_eq!(last_run.status, TrainingStatus::Error);
    assert!(last_run.error.is_some());
}

#[test]
fn discarding_the_session_drops_an_in_flight_run_result() {
    let (stack, _, _) = collected_stack();
    let gate = stack.model.gate_next_fit();
    let handle = stack.training.start().unwrap();
    assert_eq!(stack.store.state().training.status, TrainingStatus::Running);

    // The session the run belongs to goes away while fit is blocked.
    stack.recorder.discard_session();
    stack.recorder.start_session(Stack::camera_task());

    gate.send(()).unwrap();
    handle.join();

    // The fresh session keeps its Idle defaults; the worker's result is dropped.
    let snapshot = stack.store.state();
    assert_eq!(snapshot.training.status, TrainingStatus::Idle);
    assert!(snapshot.training.last_run.is_none());
    assert_eq!(snapshot.training.progress, 0);
}

#[test]
fn classes_updated_after_the_run_are_flagged_stale() {
    let (stack, cat, _) = collected_stack();
    stack.training.start().unwrap().join();

    assert!(stale_classes(&stack.store.state()).is_empty());

    stack
        .store
        .add_dataset_sample(cat, Sample::new(InputModality::Camera));

    assert_eq!(stale_classes(&stack.store.state()), vec![cat]);
}
