//! Inference loop: throttling, stop semantics and error handling

mod support;

use protege::backends::{CaptureBackend, StreamConstraints};
use protege::inference::InferenceTick;
use protege::session::{InferenceStatus, InputModality};
use protege::ProtegeError;
use std::thread;
use std::time::Duration;
use support::Stack;

fn video_source(stack: &Stack) -> protege::backends::StreamHandle {
    stack
        .capture
        .acquire_video(&StreamConstraints::for_modality(InputModality::Camera))
        .unwrap()
}

fn running_stack() -> Stack {
    let stack = Stack::new();
    stack.store.start_session(Stack::untrained_task());
    stack.recorder.add_class("Cat").unwrap();
    stack.recorder.add_class("Dog").unwrap();
    stack.model.set_prediction(vec![0.7, 0.3], 0);
    let source = video_source(&stack);
    stack.inference.start(source).unwrap();
    stack
}

#[test]
fn start_requires_an_available_classifier() {
    let stack = Stack::new();
    stack.store.start_session(Stack::camera_task());
    let source = video_source(&stack);

    // Task requires training and none has completed.
    let result = stack.inference.start(source);
    assert!(matches!(result, Err(ProtegeError::ValidationFailure(_))));
    assert_eq!(stack.store.state().inference.status, InferenceStatus::Idle);
}

#[test]
fn start_rejects_a_second_loop() {
    let stack = running_stack();
    let source = video_source(&stack);

    let result = stack.inference.start(source);
    assert!(matches!(result, Err(ProtegeError::ResourceBusy(_))));
}

#[test]
fn prediction_commits_are_throttled() {
    let stack = running_stack();

    assert_eq!(stack.inference.tick(), InferenceTick::Predicted);
    let first = stack.store.state().inference.last_prediction.clone().unwrap();

    // Immediately after, the predict runs but the commit is clamped.
    assert_eq!(stack.inference.tick(), InferenceTick::Throttled);
    assert_eq!(
        stack.store.state().inference.last_prediction.as_ref(),
        Some(&first)
    );

    thread::sleep(Duration::from_millis(220));
    assert_eq!(stack.inference.tick(), InferenceTick::Predicted);
}

#[test]
fn stop_clears_the_prediction_and_ends_the_loop() {
    let stack = running_stack();
    assert_eq!(stack.inference.tick(), InferenceTick::Predicted);

    stack.inference.stop();

    let snapshot = stack.store.state();
    assert_eq!(snapshot.inference.status, InferenceStatus::Stopped);
    assert!(snapshot.inference.last_prediction.is_none());

    // The loop self-terminates once the status has drifted.
    assert_eq!(stack.inference.tick(), InferenceTick::Stopped);

    // And a second stop changes nothing.
    let before = stack.store.state();
    stack.inference.stop();
    assert_eq!(*stack.store.state(), *before);
}

#[test]
fn predict_failure_parks_the_loop_in_error() {
    let stack = running_stack();
    stack.model.fail_next_predict("classifier weights unavailable");

    assert_eq!(stack.inference.tick(), InferenceTick::Failed);

    let snapshot = stack.store.state();
    assert_eq!(snapshot.inference.status, InferenceStatus::Error);
    assert!(snapshot
        .inference
        .error
        .as_deref()
        .unwrap()
        .contains("weights unavailable"));
    assert_eq!(stack.inference.tick(), InferenceTick::Stopped);

    // An errored loop can be restarted after the status is acknowledged.
    stack
        .store
        .set_inference_status(InferenceStatus::Stopped, None);
    let source = video_source(&stack);
    stack.inference.start(source).unwrap();
    assert_eq!(stack.inference.tick(), InferenceTick::Predicted);
}
