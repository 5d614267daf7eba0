//! Navigation guards
//!
//! Pure predicates over a [`SessionSnapshot`] deciding whether a step
//! transition is currently legal. No side effects; safe to call repeatedly
//! and in any order.

use crate::session::{InferenceStatus, SessionSnapshot, TrainingStatus, WorkflowStep};

/// Collect is reachable once a task model has been selected.
pub fn can_go_to_collect(snapshot: &SessionSnapshot) -> bool {
    snapshot.task.is_some()
}

/// Training requires at least two classes, each with a ready dataset.
pub fn can_access_training(snapshot: &SessionSnapshot) -> bool {
    snapshot.classes.len() >= 2 && snapshot.classes.iter().all(|c| c.dataset.is_ready())
}

/// The Train step is only entered from Collect.
pub fn can_go_to_training(snapshot: &SessionSnapshot) -> bool {
    snapshot.step == WorkflowStep::Collect && can_access_training(snapshot)
}

/// Inference requires a selected task and, when the task trains, a completed run.
pub fn can_access_inference(snapshot: &SessionSnapshot) -> bool {
    match &snapshot.task {
        Some(task) => !task.requires_training || snapshot.training.status == TrainingStatus::Done,
        None => false,
    }
}

pub fn can_start_inference(snapshot: &SessionSnapshot) -> bool {
    can_access_inference(snapshot)
        && matches!(
            snapshot.inference.status,
            InferenceStatus::Idle | InferenceStatus::Stopped
        )
}

/// Classes and their datasets are frozen while training runs.
pub fn can_discard_class(snapshot: &SessionSnapshot) -> bool {
    snapshot.training.status != TrainingStatus::Running
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ClassEntry, DatasetStatus, InputModality, TaskModel};

    fn task(requires_training: bool) -> TaskModel {
        TaskModel {
            id: "task".into(),
            requires_training,
            input_modality: InputModality::Camera,
            default_inference_source: None,
        }
    }

    fn ready_class(name: &str) -> ClassEntry {
        let mut class = ClassEntry::new(name, 10);
        class.dataset.status = DatasetStatus::Ready;
        class.dataset.recorded_count = 10;
        class
    }

    #[test]
    fn collect_requires_a_task() {
        let mut snapshot = SessionSnapshot::default();
        assert!(!can_go_to_collect(&snapshot));

        snapshot.task = Some(task(true));
        assert!(can_go_to_collect(&snapshot));
    }

    #[test]
    fn training_requires_two_ready_classes() {
        let mut snapshot = SessionSnapshot {
            step: WorkflowStep::Collect,
            task: Some(task(true)),
            ..SessionSnapshot::default()
        };
        assert!(!can_access_training(&snapshot));

        snapshot.classes.push(ready_class("Cat"));
        assert!(!can_access_training(&snapshot));

        let mut partial = ClassEntry::new("Dog", 10);
        partial.dataset.status = DatasetStatus::Recording;
        partial.dataset.recorded_count = 5;
        snapshot.classes.push(partial);
        assert!(!can_access_training(&snapshot));
        assert!(!can_go_to_training(&snapshot));

        snapshot.classes[1] = ready_class("Dog");
        assert!(can_access_training(&snapshot));
        assert!(can_go_to_training(&snapshot));

        // Guard implies the invariant it advertises.
        assert!(snapshot.classes.len() >= 2);
        assert!(snapshot.classes.iter().all(|c| c.dataset.is_ready()));

        // Only entered from Collect.
        snapshot.step = WorkflowStep::Infer;
        assert!(!can_go_to_training(&snapshot));
    }

    #[test]
    fn inference_access_tracks_training_requirement() {
        let mut snapshot = SessionSnapshot::default();
        assert!(!can_access_inference(&snapshot));

        snapshot.task = Some(task(false));
        assert!(can_access_inference(&snapshot));

        snapshot.task = Some(task(true));
        assert!(!can_access_inference(&snapshot));

        snapshot.training.status = TrainingStatus::Done;
        assert!(can_access_inference(&snapshot));
    }

    #[test]
    fn inference_start_requires_idle_or_stopped() {
        let mut snapshot = SessionSnapshot {
            task: Some(task(false)),
            ..SessionSnapshot::default()
        };
        assert!(can_start_inference(&snapshot));

        snapshot.inference.status = InferenceStatus::Running;
        assert!(!can_start_inference(&snapshot));

        snapshot.inference.status = InferenceStatus::Stopped;
        assert!(can_start_inference(&snapshot));

        snapshot.inference.status = InferenceStatus::Error;
        assert!(!can_start_inference(&snapshot));
    }

    #[test]
    fn discard_blocked_while_training_runs() {
        let mut snapshot = SessionSnapshot::default();
        assert!(can_discard_class(&snapshot));

        snapshot.training.status = TrainingStatus::Running;
        assert!(!can_discard_class(&snapshot));

        snapshot.training.status = TrainingStatus::Aborted;
        assert!(can_discard_class(&snapshot));
    }
}
