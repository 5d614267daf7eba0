//! Navigation controller
//!
//! Applies a requested step transition only when the matching guard permits
//! it. Never pushes a duplicate transition: requesting the step that is
//! already active is a no-op returning `false`.

use crate::session::{SessionStore, WorkflowStep};
use crate::workflow::guards;
use std::sync::Arc;
use tracing::debug;

pub struct NavigationController {
    store: Arc<SessionStore>,
}

impl NavigationController {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    /// Home is always reachable.
    pub fn go_home(&self) -> bool {
        self.transition(WorkflowStep::Home, |_| true)
    }

    pub fn go_collect(&self) -> bool {
        self.transition(WorkflowStep::Collect, guards::can_go_to_collect)
    }

    pub fn go_train(&self) -> bool {
        self.transition(WorkflowStep::Train, guards::can_go_to_training)
    }

    pub fn go_infer(&self) -> bool {
        self.transition(WorkflowStep::Infer, guards::can_access_inference)
    }

    fn transition(
        &self,
        step: WorkflowStep,
        guard: impl Fn(&crate::session::SessionSnapshot) -> bool,
    ) -> bool {
        let snapshot = self.store.state();
        if snapshot.step == step {
            return false;
        }
        if !guard(&snapshot) {
            debug!(?step, "navigation rejected by guard");
            return false;
        }
        self.store.set_step(step);
        debug!(?step, "navigated");
        true
    }
}
