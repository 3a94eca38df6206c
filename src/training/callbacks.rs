//! Trainer callbacks
//!
//! Callbacks observe the loop state and steer it through [`TrainerControl`]
//! flags. Two guards are provided:
//! - [`StepBudgetGuard`] - stops training once a wall-clock limit is exceeded
//! - [`FinalStepGuard`] - forces log, evaluation and save on the last step

use crate::budget::Deadline;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// One entry of the training log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub step: usize,
    pub learning_rate: f64,
    pub loss: Option<f32>,
    pub eval_loss: Option<f32>,
}

/// Read-only view of the loop handed to callbacks
#[derive(Debug, Clone, Default)]
pub struct TrainerState {
    /// Optimizer steps completed
    pub global_step: usize,
    pub max_steps: usize,
    pub last_loss: Option<f32>,
    pub best_eval_loss: Option<f32>,
    pub log_history: Vec<LogEntry>,
}

impl TrainerState {
    pub fn new(max_steps: usize) -> Self {
        Self {
            max_steps,
            ..Default::default()
        }
    }
}

/// Flags a callback may raise for the current step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrainerControl {
    pub should_training_stop: bool,
    pub should_log: bool,
    pub should_evaluate: bool,
    pub should_save: bool,
}

impl TrainerControl {
    /// Clear the per-step flags; a stop request persists
    pub fn reset_step_flags(&mut self) {
        self.should_log = false;
        self.should_evaluate = false;
        self.should_save = false;
    }
}

/// Hooks into the step loop; every hook defaults to a no-op
pub trait TrainerCallback: Send {
    fn on_train_begin(&mut self, _state: &TrainerState, _control: &mut TrainerControl) {}

    fn on_step_end(&mut self, _state: &TrainerState, _control: &mut TrainerControl) {}
}

impl<T: TrainerCallback + ?Sized> TrainerCallback for &mut T {
    fn on_train_begin(&mut self, state: &TrainerState, control: &mut TrainerControl) {
        (**self).on_train_begin(state, control);
    }

    fn on_step_end(&mut self, state: &TrainerState, control: &mut TrainerControl) {
        (**self).on_step_end(state, control);
    }
}

/// Halts the loop after the step during which the time limit was reached
#[derive(Debug, Clone)]
pub struct StepBudgetGuard {
    limit: Option<Duration>,
    deadline: Option<Deadline>,
}

impl StepBudgetGuard {
    /// The clock starts when training begins
    pub fn new(time_limit_secs: Option<f64>) -> Result<Self> {
        // reuse the limit validation of `Deadline`
        let limit = Deadline::new(time_limit_secs)?.limit();
        Ok(Self {
            limit,
            deadline: None,
        })
    }

    /// Measure against an already running deadline
    pub fn from_deadline(deadline: Deadline) -> Self {
        Self {
            limit: deadline.limit(),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<&Deadline> {
        self.deadline.as_ref()
    }

    /// Surface an exhausted budget as an error, for callers that want one
    pub fn check(&self) -> Result<()> {
        match &self.deadline {
            Some(deadline) => deadline.check(),
            None => Ok(()),
        }
    }
}

impl TrainerCallback for StepBudgetGuard {
    fn on_train_begin(&mut self, _state: &TrainerState, _control: &mut TrainerControl) {
        if self.deadline.is_none() {
            self.deadline = Some(match self.limit {
                Some(limit) => Deadline::from_duration(limit),
                None => Deadline::unlimited(),
            });
        }
    }

    fn on_step_end(&mut self, state: &TrainerState, control: &mut TrainerControl) {
        let Some(deadline) = &self.deadline else {
            return;
        };
        if deadline.is_reached() {
            warn!(
                step = state.global_step,
                elapsed_secs = deadline.elapsed().as_secs_f64(),
                limit_secs = ?deadline.limit().map(|l| l.as_secs_f64()),
                "Training time limit exceeded, interrupting training"
            );
            control.should_training_stop = true;
        }
    }
}

/// Forces a log, an evaluation and a save once `max_steps` is reached
#[derive(Debug, Clone, Copy, Default)]
pub struct FinalStepGuard;

impl TrainerCallback for FinalStepGuard {
    fn on_step_end(&mut self, state: &TrainerState, control: &mut TrainerControl) {
        if state.global_step >= state.max_steps {
            control.should_log = true;
            control.should_evaluate = true;
            control.should_save = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_final_step_guard() {
        let mut guard = FinalStepGuard;
        let mut state = TrainerState::new(10);
        let mut control = TrainerControl::default();

        state.global_step = 9;
        guard.on_step_end(&state, &mut control);
        assert_eq!(control, TrainerControl::default());

        state.global_step = 10;
        guard.on_step_end(&state, &mut control);
        assert!(control.should_log && control.should_evaluate && control.should_save);
        assert!(!control.should_training_stop);
    }

    #[test]
    fn test_budget_guard_stops_after_limit() {
        let mut guard = StepBudgetGuard::new(Some(0.0)).unwrap();
        let state = TrainerState::new(100);
        let mut control = TrainerControl::default();

        guard.on_train_begin(&state, &mut control);
        thread::sleep(Duration::from_millis(2));
        guard.on_step_end(&state, &mut control);
        assert!(control.should_training_stop);
        assert!(guard.check().is_err());
    }

    #[test]
    fn test_budget_guard_stops_at_exact_limit() {
        let mut guard = StepBudgetGuard::from_deadline(Deadline::from_duration(Duration::ZERO));
        let state = TrainerState::new(100);
        let mut control = TrainerControl::default();
        guard.on_step_end(&state, &mut control);
        assert!(control.should_training_stop);
    }

    #[test]
    fn test_budget_clock_starts_with_training() {
        let mut guard = StepBudgetGuard::new(Some(0.05)).unwrap();
        thread::sleep(Duration::from_millis(80));

        let state = TrainerState::new(100);
        let mut control = TrainerControl::default();
        guard.on_train_begin(&state, &mut control);
        guard.on_step_end(&state, &mut control);
        assert!(!control.should_training_stop);
    }

    #[test]
    fn test_budget_guard_without_limit() {
        let mut guard = StepBudgetGuard::new(None).unwrap();
        let state = TrainerState::new(100);
        let mut control = TrainerControl::default();
        guard.on_train_begin(&state, &mut control);
        guard.on_step_end(&state, &mut control);
        assert!(!control.should_training_stop);
    }

    #[test]
    fn test_stop_survives_flag_reset() {
        let mut control = TrainerControl {
            should_training_stop: true,
            should_log: true,
            should_evaluate: true,
            should_save: true,
        };
        control.reset_step_flags();
        assert!(control.should_training_stop);
        assert!(!control.should_save);
    }
}
