//! Step-based fine-tuning loop

use super::callbacks::{
    FinalStepGuard, LogEntry, StepBudgetGuard, TrainerCallback, TrainerControl, TrainerState,
};
use super::config::FineTuneConfig;
use crate::data::TrainingBatch;
use crate::error::{ForecastError, Result};
use crate::model::FineTunableModel;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// How the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingOutcome {
    /// All `max_steps` steps ran
    Completed,
    /// A callback requested an early stop, e.g. the time limit
    Halted,
    /// The batch source ran dry before `max_steps`
    DataExhausted,
}

/// Result of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub steps_completed: usize,
    pub outcome: TrainingOutcome,
    pub last_loss: Option<f32>,
    pub best_eval_loss: Option<f32>,
    /// Empty unless `keep_logs` is set
    pub log_history: Vec<LogEntry>,
    pub elapsed_secs: f64,
}

impl TrainingSummary {
    pub fn was_halted(&self) -> bool {
        self.outcome == TrainingOutcome::Halted
    }
}

/// Write a checkpoint as pretty JSON, creating parent directories
pub fn save_checkpoint<C: Serialize>(path: impl AsRef<Path>, checkpoint: &C) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, checkpoint)?;
    Ok(())
}

pub fn load_checkpoint<C: DeserializeOwned>(path: impl AsRef<Path>) -> Result<C> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    Ok(serde_json::from_reader(reader)?)
}

/// Mean loss of a model over evaluation batches
pub fn evaluate<M: FineTunableModel>(model: &M, batches: &[TrainingBatch]) -> Result<f32> {
    if batches.is_empty() {
        return Err(ForecastError::DataError(
            "no evaluation batches".to_string(),
        ));
    }
    let mut total = 0.0f64;
    for batch in batches {
        total += model.eval_loss(batch)? as f64;
    }
    Ok((total / batches.len() as f64) as f32)
}

/// Drives a [`FineTunableModel`] for a fixed number of steps
pub struct StepTrainer<'a, M: FineTunableModel> {
    model: &'a mut M,
    config: FineTuneConfig,
    callbacks: Vec<Box<dyn TrainerCallback + 'a>>,
    eval_batches: Vec<TrainingBatch>,
    checkpoint_dir: Option<PathBuf>,
}

impl<'a, M: FineTunableModel> StepTrainer<'a, M> {
    pub fn new(model: &'a mut M, config: FineTuneConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            model,
            config,
            callbacks: vec![Box::new(FinalStepGuard)],
            eval_batches: Vec::new(),
            checkpoint_dir: None,
        })
    }

    /// Stop once `time_limit_secs` have passed since training began
    pub fn with_time_limit(mut self, time_limit_secs: Option<f64>) -> Result<Self> {
        if time_limit_secs.is_some() {
            self.callbacks.push(Box::new(StepBudgetGuard::new(time_limit_secs)?));
        }
        Ok(self)
    }

    pub fn with_callback(mut self, callback: impl TrainerCallback + 'a) -> Self {
        self.callbacks.push(Box::new(callback));
        self
    }

    pub fn with_eval_batches(mut self, batches: Vec<TrainingBatch>) -> Self {
        self.eval_batches = batches;
        self
    }

    /// Write `checkpoint-<step>.json` files here on save
    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = Some(dir.into());
        self
    }

    fn evaluation_enabled(&self) -> bool {
        self.config.eval_during_fine_tune && !self.eval_batches.is_empty()
    }

    fn save(&self, step: usize) -> Result<()> {
        match &self.checkpoint_dir {
            Some(dir) => {
                let path = dir.join(format!("checkpoint-{}.json", step));
                debug!(step, path = %path.display(), "Saving checkpoint");
                save_checkpoint(path, &self.model.checkpoint())
            }
            None => Ok(()),
        }
    }

    /// Run the loop over a batch stream
    pub fn train<I>(mut self, batches: I) -> Result<TrainingSummary>
    where
        I: IntoIterator<Item = Result<TrainingBatch>>,
    {
        let start = Instant::now();
        let mut batches = batches.into_iter();
        let mut state = TrainerState::new(self.config.max_steps);
        let mut control = TrainerControl::default();
        let mut best_checkpoint: Option<M::Checkpoint> = None;
        let mut outcome = TrainingOutcome::Completed;

        for callback in self.callbacks.iter_mut() {
            callback.on_train_begin(&state, &mut control);
        }

        while state.global_step < state.max_steps {
            let batch = match batches.next() {
                Some(batch) => batch?,
                None => {
                    debug!(step = state.global_step, "Batch source exhausted");
                    outcome = TrainingOutcome::DataExhausted;
                    break;
                }
            };

            let learning_rate = self.config.learning_rate_at(state.global_step);
            let loss = self.model.fit_step(&batch, learning_rate)?;
            state.global_step += 1;
            state.last_loss = Some(loss);

            let step = state.global_step;
            control.reset_step_flags();
            control.should_log = step % self.config.logging_steps == 0;
            control.should_evaluate =
                self.config.eval_during_fine_tune && step % self.config.eval_steps == 0;
            control.should_save = step % self.config.save_steps == 0;

            for callback in self.callbacks.iter_mut() {
                callback.on_step_end(&state, &mut control);
            }

            let mut eval_loss = None;
            if control.should_evaluate && self.evaluation_enabled() {
                let current = evaluate(&*self.model, &self.eval_batches)?;
                if state.best_eval_loss.map_or(true, |best| current < best) {
                    state.best_eval_loss = Some(current);
                    best_checkpoint = Some(self.model.checkpoint());
                }
                eval_loss = Some(current);
            }

            if control.should_log || eval_loss.is_some() {
                debug!(step, loss, learning_rate, ?eval_loss, "Training step");
                state.log_history.push(LogEntry {
                    step,
                    learning_rate,
                    loss: Some(loss),
                    eval_loss,
                });
            }

            if control.should_training_stop {
                // a usable checkpoint must exist when the loop is cut short
                self.save(step)?;
                outcome = TrainingOutcome::Halted;
                break;
            }
            if control.should_save {
                self.save(step)?;
            }
        }

        if let Some(best) = best_checkpoint {
            debug!(best_eval_loss = ?state.best_eval_loss, "Restoring best checkpoint");
            self.model.restore(best);
        }

        info!(
            steps = state.global_step,
            outcome = ?outcome,
            last_loss = ?state.last_loss,
            "Fine-tuning finished"
        );

        Ok(TrainingSummary {
            steps_completed: state.global_step,
            outcome,
            last_loss: state.last_loss,
            best_eval_loss: state.best_eval_loss,
            log_history: if self.config.keep_logs {
                state.log_history
            } else {
                Vec::new()
            },
            elapsed_secs: start.elapsed().as_secs_f64(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NaiveCheckpoint, NaiveQuantileModel};
    use ndarray::array;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn batch(offset: f32) -> TrainingBatch {
        TrainingBatch::Raw {
            context: array![[0.0f32, 0.0], [1.0, 1.0]],
            target: array![[offset, offset], [1.0 + offset, 1.0 + offset]],
        }
    }

    fn endless(offset: f32) -> impl Iterator<Item = Result<TrainingBatch>> {
        std::iter::repeat_with(move || Ok(batch(offset)))
    }

    struct StopAt(usize);

    impl TrainerCallback for StopAt {
        fn on_step_end(&mut self, state: &TrainerState, control: &mut TrainerControl) {
            if state.global_step >= self.0 {
                control.should_training_stop = true;
            }
        }
    }

    struct CountSaves(Arc<AtomicUsize>);

    impl TrainerCallback for CountSaves {
        fn on_step_end(&mut self, _state: &TrainerState, control: &mut TrainerControl) {
            if control.should_save {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn test_runs_max_steps() {
        let mut model = NaiveQuantileModel::new();
        let config = FineTuneConfig::new()
            .with_learning_rate(0.1)
            .with_max_steps(20)
            .with_logging_steps(5)
            .with_keep_logs(true);
        let summary = StepTrainer::new(&mut model, config).unwrap().train(endless(2.0)).unwrap();

        assert_eq!(summary.outcome, TrainingOutcome::Completed);
        assert_eq!(summary.steps_completed, 20);
        let logged: Vec<usize> = summary.log_history.iter().map(|e| e.step).collect();
        assert_eq!(logged, vec![5, 10, 15, 20]);
        assert!(model.bias() > 0.0);
    }

    #[test]
    fn test_final_step_forces_save() {
        let saves = Arc::new(AtomicUsize::new(0));
        let mut model = NaiveQuantileModel::new();
        let config = FineTuneConfig::new().with_max_steps(7).with_save_steps(100);
        StepTrainer::new(&mut model, config)
            .unwrap()
            .with_callback(CountSaves(saves.clone()))
            .train(endless(1.0))
            .unwrap();
        // the guard runs before the counter, so only the final step saves
        assert_eq!(saves.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_request_halts_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = NaiveQuantileModel::new();
        let config = FineTuneConfig::new().with_max_steps(50).with_save_steps(100);
        let summary = StepTrainer::new(&mut model, config)
            .unwrap()
            .with_callback(StopAt(3))
            .with_checkpoint_dir(dir.path())
            .train(endless(1.0))
            .unwrap();

        assert!(summary.was_halted());
        assert_eq!(summary.steps_completed, 3);
        let ckpt: NaiveCheckpoint = load_checkpoint(dir.path().join("checkpoint-3.json")).unwrap();
        assert_eq!(ckpt.bias, model.bias());
    }

    #[test]
    fn test_exhausted_source() {
        let mut model = NaiveQuantileModel::new();
        let config = FineTuneConfig::new().with_max_steps(10);
        let source = (0..4).map(|_| Ok(batch(1.0)));
        let summary = StepTrainer::new(&mut model, config).unwrap().train(source).unwrap();
        assert_eq!(summary.outcome, TrainingOutcome::DataExhausted);
        assert_eq!(summary.steps_completed, 4);
    }

    #[test]
    fn test_best_checkpoint_restored() {
        let mut model = NaiveQuantileModel::new();
        // evaluation data prefers a small bias; training keeps pushing it up
        let config = FineTuneConfig::new()
            .with_learning_rate(0.5)
            .with_max_steps(10)
            .with_evaluation(1);
        let summary = StepTrainer::new(&mut model, config)
            .unwrap()
            .with_eval_batches(vec![batch(0.4)])
            .train(endless(5.0))
            .unwrap();

        let best = summary.best_eval_loss.unwrap();
        let eval = evaluate(&model, &[batch(0.4)]).unwrap();
        assert!((eval - best).abs() < 1e-6);
    }

    #[test]
    fn test_time_limit_halts() {
        let mut model = NaiveQuantileModel::new();
        let config = FineTuneConfig::new().with_max_steps(1_000_000);
        let summary = StepTrainer::new(&mut model, config)
            .unwrap()
            .with_time_limit(Some(0.0))
            .unwrap()
            .train(endless(1.0).inspect(|_| std::thread::sleep(std::time::Duration::from_millis(1))))
            .unwrap();
        assert!(summary.was_halted());
        assert!(summary.steps_completed >= 1);
    }

    #[test]
    fn test_batch_error_propagates() {
        let mut model = NaiveQuantileModel::new();
        let config = FineTuneConfig::new().with_max_steps(5);
        let source = vec![
            Ok(batch(1.0)),
            Err(ForecastError::DataError("broken".to_string())),
        ];
        let result = StepTrainer::new(&mut model, config).unwrap().train(source);
        assert!(matches!(result, Err(ForecastError::DataError(_))));
    }
}
