//! Fine-tuning
//!
//! Provides the step-based loop used to adapt a pretrained forecaster:
//! - `FineTuneConfig` with a linear learning-rate schedule
//! - Callback hooks with a wall-clock step budget and a final-step guard
//! - Periodic logging, evaluation and checkpointing
//! - Best-checkpoint restore when evaluating during training

mod callbacks;
mod config;
mod trainer;

pub use callbacks::{
    FinalStepGuard, LogEntry, StepBudgetGuard, TrainerCallback, TrainerControl, TrainerState,
};
pub use config::FineTuneConfig;
pub use trainer::{
    evaluate, load_checkpoint, save_checkpoint, StepTrainer, TrainingOutcome, TrainingSummary,
};
