//! Kolosal Forecast CLI Module
//!
//! Command-line interface for inspecting training windows, forecasting and
//! fine-tuning with the reference random-walk model.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::data::{
    RaggedSeriesIndex, ReservoirShuffle, SamplerMode, SeriesCollection, WindowSampler,
    DEFAULT_TARGET,
};
use crate::forecaster::{ForecasterConfig, PretrainedForecaster};
use crate::model::NaiveQuantileModel;
use crate::training::FineTuneConfig;
use std::sync::Arc;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<22} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "kolosal-forecast")]
#[command(author = "KolosalAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Windowing and time-budgeted forecasting for pretrained time-series models")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sample training or validation windows from a long-format CSV
    Windows {
        /// Input CSV with one row per observation
        #[arg(short, long)]
        data: PathBuf,

        /// Item id column
        #[arg(long, default_value = "item_id")]
        id_column: String,

        /// Target column
        #[arg(short, long, default_value = DEFAULT_TARGET)]
        target: String,

        #[arg(long, default_value = "64")]
        context_length: usize,

        #[arg(short, long, default_value = "8")]
        prediction_length: usize,

        /// Sampling mode (training, validation)
        #[arg(short, long, default_value = "validation")]
        mode: SamplerMode,

        /// Number of windows to print
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,

        /// Shuffle buffer size, 0 disables shuffling
        #[arg(long, default_value = "0")]
        shuffle_buffer: i64,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Forecast every series of a long-format CSV
    Predict {
        #[arg(short, long)]
        data: PathBuf,

        #[arg(long, default_value = "item_id")]
        id_column: String,

        #[arg(short, long, default_value = DEFAULT_TARGET)]
        target: String,

        /// Forecaster configuration (JSON); flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        prediction_length: Option<usize>,

        #[arg(long)]
        batch_size: Option<usize>,

        /// Time limit in seconds
        #[arg(long)]
        time_limit: Option<f64>,

        /// Output directory of an earlier fine-tune run
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Output CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fine-tune the reference model and keep it if validation improves
    FineTune {
        #[arg(short, long)]
        data: PathBuf,

        /// Validation CSV; defaults to the training data
        #[arg(long)]
        val: Option<PathBuf>,

        #[arg(long, default_value = "item_id")]
        id_column: String,

        #[arg(short, long, default_value = DEFAULT_TARGET)]
        target: String,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        prediction_length: Option<usize>,

        #[arg(long)]
        max_steps: Option<usize>,

        #[arg(long)]
        learning_rate: Option<f64>,

        #[arg(long)]
        time_limit: Option<f64>,

        #[arg(long)]
        seed: Option<u64>,

        /// Directory for the fine-tuned checkpoint
        #[arg(short, long, default_value = "kolosal-forecast-output")]
        output_dir: PathBuf,
    },
}

// ─── Data loading ──────────────────────────────────────────────────────────────

fn load_series(path: &Path, id_column: &str, target: &str) -> anyhow::Result<SeriesCollection> {
    step_run(&format!("Loading {}", path.display()));
    let start = Instant::now();
    let collection = SeriesCollection::from_csv(path, id_column, target)?;
    step_done(&format!(
        "{} series, {} observations in {:?}",
        collection.len(),
        collection.total_len(),
        start.elapsed()
    ));
    Ok(collection)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ForecasterConfig> {
    Ok(match path {
        Some(path) => ForecasterConfig::from_json_file(path)?,
        None => ForecasterConfig::default(),
    })
}

fn write_csv(df: &mut DataFrame, path: &Path) -> anyhow::Result<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).finish(df)?;
    Ok(())
}

fn fmt_values(values: &[f32]) -> String {
    let shown: Vec<String> = values
        .iter()
        .map(|v| if v.is_nan() { "·".to_string() } else { format!("{:.2}", v) })
        .collect();
    shown.join(" ")
}

// ─── Commands ──────────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
pub fn cmd_windows(
    data_path: &Path,
    id_column: &str,
    target: &str,
    context_length: usize,
    prediction_length: usize,
    mode: SamplerMode,
    count: usize,
    shuffle_buffer: i64,
    seed: Option<u64>,
) -> anyhow::Result<()> {
    section("Windows");
    let collection = load_series(data_path, id_column, target)?;
    let index = Arc::new(RaggedSeriesIndex::new(&collection, DEFAULT_TARGET)?);

    let mut sampler = WindowSampler::new(index, context_length, prediction_length, mode)?;
    if let Some(seed) = seed {
        sampler = sampler.with_seed(seed);
    }
    let shuffle_seed = seed.map(|s| s.wrapping_add(1));
    let windows = ReservoirShuffle::from_buffer_size(sampler.into_iter(), Some(shuffle_buffer), shuffle_seed)?;

    let ids = collection.item_ids();
    println!();
    for window in windows.take(count) {
        let id = ids.get(window.item_index).map(String::as_str).unwrap_or("?");
        println!(
            "  {} {} {}",
            accent(&format!("{:<12}", id)),
            muted(&format!("@{:<6}", window.forecast_start)),
            format!("pad {}/{}", window.context_padding(), context_length).dimmed()
        );
        println!("    {} {}", muted("past  "), fmt_values(&window.context));
        println!("    {} {}", muted("future"), fmt_values(&window.future));
    }
    println!();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_predict(
    data_path: &Path,
    id_column: &str,
    target: &str,
    config_path: Option<&Path>,
    prediction_length: Option<usize>,
    batch_size: Option<usize>,
    time_limit: Option<f64>,
    checkpoint: Option<&Path>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Predict");

    let mut config = load_config(config_path)?;
    if let Some(length) = prediction_length {
        config.prediction_length = length;
    }
    if let Some(size) = batch_size {
        config.inference.batch_size = Some(size);
    }

    kv("Model", &config.resolved_model_path());
    kv("Dtype", &format!("{:?}", config.resolved_torch_dtype()));
    kv("Batch size", &config.batch_size().to_string());

    let collection = load_series(data_path, id_column, target)?;
    let mut forecaster = PretrainedForecaster::new(config, NaiveQuantileModel::new())?;
    if let Some(dir) = checkpoint {
        step_run("Restoring fine-tuned weights");
        forecaster.load_fine_tuned(dir)?;
        step_done(&format!("bias {:.4}", forecaster.model().bias()));
    }

    step_run("Forecasting");
    let start = Instant::now();
    let forecast = forecaster.predict(&collection, time_limit)?;
    step_done(&format!("{} series in {:?}", forecast.num_items(), start.elapsed()));

    let mut df = forecast.to_dataframe()?;
    match output {
        Some(path) => {
            write_csv(&mut df, path)?;
            println!("  {} {}", ok("✓"), format!("Saved → {}", path.display()));
        }
        None => println!("\n{}", df),
    }
    println!();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_fine_tune(
    data_path: &Path,
    val_path: Option<&Path>,
    id_column: &str,
    target: &str,
    config_path: Option<&Path>,
    prediction_length: Option<usize>,
    max_steps: Option<usize>,
    learning_rate: Option<f64>,
    time_limit: Option<f64>,
    seed: Option<u64>,
    output_dir: &Path,
) -> anyhow::Result<()> {
    section("Fine-tune");

    let mut config = load_config(config_path)?;
    let mut ft: FineTuneConfig = config.fine_tune_config.clone();
    if let Some(steps) = max_steps {
        ft = ft.with_max_steps(steps);
    }
    if let Some(lr) = learning_rate {
        ft = ft.with_learning_rate(lr);
    }
    if let Some(seed) = seed {
        ft = ft.with_seed(seed);
    }
    if let Some(length) = prediction_length {
        config.prediction_length = length;
    }
    let config = config.with_fine_tune(ft).with_output_dir(output_dir);

    let train = load_series(data_path, id_column, target)?;
    let val = match val_path {
        Some(path) => load_series(path, id_column, target)?,
        None => train.clone(),
    };

    let mut forecaster = PretrainedForecaster::new(config, NaiveQuantileModel::new())?;
    step_run("Training");
    let report = forecaster.fit(&train, Some(&val), time_limit)?;
    step_done(&format!("{:.2}s", report.elapsed_secs));

    println!();
    if let Some(summary) = &report.training {
        kv("Steps", &format!("{} ({:?})", summary.steps_completed, summary.outcome));
        if let Some(loss) = summary.last_loss {
            kv("Last loss", &format!("{:.4}", loss));
        }
    }
    if let Some(loss) = report.zero_shot_loss {
        kv("Zero-shot loss", &format!("{:.4}", loss));
    }
    if let Some(loss) = report.fine_tuned_loss {
        kv("Fine-tuned loss", &format!("{:.4}", loss));
    }
    if report.kept_fine_tuned {
        println!("  {} {}", ok("✓"), format!("Kept fine-tuned weights → {}", output_dir.display()));
    } else {
        println!("  {} {}", "!".yellow(), "Fine-tuning did not help, kept pretrained weights");
    }
    println!();
    Ok(())
}
