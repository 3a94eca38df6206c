//! Kolosal Forecast - Main Entry Point
//!
//! Command-line access to window sampling, forecasting and fine-tuning.

use clap::Parser;
use kolosal_forecast::cli::{cmd_fine_tune, cmd_predict, cmd_windows, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kolosal_forecast=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Windows {
            data,
            id_column,
            target,
            context_length,
            prediction_length,
            mode,
            count,
            shuffle_buffer,
            seed,
        } => {
            cmd_windows(
                &data,
                &id_column,
                &target,
                context_length,
                prediction_length,
                mode,
                count,
                shuffle_buffer,
                seed,
            )?;
        }
        Commands::Predict {
            data,
            id_column,
            target,
            config,
            prediction_length,
            batch_size,
            time_limit,
            checkpoint,
            output,
        } => {
            cmd_predict(
                &data,
                &id_column,
                &target,
                config.as_deref(),
                prediction_length,
                batch_size,
                time_limit,
                checkpoint.as_deref(),
                output.as_deref(),
            )?;
        }
        Commands::FineTune {
            data,
            val,
            id_column,
            target,
            config,
            prediction_length,
            max_steps,
            learning_rate,
            time_limit,
            seed,
            output_dir,
        } => {
            cmd_fine_tune(
                &data,
                val.as_deref(),
                &id_column,
                &target,
                config.as_deref(),
                prediction_length,
                max_steps,
                learning_rate,
                time_limit,
                seed,
                &output_dir,
            )?;
        }
    }

    Ok(())
}
