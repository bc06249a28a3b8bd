//! Reconnect delay schedule.

use clap::Args;
use serde::Serialize;

use chatlink_core::error::AppError;
use chatlink_realtime::Backoff;

use super::Cli;
use crate::output::{self, OutputFormat};

/// Arguments for the backoff command
#[derive(Debug, Args)]
pub struct BackoffArgs {
    /// Number of attempts to show
    #[arg(short = 'n', long, default_value = "8")]
    pub count: usize,
}

#[derive(Debug, Serialize)]
struct BackoffStep {
    attempt: usize,
    delay_ms: u128,
}

/// Execute the backoff command
pub fn execute(args: &BackoffArgs, cli: &Cli) -> Result<(), AppError> {
    let config = cli.load_config()?;
    let steps: Vec<BackoffStep> = Backoff::from_config(&config.realtime)
        .schedule(args.count)
        .into_iter()
        .enumerate()
        .map(|(attempt, delay)| BackoffStep {
            attempt,
            delay_ms: delay.as_millis(),
        })
        .collect();

    match cli.format {
        OutputFormat::Text => {
            println!(
                "Reconnect schedule (base {} ms, max {} ms):",
                config.realtime.reconnect_base_delay_ms, config.realtime.reconnect_max_delay_ms
            );
            for step in &steps {
                output::print_kv(&format!("attempt {}", step.attempt), &format!("{} ms", step.delay_ms));
            }
        }
        OutputFormat::Json => output::print_item(&steps, cli.format),
    }
    Ok(())
}
