//! Kolosal FairLab - Main Entry Point
//!
//! Runs fairness-aware model selection experiments from the command line.

use clap::Parser;
use kolosal_fairlab::cli::{cmd_evaluate, cmd_info, cmd_sweep, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kolosal_fairlab=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sweep { config, data, family, trials, output } => {
            cmd_sweep(&config, data.as_deref(), family.as_deref(), trials, output.as_deref())?;
        }
        Commands::Evaluate { config, data, spec, theta } => {
            cmd_evaluate(&config, data.as_deref(), spec.as_deref(), theta)?;
        }
        Commands::Info { config, data } => {
            cmd_info(&config, data.as_deref())?;
        }
    }

    Ok(())
}
