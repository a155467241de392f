//! Orbital Horizon - Main Entry Point

use clap::Parser;
use orbital_horizon::cli::{cmd_inspect, cmd_predict, cmd_train, load_config, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orbital_horizon=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Inspect { data } => cmd_inspect(config, &data)?,
        Commands::Train {
            data,
            model,
            n_estimators,
            max_depth,
            learning_rate,
            output,
            report,
        } => cmd_train(
            config,
            &data,
            &model,
            n_estimators,
            max_depth,
            learning_rate,
            output.as_deref(),
            report.as_deref(),
        )?,
        Commands::Predict { data, model, output } => {
            cmd_predict(config, &data, &model, output.as_deref())?
        }
    }

    Ok(())
}
