//! Stratum command-line entry point.
//!
//! Binary name: `stratum`
//!
//! Parses CLI arguments, sets up tracing, loads the bus configuration, then
//! dispatches to the requested command.

mod cli;

use std::path::PathBuf;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use stratum_infra::config::{load_bus_config, CONFIG_FILE};
use stratum_observe::tracing_setup::{init_tracing, shutdown_tracing, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = cli.log_filter();
    let log_format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    init_tracing(filter, log_format, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need a configuration
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "stratum", &mut std::io::stdout());
        return Ok(());
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let config = load_bus_config(&config_path).await;

    let result = match cli.command {
        Commands::Simulate {
            seeds,
            duration_ms,
            max_depth,
        } => {
            let options = cli::simulate::SimulateOptions {
                seeds,
                duration: std::time::Duration::from_millis(duration_ms),
                max_depth,
            };
            cli::simulate::run(config, options, cli.json).await
        }
        Commands::Config => cli::config::show(&config, &config_path, cli.json),
        Commands::Completions { .. } => Ok(()),
    };

    shutdown_tracing();
    result
}
