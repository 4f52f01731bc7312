//! CLI command definitions for the `stratum` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod config;
pub mod simulate;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Drive and inspect a Stratum layer bus.
#[derive(Parser)]
#[command(name = "stratum", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Only log errors. Command output is unaffected; ignored with -v.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Bus configuration file (defaults to ./stratum.toml).
    #[arg(short, long, global = true, env = "STRATUM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write log lines as JSON objects.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Also export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default tracing directives for the requested verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "warn",
            1 => "info,stratum_core=debug",
            _ => "trace",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a relay cascade on a fresh bus and report what happened.
    #[command(alias = "sim")]
    Simulate {
        /// Number of perception seeds sent to the first layer.
        #[arg(long, default_value_t = 5)]
        seeds: usize,

        /// How long to let the cascade run before sweeping, in milliseconds.
        #[arg(long, default_value_t = 500)]
        duration_ms: u64,

        /// Hop limit for relayed follow-ups.
        #[arg(long, default_value_t = 6)]
        max_depth: u64,
    },

    /// Print the effective bus configuration.
    Config,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
