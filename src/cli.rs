use std::env;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};

pub const NAME: &str = "podguard-exec";

#[derive(Parser, Debug, Clone)]
#[clap(name = NAME)]
#[clap(about = "Replay workload events through the podguard classifiers")]
#[clap(version = crate::metadata::VERSION)]
#[clap(disable_help_subcommand = true)]
pub struct PodguardExecOpts {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Attach a workload and replay an event file through its classifiers
    Replay(ReplayOpts),

    /// Parse a configuration file and print the resolved modules
    CheckConfig(ConfigOpts),
}

#[derive(Args, Debug, Clone)]
pub struct ConfigOpts {
    /// Configuration file
    #[clap(long)]
    pub config: String,
}

#[derive(Args, Debug, Clone)]
pub struct ReplayOpts {
    #[command(flatten)]
    pub config: ConfigOpts,

    /// Workload id the events belong to
    #[clap(long, default_value = "default")]
    pub workload: String,

    /// Output format of the final counters
    #[clap(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Event file, `-` reads standard input
    pub events: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

fn show_backtrace() -> bool {
    log::max_level() >= log::LevelFilter::Debug
        || env::var("RUST_BACKTRACE").is_ok_and(|value| value == "1")
}

/// Log an error with its causes, and its backtrace when debugging.
pub fn report_error(e: &anyhow::Error) {
    if show_backtrace() {
        log::error!("{:?}", e);
    } else {
        log::error!("{:#}", e);
    }
}
