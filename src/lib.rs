//! podguard classifies the events of a workload on two data paths:
//!
//! - packets received on an interface go through the [l4 firewall](l4_firewall),
//!   which forwards or drops them according to a port rule table;
//! - syscall entries of tracked processes are counted per process by the
//!   [syscall counter](syscall_counter).
//!
//! This crate is the control plane around them. The [`GuardManager`] builds
//! the classifiers of each workload from its [configuration](config), hands out
//! the handles the transport uses to deliver events, reaps the counters of
//! exited processes and collects metrics. The [metrics collector](metrics)
//! logs them periodically and detaches everything on shutdown.
//!
//! The `podguard-exec` binary replays recorded events through the classifiers:
//!
//! ```sh
//! podguard-exec replay --config podguard.ini --workload pod-a events.txt
//! podguard-exec check-config --config podguard.ini
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::io::BufReader;

pub mod cli;
pub mod config;
pub mod manager;
pub mod metrics;
pub mod replay;
pub mod term_print;

pub use manager::{GuardManager, ManagerError, WorkloadMetrics};

use crate::{
    cli::{Commands, ConfigOpts, OutputFormat, PodguardExecOpts, ReplayOpts},
    config::GuardConfig,
    replay::ReplaySummary,
    term_print::TermPrintable,
};

pub mod metadata {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// Init logger. We log from info level and above, hide timestamp
/// and module path.
/// If RUST_LOG is set, we assume the user wants to debug something
/// and use env_logger default behaviour.
pub fn init_logger(override_log_level: Option<log::LevelFilter>) {
    if std::env::var_os("RUST_LOG").is_some() {
        env_logger::init();
    } else {
        let level_filter = override_log_level.unwrap_or(log::LevelFilter::Info);

        env_logger::builder()
            .filter_level(level_filter)
            .format_timestamp(None)
            .format_module_path(false)
            .init();
    }
}

pub async fn run_podguard_exec(options: &PodguardExecOpts) -> Result<()> {
    match &options.command {
        Commands::Replay(opts) => run_replay(opts).await,
        Commands::CheckConfig(opts) => check_config(opts),
    }
}

#[derive(Serialize)]
struct ReplayReport {
    summary: ReplaySummary,
    metrics: Vec<WorkloadMetrics>,
}

async fn run_replay(opts: &ReplayOpts) -> Result<()> {
    let config = GuardConfig::with_custom_file(&opts.config.config)?;
    let workload_config = config.workload_config()?;
    let metrics_config = config.metrics_config()?;

    let manager = Arc::new(GuardManager::new());
    manager
        .attach(&opts.workload, workload_config)
        .with_context(|| format!("Failed to attach workload {}", opts.workload))?;
    let collector = metrics::start_metrics_collector(manager.clone(), metrics_config);

    let summary = if opts.events == "-" {
        let stdin = BufReader::new(tokio::io::stdin());
        replay::replay(&manager, &opts.workload, stdin).await
    } else {
        let file = tokio::fs::File::open(&opts.events)
            .await
            .with_context(|| format!("Error opening events file {}", opts.events))?;
        replay::replay(&manager, &opts.workload, BufReader::new(file)).await
    };

    // read the counters before the collector detaches the workload
    let metrics = manager.collect_metrics();
    collector.stop().await?;
    let summary = summary?;

    match opts.format {
        OutputFormat::Table => {
            summary.term_print()?;
            metrics.term_print()?;
        }
        OutputFormat::Json => {
            let report = ReplayReport { summary, metrics };
            serde_json::to_string_pretty(&report)?.term_print()?;
        }
    }
    Ok(())
}

fn check_config(opts: &ConfigOpts) -> Result<()> {
    let config = GuardConfig::with_custom_file(&opts.config)?;
    let workload_config = config.workload_config()?;
    let metrics_config = config.metrics_config()?;

    config.get_configs().term_print()?;
    format!("{workload_config:#?}\n{metrics_config:#?}").term_print()?;
    Ok(())
}
