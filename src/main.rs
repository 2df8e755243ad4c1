use anyhow::Result;
use clap::Parser;
use podguard::cli::{self, PodguardExecOpts};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse cli and handle clap errors
    let options = PodguardExecOpts::parse();

    podguard::init_logger(Some(options.verbosity.log_level_filter()));

    match podguard::run_podguard_exec(&options).await {
        Ok(_) => std::process::exit(0),
        Err(e) => {
            cli::report_error(&e);
            std::process::exit(1);
        }
    }
}
