//! CLI entry point for navi-daemon
//!
//! Reads navigation tags from `logcat`, reconciles them into one navigation event and
//! publishes a `liveNaviData` snapshot per record.
//!
//! # Usage
//!
//! ```bash
//! navi-daemon --config /data/navi.toml
//! navi-daemon --log-level debug --json-logs
//! navi-daemon --print-config
//! ```
//!
//! Logs go to stderr so stdout stays a clean JSON-lines stream.

#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use navi_daemon::priority::set_process_priority;
use navi_daemon::{NaviService, Settings, Shutdown};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "navi-daemon")]
#[command(about = "Navigation event relay for logcat navigation tags", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Process nice value (-20..=19)
    #[arg(long, allow_hyphen_values = true)]
    priority: Option<i32>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.to_lowercase()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if settings.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        settings.log_level = level;
    }
    if cli.json_logs {
        settings.json_logs = true;
    }
    if cli.priority.is_some() {
        settings.priority = cli.priority;
    }
    settings.validate()?;

    if cli.print_config {
        let rendered = toml::to_string_pretty(&settings).context("Failed to render configuration")?;
        print!("{rendered}");
        return Ok(());
    }

    init_tracing(&settings);
    info!(version = env!("CARGO_PKG_VERSION"), "navi-daemon starting");

    if let Some(nice) = settings.priority {
        set_process_priority(nice);
    }

    let shutdown = Shutdown::new();
    let signals = shutdown.listen_for_signals();
    let (mut service, tasks) = NaviService::from_settings(&settings, shutdown.clone()).await?;

    let result = service.run().await;

    shutdown.trigger();
    signals.abort();
    for task in tasks {
        let _ = task.await;
    }

    match result {
        Ok(stats) => {
            info!(
                records = stats.records,
                published = stats.published,
                reconnects = stats.reconnects,
                "navi-daemon stopped"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Log source unavailable");
            Err(e).context("Navigation relay failed")
        }
    }
}
