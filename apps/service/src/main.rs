use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use certwatch_service::monitoring::address::clean_address;
use certwatch_service::{Config, MonitorStore, MonitoringScheduler, database, history};

/// Sweep registered endpoints for availability and TLS certificate expiry
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Config file; defaults to $XDG_CONFIG_HOME/certwatch/config.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sweep continuously until interrupted
    Run,
    /// Run a single sweep and print its report
    Sweep,
    /// Register a monitor
    Add { url: String },
    /// List monitors with their current state
    List,
    /// Delete a monitor and its history
    Remove { id: i64 },
    /// Print a monitor's history, oldest first
    History { id: i64 },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_ref())?;

    logger::init_with_directive(&config.logging.level);

    match cli.command {
        Command::Config => print!("{config}"),
        Command::Run => {
            let store = open_store(&config).await?;
            let shutdown = CancellationToken::new();
            let handle = MonitoringScheduler::from_config(&config.monitoring, store)?
                .spawn(shutdown.clone());

            tokio::signal::ctrl_c().await?;
            info!("Interrupt received, finishing current sweep");
            shutdown.cancel();
            handle.await?;
        }
        Command::Sweep => {
            let store = open_store(&config).await?;
            let report =
                MonitoringScheduler::from_config(&config.monitoring, store)?.run_sweep().await?;
            println!(
                "listed: {}, recorded: {}, failed: {}",
                report.listed, report.recorded, report.failed
            );
        }
        Command::Add { url } => {
            let Some(url) = clean_address(&url) else {
                bail!("Monitor URL must not be empty");
            };
            let monitor = open_store(&config).await?.create_monitor(url).await?;
            println!("{}", serde_json::to_string_pretty(&monitor)?);
        }
        Command::List => {
            let monitors = open_store(&config).await?.list_monitors().await?;
            println!("{}", serde_json::to_string_pretty(&monitors)?);
        }
        Command::Remove { id } => {
            if !open_store(&config).await?.delete_monitor(id).await? {
                bail!("Monitor {id} not found");
            }
            println!("Monitor {id} deleted");
        }
        Command::History { id } => {
            let store = open_store(&config).await?;
            let observations = history(store.as_ref(), id).await?;
            println!("{}", serde_json::to_string_pretty(&observations)?);
        }
    }

    Ok(())
}

async fn open_store(config: &Config) -> Result<Arc<dyn MonitorStore>> {
    Ok(Arc::new(database::connect(&config.database).await?))
}
