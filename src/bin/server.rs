//! # Event Listener Server
//!
//! Standalone server binary. The container runs it as
//!
//! ```bash
//! event-listener --processes=1 --workers=4 --log-level=DEBUG
//! ```
//!
//! and local development as `event-listener --dev --log-level=DEBUG`.

use anyhow::Context;
use clap::Parser;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use event_listener::bootstrap::ListenerSystem;
use event_listener::config::ConfigManager;
use event_listener::logging;

#[derive(Parser, Debug)]
#[command(name = "event-listener")]
#[command(about = "Receive access controller events and relay them through the outbox")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Process count; only a single process is run in-process
    #[arg(long)]
    processes: Option<usize>,

    /// Runtime worker threads
    #[arg(long)]
    workers: Option<usize>,

    /// TRACE, DEBUG, INFO, WARN or ERROR
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Development mode: development environment and a logging message sink
    #[arg(long)]
    dev: bool,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Directory holding event-listener.yaml
    #[arg(long)]
    config_dir: Option<PathBuf>,
}

/// Load `.env` (the given file, or one found from the working directory)
/// and then parse, so env fallbacks such as `LOG_LEVEL` see its values
fn parse_cli<I, T>(dotenv: Option<&Path>, args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match dotenv {
        Some(path) => {
            dotenvy::from_path(path).ok();
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
    Cli::try_parse_from(args)
}

fn main() -> anyhow::Result<()> {
    let cli = parse_cli(None, std::env::args_os()).unwrap_or_else(|e| e.exit());

    let environment = if cli.dev {
        "development".to_string()
    } else {
        ConfigManager::detect_environment()
    };
    logging::init_structured_logging(&environment, cli.log_level.as_deref());

    let mut config_manager =
        ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &environment)
            .context("failed to load configuration")?;
    apply_cli_overrides(&mut config_manager, &cli);
    config_manager
        .revalidate()
        .context("invalid configuration after CLI overrides")?;

    let server = &config_manager.config().server;
    if server.processes > 1 {
        warn!(
            processes = server.processes,
            "Multiple processes requested; running a single process. Scale with replicas instead"
        );
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(server.workers)
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    info!("🚀 Starting Event Listener...");
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));
    info!("   Environment: {}", config_manager.environment());
    info!("   Config: {}", config_manager.config_directory().display());
    info!("   Workers: {}", server.workers);

    runtime.block_on(run(Arc::new(config_manager)))
}

fn apply_cli_overrides(config_manager: &mut ConfigManager, cli: &Cli) {
    let config = config_manager.config_mut();
    if let Some(processes) = cli.processes {
        config.server.processes = processes;
    }
    if let Some(workers) = cli.workers {
        config.server.workers = workers;
    }
    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.dev {
        config.kafka.enabled = false;
    }
}

async fn run(config_manager: Arc<ConfigManager>) -> anyhow::Result<()> {
    let handle = ListenerSystem::bootstrap(config_manager)
        .await
        .context("failed to start event listener")?;

    info!("🎉 Event Listener started on {}", handle.local_addr());
    info!("   Press Ctrl+C to shutdown gracefully");

    shutdown_signal().await;
    info!("🛑 Shutdown signal received, initiating graceful shutdown...");

    if let Err(e) = handle.stop().await {
        error!("Failed to stop event listener cleanly: {}", e);
    }

    info!("👋 Event Listener shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_log_level_from_dotenv_file() {
        let dir = TempDir::new().unwrap();
        let dotenv = dir.path().join(".env");
        fs::write(&dotenv, "LOG_LEVEL=WARN\n").unwrap();
        std::env::remove_var("LOG_LEVEL");

        let cli = parse_cli(Some(&dotenv), ["event-listener", "--dev"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("WARN"));
        assert!(cli.dev);

        let cli = parse_cli(Some(&dotenv), ["event-listener", "--log-level", "DEBUG"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("DEBUG"));

        std::env::remove_var("LOG_LEVEL");
    }
}
