use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use reco_core::config::OrchestratorConfig;
use reco_core::event_bus::EventBus;
use reco_core::orchestrator::Orchestrator;
use reco_server::{serve, AppState};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "reco-engine")]
#[command(about = "Headless vehicle recommendation orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Serve {
        #[arg(long, alias = "host", default_value = "127.0.0.1")]
        hostname: String,
        #[arg(long, default_value_t = 3000)]
        port: u16,
        /// Optional TOML config file, applied over the defaults and before
        /// the RECO_* environment overlay.
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        logs_dir: Option<PathBuf>,
        #[arg(long, default_value_t = 14)]
        log_retention_days: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            hostname,
            port,
            config,
            logs_dir,
            log_retention_days,
        } => {
            let logs_dir = logs_dir.unwrap_or_else(|| reco_observability::canonical_logs_dir_from_root(&PathBuf::from(".reco")));
            let (_guard, log_info) = reco_observability::init_process_logging(&logs_dir, log_retention_days)
                .context("failed to initialize logging")?;
            info!(logs_dir = %log_info.logs_dir, "reco_engine.logging_initialized");

            let orchestrator_config = load_config(config.as_deref())?;
            let addr: SocketAddr = format!("{hostname}:{port}").parse().context("invalid hostname or port")?;

            let bus = EventBus::new(orchestrator_config.clone());
            let (agents, predictor) = reco_core::default_registry();
            let orchestrator = Orchestrator::new(bus, orchestrator_config, agents, Some(predictor));
            let state = AppState::new(orchestrator);

            info!(%addr, "reco_engine.starting");
            serve(addr, state).await?;
        }
    }

    Ok(())
}

/// Resolves the layered configuration: built-in defaults, then an optional
/// config file's values, then the `RECO_*` environment overlay (§6's
/// resolution order — CLI flags for the six tunables are not exposed
/// separately since the file and environment already cover that case).
fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<OrchestratorConfig> {
    let base = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).with_context(|| format!("reading config file {}", path.display()))?;
            toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))?
        }
        None => OrchestratorConfig::default(),
    };
    Ok(base.from_env_overlay())
}
