//! Transaction rebroadcaster daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!   env / .env / config.toml
//!            │
//!            ▼
//!   ┌─────────────────┐     ┌──────────────────────────────────────────┐
//!   │ config + secrets│────▶│               Scheduler                  │
//!   └─────────────────┘     │  tick (immediately, then every interval) │
//!                           └───────────────────┬──────────────────────┘
//!                                               ▼
//!                           ┌──────────────────────────────────────────┐
//!                           │              Resubmitter                 │
//!                           │ decode → blockhash → fee payer → sign    │
//!                           └───────────────────┬──────────────────────┘
//!                                               ▼
//!                           ┌──────────────────────────────────────────┐
//!                           │ RpcClient ──▶ sendTransaction ──▶ poll   │──▶ RPC node
//!                           └──────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use tx_rebroadcaster::config::{load_config, Secrets};
use tx_rebroadcaster::lifecycle::{signals, startup, Shutdown};
use tx_rebroadcaster::observability;
use tx_rebroadcaster::resubmit::{scheduler, ExplorerLinks, Scheduler};

#[derive(Parser)]
#[command(name = "tx-rebroadcaster")]
#[command(about = "Periodically re-sign and resubmit a precomputed transaction", long_about = None)]
struct Args {
    /// Optional TOML config file.
    #[arg(short, long, env = "REBROADCAST_CONFIG")]
    config: Option<PathBuf>,

    /// Run a single attempt and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    observability::logging::init(&config.observability);
    tracing::info!("tx-rebroadcaster v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            observability::metrics::init_metrics(addr);
        }
    }

    let secrets = Secrets::from_env()?;
    let resubmitter = startup::build_resubmitter(&config, &secrets)?;
    drop(secrets);

    tracing::info!(
        rpc_url = %config.rpc.url,
        interval_secs = config.schedule.interval_secs,
        commitment = %config.rpc.commitment,
        "Configuration loaded"
    );

    let explorer = ExplorerLinks::new(&config.explorer);

    if args.once {
        let confirmed = scheduler::run_attempt(&resubmitter, &explorer).await;
        if !confirmed {
            std::process::exit(1);
        }
        return Ok(());
    }

    let shutdown = Shutdown::new();
    let scheduler = Scheduler::new(Arc::new(resubmitter), &config.schedule, explorer);
    let handle = tokio::spawn(scheduler.run(shutdown.subscribe()));

    signals::wait_for_shutdown_signal().await;
    shutdown.trigger();
    handle.await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
