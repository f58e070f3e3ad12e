//! restcore server binary.
//!
//! Loads configuration, starts logging and metrics, builds the server with
//! the built-in diagnostics cog, and serves until SIGINT/SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use restcore::cog::StatusCog;
use restcore::config::{load_config, ServerConfig};
use restcore::extensions::Heartbeat;
use restcore::lifecycle::signals::wait_for_shutdown_signal;
use restcore::observability::{logging, metrics};
use restcore::HttpServer;

#[derive(Parser)]
#[command(name = "restcore")]
#[command(about = "REST routing server", long_about = None)]
struct Cli {
    /// Path to a TOML config file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability)?;
    tracing::info!("restcore v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        max_body_bytes = config.limits.max_body_bytes,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut builder = HttpServer::builder(config.clone());
    if config.heartbeat.enabled {
        builder = builder.extension(
            "heartbeat",
            Heartbeat::new(Duration::from_secs(config.heartbeat.interval_secs)),
        );
    }
    let server = Arc::new(builder.build()?);
    server.load_cog(StatusCog::new(server.router()))?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let mut runner = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.run(listener).await })
    };

    tokio::select! {
        _ = wait_for_shutdown_signal() => server.exit().await,
        // The server only stops on its own when serving failed.
        finished = &mut runner => {
            finished??;
            return Ok(());
        }
    }

    runner.await??;
    tracing::info!("Shutdown complete");
    Ok(())
}
