//! Timber broker server binary.
//!
//! Starts a broker with the local offset coordinator and serves the HTTP
//! intake until interrupted, then drains the write path before exit.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use timber_broker::{Broker, BrokerConfig};
use timber_coordinator::LocalCoordinator;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Timber single-node message broker.
#[derive(Parser, Debug)]
#[command(name = "timber-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on for HTTP requests.
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen_addr: SocketAddr,

    /// Directory under which topic data is stored.
    #[arg(long, default_value = "data")]
    base_dir: PathBuf,

    /// Capacity of each partition queue.
    #[arg(long, default_value = "10000")]
    queue_capacity: usize,

    /// Writer flush threshold, in entries per file.
    #[arg(long, default_value = "200")]
    writer_batch_size: usize,

    /// Writer tick interval in milliseconds.
    #[arg(long, default_value = "5")]
    writer_tick_ms: u64,

    /// Fsync on every writer flush (durable, slower).
    #[arg(long)]
    sync_on_flush: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!(
        listen_addr = %args.listen_addr,
        base_dir = %args.base_dir.display(),
        "Starting timber server"
    );

    let config = BrokerConfig::new(&args.base_dir)
        .with_queue_capacity(args.queue_capacity)
        .with_writer_batch_size(args.writer_batch_size)
        .with_writer_tick(Duration::from_millis(args.writer_tick_ms))
        .with_sync_on_flush(args.sync_on_flush);

    let broker = Arc::new(Broker::start(config, Arc::new(LocalCoordinator::new())).await?);
    let app = timber_server::http::router(Arc::clone(&broker));

    let listener = tokio::net::TcpListener::bind(args.listen_addr).await?;
    info!(addr = %args.listen_addr, "HTTP intake listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain queues and writers so accepted messages reach disk.
    info!("Draining write path");
    match Arc::try_unwrap(broker) {
        Ok(broker) => broker.shutdown().await,
        Err(broker) => broker.flush().await,
    }

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
