use std::{error::Error, sync::Arc, time::Duration};

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use r_cube_worker::{
    config::WorkerConfig,
    shutdown::install_shutdown_handler,
    tasks::docker::DockerClient,
    worker::{
        api::TaskServer,
        types::Worker,
        worker::{collect_stats, run_tasks},
    },
};

/// Container task worker
#[derive(Parser, Debug)]
#[command(name = "r_cube_worker", version, about)]
struct Args {
    /// Worker name
    #[arg(long, default_value = "worker-1")]
    name: String,

    /// Address the task API binds to
    #[arg(long, default_value = "127.0.0.1")]
    address: String,

    /// Port the task API listens on
    #[arg(long, default_value = "5555")]
    port: u16,

    /// Seconds between task loop iterations
    #[arg(long, default_value = "5")]
    poll_interval: u64,

    /// Seconds between statistics samples
    #[arg(long, default_value = "15")]
    stats_interval: u64,

    /// Log level used when RUST_LOG is not set (debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("r_cube_worker={}", args.log_level))),
        )
        .init();

    let config = WorkerConfig::new(&args.name, &args.address, args.port)
        .with_poll_interval(Duration::from_secs(args.poll_interval))
        .with_stats_interval(Duration::from_secs(args.stats_interval));

    let runtime = Arc::new(DockerClient::new()?);
    let worker = Arc::new(Worker::new(&config.name, runtime));
    let shutdown = install_shutdown_handler();

    info!(worker = %config.name, "Starting worker");

    let tasks_loop = tokio::spawn(run_tasks(
        worker.clone(),
        config.poll_interval,
        shutdown.clone(),
    ));
    let stats_loop = tokio::spawn(collect_stats(
        worker.clone(),
        config.stats_interval,
        shutdown.clone(),
    ));

    let server = TaskServer::new(worker, &config.address, config.port);
    let served = server.start_server(shutdown.clone()).await;

    // Stop the loops even when the listener failed.
    shutdown.cancel();
    let _ = tokio::join!(tasks_loop, stats_loop);

    served?;
    info!("Worker stopped");
    Ok(())
}
