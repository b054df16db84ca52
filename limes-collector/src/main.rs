use std::sync::Arc;

use clap::Parser;
use limes_common::args::{BackchannelArgs, ClusterConfigArgs, PostgresArgs, RunnerMetricsArgs};
use limes_common::clock::SystemClock;
use tokio_util::sync::CancellationToken;

mod backchannel;
mod discovery;
mod drivers;
#[cfg(feature = "metrics")]
mod metrics;
mod runner;
mod util;
mod workers;

use discovery::HttpDiscoverySource;
use drivers::DriverRegistry;
use workers::{CapacityScrape, Consistency, KeystoneSync};

/// Runs the Collector: Keystone Sync, Consistency, and Capacity Scrape (the
/// latter driving Commitment Confirmation, Quota Computation, and Rate
/// Scrape once a scrape succeeds).
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    postgres: PostgresArgs,

    #[command(flatten)]
    cluster_config: ClusterConfigArgs,

    #[command(flatten)]
    backchannel: BackchannelArgs,

    #[command(flatten)]
    #[cfg(feature = "metrics")]
    runner_metrics: RunnerMetricsArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    limes_common::install_panic_hook();
    limes_common::log::init("🧮 limes-collector starting up");

    let cli = Cli::parse();

    let config = limes_common::config::load_cluster_config(&cli.cluster_config)?;
    let pool = limes_common::pg::init_postgres(&cli.postgres).await;
    let store = limes_db::Store::new(pool);

    let client = reqwest::Client::new();
    let drivers = DriverRegistry::from_config(&config, client.clone());
    let discovery_source = HttpDiscoverySource::new(client, config.discovery.source_endpoint.clone());

    let cancel = CancellationToken::new();
    let mut handles = Vec::new();

    #[cfg(feature = "metrics")]
    if let Some(port) = cli.runner_metrics.runner_metrics_port {
        handles.push(tokio::spawn(metrics::run_server(port)));
    }

    handles.push(tokio::spawn(backchannel::run_server(cli.backchannel.backchannel_port, store.clone())));

    handles.push(tokio::spawn(runner::run_cron(
        KeystoneSync::new(store.clone(), discovery_source, config.clone()),
        cancel.clone(),
    )));
    handles.push(tokio::spawn(runner::run_cron(
        Consistency::new(store.clone(), config.clone()),
        cancel.clone(),
    )));
    handles.push(tokio::spawn(runner::run_job(
        CapacityScrape::new(
            store.clone(),
            drivers,
            config.clone(),
            cli.backchannel.backchannel_url.clone(),
            Arc::new(SystemClock),
        ),
        cancel.clone(),
    )));

    limes_common::log::signal_ready();
    limes_common::shutdown::shutdown_signal().await;

    tracing::info!("shutdown signal received, cancelling workers");
    cancel.cancel();
    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}
