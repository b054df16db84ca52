//! The collector's own ambient job-runner metrics (reconcile/scrape
//! counters), distinct from the business-facing Metrics Exporter surface
//! (`limes-exporter`, §4.9). Kept behind the `metrics` feature the way the
//! teacher's operator binary kept its scrape server optional.

use std::sync::LazyLock;

use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static JOB_TASKS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("limes_collector_job_tasks_total", "Job tasks processed by outcome"),
        &["job", "outcome"],
    )
    .expect("valid metric");
    REGISTRY.register(Box::new(counter.clone())).expect("register job_tasks_total");
    counter
});

pub static CRON_RUNS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("limes_collector_cron_runs_total", "Cron job runs by outcome"),
        &["job", "outcome"],
    )
    .expect("valid metric");
    REGISTRY.register(Box::new(counter.clone())).expect("register cron_runs_total");
    counter
});

async fn serve_metrics() -> String {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if let Err(err) = encoder.encode(&families, &mut buf) {
        tracing::error!(error = %err, "failed to encode runner metrics");
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}

pub async fn run_server(port: u16) {
    let app = Router::new().route("/metrics", get(serve_metrics));
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, port, "failed to bind runner metrics server");
            return;
        }
    };
    tracing::info!(port, "runner metrics server listening");
    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!(error = %err, "runner metrics server exited");
    }
}
