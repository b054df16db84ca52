mod args;
mod colors;
mod server;

use anyhow::Result;
use clap::Parser;
use owo_colors::OwoColorize;

#[tokio::main]
async fn main() -> Result<()> {
    limes_common::install_panic_hook();
    limes_common::log::init("📊 limes-exporter starting up");

    let cli = args::Cli::parse();

    let pool = limes_common::pg::init_postgres(&cli.postgres).await;
    let store = limes_db::Store::new(pool);

    let cancel = tokio_util::sync::CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            limes_common::shutdown::shutdown_signal().await;
            println!("{}", "🛑 shutdown signal received".color(colors::FG1));
            cancel.cancel();
        }
    });

    let app = server::router(server::AppState {
        store,
        report_zeroes: cli.report_zeroes,
    });

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!(
        "{}{}",
        "🟢 limes-exporter listening • addr=".color(colors::FG1),
        addr.to_string().color(colors::FG2),
    );
    limes_common::log::signal_ready();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    Ok(())
}
