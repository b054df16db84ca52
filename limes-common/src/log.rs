use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

/// Initializes structured logging and prints a colored startup banner.
/// Call once at the top of `main`.
///
/// Log verbosity is controlled by `RUST_LOG` (defaults to `info`), matching
/// `tracing_subscriber`'s usual convention.
pub fn init(banner: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    println!("{}", banner.green());
}

/// Prints the "ready" signal line once a worker has finished its startup
/// sequence and entered its main loop.
pub fn signal_ready() {
    println!("{}", "✅ ready".green());
}
