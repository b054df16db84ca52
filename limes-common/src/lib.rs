pub mod args;
pub mod clock;
pub mod config;
pub mod log;
pub mod mail;
pub mod pg;
pub mod shutdown;

/// Installs a panic hook: any panic on any thread exits the process with a
/// non-zero status, so a supervised container restarts it instead of leaving
/// a wedged worker thread running.
pub fn install_panic_hook() {
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_panic(info);
        std::process::exit(1);
    }));
}
