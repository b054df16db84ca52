use anyhow::Result;
use clap::Parser;

mod app;
mod args;

#[tokio::main]
async fn main() -> Result<()> {
    limes_common::install_panic_hook();
    limes_common::log::init("📬 limes-mailer starting up");
    app::run(args::RunArgs::parse()).await
}
