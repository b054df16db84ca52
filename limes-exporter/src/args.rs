use clap::Parser;
use limes_common::args::PostgresArgs;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub postgres: PostgresArgs,

    #[arg(long, env = "EXPORTER_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Emit samples for AZ and project resources with zero usage instead of
    /// omitting them (§4.9).
    #[arg(long, env = "REPORT_ZEROES", default_value_t = false)]
    pub report_zeroes: bool,
}
