use clap::Parser;
use limes_common::args::{MailArgs, PostgresArgs};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub(crate) struct RunArgs {
    #[command(flatten)]
    pub postgres: PostgresArgs,

    #[command(flatten)]
    pub mail: MailArgs,
}
