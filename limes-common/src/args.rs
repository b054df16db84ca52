use clap::Parser;

#[derive(Parser, Debug, Clone)]
pub struct PostgresArgs {
    #[arg(long, env = "POSTGRES_HOST", default_value = "localhost")]
    pub postgres_host: String,

    #[arg(long, env = "POSTGRES_PORT", default_value_t = 5432)]
    pub postgres_port: u16,

    #[arg(long, env = "POSTGRES_DATABASE", default_value = "limes")]
    pub postgres_database: String,

    #[arg(long, env = "POSTGRES_USERNAME", default_value = "postgres")]
    pub postgres_username: String,

    #[arg(long, env = "POSTGRES_PASSWORD")]
    pub postgres_password: Option<String>,

    #[arg(long, env = "POSTGRES_CA_CERT")]
    pub postgres_ca_cert: Option<String>,

    #[arg(long, env = "POSTGRES_SSL_MODE", default_value = "prefer")]
    pub postgres_ssl_mode: String,

    /// Maximum number of pooled connections held open to Postgres.
    #[arg(long, env = "POSTGRES_POOL_SIZE", default_value_t = 16)]
    pub postgres_pool_size: usize,
}

impl PostgresArgs {
    pub fn redacted(&self) -> String {
        format!(
            "postgres://{}@{}:{}/{}",
            self.postgres_username, self.postgres_host, self.postgres_port, self.postgres_database
        )
    }
}

/// Where to reach the outbound mail endpoint consumed by Mail Delivery (§4.8, §6).
#[derive(Parser, Debug, Clone)]
pub struct MailArgs {
    #[arg(long, env = "MAIL_ENDPOINT", required = true)]
    pub mail_endpoint: String,

    #[arg(long, env = "MAIL_FROM", default_value = "limes")]
    pub mail_from: String,
}

/// Points at the static cluster configuration (§5, §9): discovery plugin
/// predicates, liquid driver bindings, resource behavior rules, commitment
/// behaviors, quota distribution configs, and mail templates. Loaded once at
/// startup and treated as read-only for the lifetime of the process.
#[derive(Parser, Debug, Clone)]
pub struct ClusterConfigArgs {
    #[arg(long, env = "LIMES_CONFIG", default_value = "limes.yaml")]
    pub config_path: std::path::PathBuf,
}

/// Optional scrape port for the collector's own ambient job-runner metrics
/// (reconcile/scrape counters, not the Metrics Exporter's business-metrics
/// surface in §4.9). Disabled when unset.
#[derive(Parser, Debug, Clone)]
pub struct RunnerMetricsArgs {
    #[arg(long, env = "RUNNER_METRICS_PORT")]
    pub runner_metrics_port: Option<u16>,
}

/// Where the Capacity Scrape worker's backchannel HTTP server listens, and
/// the base URL drivers should use to call `GetResourceDemand` back into it
/// (§4.4 step 3, §6). Configured separately because the driver process may
/// reach the collector through a different address than the one the
/// collector itself binds (a routable service name vs. `0.0.0.0`).
#[derive(Parser, Debug, Clone)]
pub struct BackchannelArgs {
    #[arg(long, env = "BACKCHANNEL_PORT", default_value_t = 8090)]
    pub backchannel_port: u16,

    #[arg(long, env = "BACKCHANNEL_URL", default_value = "http://localhost:8090")]
    pub backchannel_url: String,
}
