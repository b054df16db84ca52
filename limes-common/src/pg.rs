use deadpool_postgres::{Config as PoolConfig, ManagerConfig, Pool, RecyclingMethod, Runtime};
use owo_colors::OwoColorize;
use tokio_postgres::NoTls;

use crate::args::PostgresArgs;

/// Builds and connects a Postgres connection pool from [`PostgresArgs`].
///
/// TLS is negotiated with `rustls` + the platform's native root store when
/// `postgres_ssl_mode` requests it; otherwise the pool falls back to a plain
/// connection, matching `postgres_ssl_mode = "prefer"`'s default of trying
/// encryption but tolerating a server that doesn't offer it.
pub async fn init_postgres(args: &PostgresArgs) -> Pool {
    println!(
        "{}{}",
        "🔌 Connecting to Postgres • dsn=".green(),
        args.redacted().green().dimmed(),
    );

    let mut cfg = PoolConfig::new();
    cfg.host = Some(args.postgres_host.clone());
    cfg.port = Some(args.postgres_port);
    cfg.dbname = Some(args.postgres_database.clone());
    cfg.user = Some(args.postgres_username.clone());
    cfg.password = args.postgres_password.clone();
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(deadpool_postgres::PoolConfig::new(args.postgres_pool_size));

    let pool = if args.postgres_ssl_mode == "disable" {
        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .expect("failed to create Postgres pool")
    } else {
        let tls = tls_connector(args);
        cfg.create_pool(Some(Runtime::Tokio1), tls)
            .expect("failed to create Postgres pool")
    };

    pool.get()
        .await
        .expect("failed to obtain a connection from the Postgres pool")
        .query_one("SELECT 1", &[])
        .await
        .expect("failed to ping Postgres");

    pool
}

fn tls_connector(_args: &PostgresArgs) -> tokio_postgres_rustls::MakeRustlsConnect {
    let mut roots = rustls::RootCertStore::empty();
    for cert in rustls_native_certs::load_native_certs().certs {
        let _ = roots.add(cert);
    }
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    tokio_postgres_rustls::MakeRustlsConnect::new(config)
}
