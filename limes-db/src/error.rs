#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    #[error("database error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
    #[error("database row missing expected value: {0}")]
    MissingValue(&'static str),
    #[error("commitment deletion blocked by non-terminal commitments referencing resource {0}")]
    DeletionBlocked(i64),
    #[error("project deletion blocked by live commitments for project {0}")]
    ProjectDeletionBlocked(i64),
}

pub type Result<T> = std::result::Result<T, Error>;
