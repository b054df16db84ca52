/// Errors surfaced by the collector's job runner and workers.
///
/// Mirrors the taxonomy in the design's error-handling section: database
/// errors and driver errors are distinguished so the runner can decide
/// whether a failure is transient (reschedule) or fatal (propagate).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("database error: {0}")]
    Db(#[from] limes_db::Error),

    #[error("liquid driver error: {0}")]
    Driver(String),

    #[error("invalid driver response: {0}")]
    InvalidDriverResponse(String),

    #[error("resource deletion blocked by commitment: {0}")]
    DeletionBlocked(String),

    #[error("mail template error: {0}")]
    MailTemplate(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
