use std::time::Duration;

/// A unit of recurring background work driven by the generic
/// producer/consumer loop in [`crate::runner::run_job`] (§4.1). `discover`
/// may consult the database for the next due task; returning `None` means
/// nothing was due. `process` does the actual work and is responsible for
/// recording its own success/failure and rescheduling via the database row
/// it operates on.
pub trait Job: Send + Sync {
    type Task: Send;

    fn name(&self) -> &'static str;

    fn discover(&self) -> impl std::future::Future<Output = anyhow::Result<Option<Self::Task>>> + Send;

    fn process(&self, task: Self::Task) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

/// A job that runs a single fixed task on a timer rather than discovering
/// tasks from the database (§4.1, §4.3 Consistency).
pub trait CronJob: Send + Sync {
    fn name(&self) -> &'static str;

    fn interval(&self) -> Duration;

    fn initial_delay(&self) -> Duration {
        Duration::ZERO
    }

    fn run_once(&self) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}
