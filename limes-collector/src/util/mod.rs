pub(crate) mod colors;

mod error;

pub use error::*;

/// Nominal interval between two Keystone Sync cron runs (§4.2).
pub(crate) const KEYSTONE_SYNC_INTERVAL: std::time::Duration = std::time::Duration::from_secs(600);

/// Initial delay before the first Keystone Sync run.
pub(crate) const KEYSTONE_SYNC_INITIAL_DELAY: std::time::Duration = std::time::Duration::from_secs(5);

/// Nominal interval between two Consistency cron runs.
pub(crate) const CONSISTENCY_INTERVAL: std::time::Duration = std::time::Duration::from_secs(3600);

/// Initial delay before the first Consistency run, per §4.3.
pub(crate) const CONSISTENCY_INITIAL_DELAY: std::time::Duration =
    std::time::Duration::from_secs(10);

/// Delay a job is rescheduled after on failure, per §4.1.
pub(crate) const ERROR_INTERVAL: std::time::Duration = std::time::Duration::from_secs(180);

/// Delay between two discovery polls when a job queue is empty.
pub(crate) const DISCOVER_IDLE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(3);

/// Name recorded as `scraped_by` / used in log context for this binary.
pub(crate) const MANAGER_NAME: &str = "limes-collector";
