use std::sync::Arc;
use std::time::Duration;

use limes_model::config::ClusterConfig;

use crate::runner::CronJob;
use crate::util::{Error, CONSISTENCY_INITIAL_DELAY, CONSISTENCY_INTERVAL};

/// Ensures every known project has a row for every known service type, and
/// removes orphaned service rows (§4.3). Both operations are idempotent and
/// lock-free against the scrapers.
pub struct Consistency {
    store: limes_db::Store,
    config: Arc<ClusterConfig>,
}

impl Consistency {
    pub fn new(store: limes_db::Store, config: Arc<ClusterConfig>) -> Self {
        Self { store, config }
    }

    async fn run(&self) -> Result<(), Error> {
        let configured_types: Vec<String> = self
            .config
            .services
            .iter()
            .map(|s| s.service_type.clone())
            .collect();

        self.store.services().delete_missing(&configured_types).await?;

        for service in &self.config.services {
            self.store.services().ensure_exists(&service.service_type).await?;
        }

        self.store.services().sync_project_services().await?;
        self.store.services().remove_orphaned_project_services().await?;

        Ok(())
    }
}

impl CronJob for Consistency {
    fn name(&self) -> &'static str {
        "consistency"
    }

    fn interval(&self) -> Duration {
        CONSISTENCY_INTERVAL
    }

    fn initial_delay(&self) -> Duration {
        CONSISTENCY_INITIAL_DELAY
    }

    async fn run_once(&self) -> anyhow::Result<()> {
        self.run().await?;
        Ok(())
    }
}
