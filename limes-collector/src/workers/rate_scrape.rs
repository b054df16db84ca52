use limes_model::driver::RateScrapeRequest;
use limes_model::entities::{Project, ProjectService, Service};

use crate::drivers::LiquidDriver;
use crate::util::Error;

/// Fetches per-project rate counters for services that advertise rates
/// (§4.7). Runs as part of the same per-`(project, service)` dispatch as
/// Capacity Scrape: §3's data model carries only one `next_scrape_at` per
/// `ProjectService`, so there is no separate schedule to drive this off of.
pub struct RateScrape {
    store: limes_db::Store,
}

impl RateScrape {
    pub fn new(store: limes_db::Store) -> Self {
        Self { store }
    }

    pub async fn scrape(
        &self,
        driver: &LiquidDriver,
        project_service: &ProjectService,
        project: &Project,
        service: &Service,
        known_rates: &std::collections::BTreeMap<String, limes_model::driver::RateInfo>,
    ) -> Result<(), Error> {
        if known_rates.is_empty() {
            return Ok(());
        }

        let existing = self.store.rates().list_by_project_service(project_service.id).await?;
        let previous_state = existing.first().and_then(|r| r.previous_state.clone());

        let project_uuid = project
            .external_id
            .parse::<uuid::Uuid>()
            .unwrap_or_else(|_| uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, project.external_id.as_bytes()));

        let report = driver
            .scrape_rates(project_uuid, &RateScrapeRequest { previous_state })
            .await?;

        for (rate_name, value) in &report.rates {
            if !known_rates.contains_key(rate_name) {
                tracing::warn!(service = %service.service_type, rate = %rate_name, "driver reported an unadvertised rate, discarding");
                continue;
            }
            self.store
                .rates()
                .upsert(project_service.id, rate_name, value, report.state.as_ref())
                .await?;
        }

        for rate_name in known_rates.keys() {
            if !report.rates.contains_key(rate_name) {
                tracing::warn!(service = %service.service_type, rate = %rate_name, "rate vanished from driver report, retaining last value");
            }
        }

        Ok(())
    }
}
