use std::sync::Arc;

use limes_common::clock::{Clock, jitter};
use limes_db::resources::ResourceRepo;
use limes_db::services::ServiceRepo;
use limes_model::config::ClusterConfig;
use limes_model::entities::{Project, Service};
use limes_model::ids::ResourceId;
use limes_model::topology::{AvailabilityZone, Topology};

use crate::drivers::DriverRegistry;
use crate::runner::Job;
use crate::util::{Error, ERROR_INTERVAL};
use crate::workers::confirmation::Confirmer;
use crate::workers::quota::QuotaComputer;
use crate::workers::rate_scrape::RateScrape;

pub struct CapacityScrapeTask {
    pub project_service: limes_model::entities::ProjectService,
    pub project: Project,
    pub service: Service,
}

/// Fetches a capacity report, upserts per-AZ capacity, then runs commitment
/// status sync, confirmation, and quota recomputation for the service's
/// resources (§4.4, the core of the Collector).
pub struct CapacityScrape {
    store: limes_db::Store,
    drivers: DriverRegistry,
    config: Arc<ClusterConfig>,
    backchannel_url: String,
    clock: Arc<dyn Clock>,
}

impl CapacityScrape {
    pub fn new(
        store: limes_db::Store,
        drivers: DriverRegistry,
        config: Arc<ClusterConfig>,
        backchannel_url: String,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, drivers, config, backchannel_url, clock }
    }

    async fn scrape(&self, task: CapacityScrapeTask) -> Result<(), Error> {
        let CapacityScrapeTask { project_service, project, service } = task;

        let Some(driver) = self.drivers.get(&service.service_type) else {
            // §4.4 step 2: no driver bound, just reschedule.
            self.store
                .services()
                .record_scrape_error(
                    project_service.id,
                    "no driver bound for service type",
                    self.clock.now() + ERROR_INTERVAL,
                )
                .await?;
            return Ok(());
        };

        let info = driver.info().await?;
        if info.version > service.liquid_version {
            self.reconcile_resources(&service, &info).await?;
            self.store.services().set_liquid_version(service.id, info.version).await?;
        }

        let capacity_report = driver.capacity_report(&self.backchannel_url).await?;
        let project_uuid = project
            .external_id
            .parse::<uuid::Uuid>()
            .unwrap_or_else(|_| uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, project.external_id.as_bytes()));
        let usage_report = driver.usage_report(project_uuid).await?;

        let next_scrape_at = self.clock.now() + jitter(service_scrape_interval(&self.config, &service.service_type));

        // §4.4 step 6 / §5: every mutation this pass makes against capacity,
        // usage, and the schedule itself happens in one transaction, so a
        // mid-loop failure leaves the previous scrape's numbers intact
        // rather than a half-applied report.
        let mut conn = self.store.pool().get().await.map_err(limes_db::Error::from)?;
        let tx = conn.transaction().await.map_err(limes_db::Error::from)?;

        let resources = ResourceRepo::list_by_service_tx(&tx, service.id).await?;

        for resource in &resources {
            let report_resource = capacity_report.resources.get(&resource.name);
            let az_resources = ResourceRepo::list_az_resources_tx(&tx, resource.id).await?;

            for az_resource in &az_resources {
                let per_az = report_resource.and_then(|r| r.per_az.get(az_resource.az.as_str()));
                match per_az {
                    Some(report) => {
                        let subcapacities = serde_json::to_value(&report.subcapacities).unwrap_or_default();
                        ResourceRepo::apply_capacity_report_tx(
                            &tx,
                            az_resource.id,
                            report.capacity,
                            report.usage,
                            &subcapacities,
                        )
                        .await?;
                    }
                    None if az_resource.az.is_unknown() => {
                        // §4.4 step 6: the unknown zone may vanish once the
                        // driver learns its mapping.
                        ResourceRepo::clear_unknown_bucket_tx(&tx, az_resource.id).await?;
                    }
                    None if resource.topology == Topology::AzAware
                        && !az_resource.az.is_any()
                        && !report_resource.is_some_and(|r| r.per_az.contains_key("any")) =>
                    {
                        tracing::error!(
                            resource = %resource.name, az = %az_resource.az,
                            "driver did not report this AZ and no any bucket is present"
                        );
                    }
                    None => {}
                }
            }

            if let Some(usage_resource) = usage_report.resources.get(&resource.name) {
                let project_resource_id =
                    ResourceRepo::ensure_project_resource_tx(&tx, project.id, resource.id).await?;
                for (az_name, az_usage) in &usage_resource.per_az {
                    let az = AvailabilityZone::named(az_name.clone());
                    let project_az_id =
                        ResourceRepo::ensure_project_az_resource_tx(&tx, project_resource_id, &az).await?;
                    ResourceRepo::set_project_az_usage_tx(&tx, project_az_id, az_usage.usage, az_usage.physical_usage)
                        .await?;
                }
            }
        }

        let rate_scrape = RateScrape::new(self.store.clone());
        rate_scrape
            .scrape(driver, &project_service, &project, &service, &info.rates)
            .await?;

        let metrics = serde_json::json!({ "resource_count": resources.len() });
        ServiceRepo::record_scrape_success_tx(&tx, project_service.id, self.clock.now(), next_scrape_at, &metrics)
            .await?;

        tx.commit().await.map_err(limes_db::Error::from)?;

        for resource in &resources {
            self.run_post_scrape(resource.id, &service.service_type, &resource.name).await?;
        }

        Ok(())
    }

    async fn reconcile_resources(
        &self,
        service: &Service,
        info: &limes_model::driver::ServiceInfo,
    ) -> Result<(), Error> {
        for (name, resource_info) in &info.resources {
            let topology = resource_info
                .topology
                .parse::<Topology>()
                .unwrap_or(Topology::Flat);
            let resource_id = self
                .store
                .resources()
                .upsert_resource(
                    service.id,
                    name,
                    &resource_info.unit,
                    topology,
                    resource_info.has_capacity,
                    resource_info.has_quota,
                    resource_info.needs_resource_demand,
                )
                .await?;

            let azs = match topology {
                Topology::Flat => vec![AvailabilityZone::Any],
                _ => {
                    let mut azs: Vec<AvailabilityZone> = self
                        .config
                        .availability_zones
                        .iter()
                        .map(|name| AvailabilityZone::named(name.clone()))
                        .collect();
                    azs.push(AvailabilityZone::Unknown);
                    azs
                }
            };
            for az in azs {
                self.store.resources().ensure_az_resource(resource_id, &az).await?;
            }
        }

        // §4.4 step 4: a resource the driver no longer advertises is
        // deleted outright; a non-terminal commitment still referencing it
        // turns that into a fatal scrape error (§7) rather than silently
        // orphaning the commitment.
        let existing = self.store.resources().list_by_service(service.id).await?;
        for resource in existing {
            if info.resources.contains_key(&resource.name) {
                continue;
            }
            self.store.resources().delete_resource(resource.id).await?;
        }
        Ok(())
    }

    async fn run_post_scrape(&self, resource_id: ResourceId, service_type: &str, resource_name: &str) -> Result<(), Error> {
        self.store.commitments().sync_status(resource_id).await?;

        let confirmer = Confirmer::new(self.store.clone(), self.config.clone(), self.clock.clone());
        confirmer.confirm_resource(resource_id, service_type, resource_name).await?;

        let quota = QuotaComputer::new(self.store.clone(), self.config.clone());
        quota.recompute_resource(resource_id, service_type, resource_name).await?;

        Ok(())
    }
}

fn service_scrape_interval(config: &ClusterConfig, service_type: &str) -> std::time::Duration {
    config
        .service(service_type)
        .map(|s| s.scrape_interval())
        .unwrap_or(std::time::Duration::from_secs(900))
}

impl Job for CapacityScrape {
    type Task = CapacityScrapeTask;

    fn name(&self) -> &'static str {
        "capacity_scrape"
    }

    async fn discover(&self) -> anyhow::Result<Option<Self::Task>> {
        let next = self.store.services().lock_next_due(ERROR_INTERVAL.as_secs() as i64).await?;
        Ok(next.map(|(project_service, project, service)| CapacityScrapeTask {
            project_service,
            project,
            service,
        }))
    }

    async fn process(&self, task: Self::Task) -> anyhow::Result<()> {
        let project_service_id = task.project_service.id;
        if let Err(err) = self.scrape(task).await {
            self.store
                .services()
                .record_scrape_error(project_service_id, &err.to_string(), self.clock.now() + ERROR_INTERVAL)
                .await?;
        }
        Ok(())
    }
}
