use std::sync::Arc;

use limes_model::config::ClusterConfig;
use limes_model::ids::ResourceId;
use limes_model::quota::QuotaDistributionConfig;

use crate::util::Error;

/// Recomputes each project's per-AZ quota for one resource from usage and
/// active commitments (§4.6).
#[derive(Clone)]
pub struct QuotaComputer {
    store: limes_db::Store,
    config: Arc<ClusterConfig>,
}

impl QuotaComputer {
    pub fn new(store: limes_db::Store, config: Arc<ClusterConfig>) -> Self {
        Self { store, config }
    }

    pub async fn recompute_resource(
        &self,
        resource_id: ResourceId,
        service_type: &str,
        resource_name: &str,
    ) -> Result<(), Error> {
        let behavior = self.config.resource_behavior(service_type, resource_name);
        let project_resources = self
            .store
            .resources()
            .list_project_resources_by_resource(resource_id)
            .await?;

        for project_resource in &project_resources {
            if let Some(override_quota) = project_resource.quota_override {
                if project_resource.quota != override_quota {
                    self.store
                        .resources()
                        .set_project_resource_quota(project_resource.id, override_quota)
                        .await?;
                    self.store.resources().mark_quota_desynced(project_resource.project_id, resource_id).await?;
                }
                continue;
            }

            match &behavior.quota_distribution {
                QuotaDistributionConfig::UsageBased => {
                    let az_resources = self
                        .store
                        .resources()
                        .list_project_az_resources(project_resource.id)
                        .await?;
                    let total_usage: u64 = az_resources.iter().map(|az| az.usage).sum();
                    if project_resource.quota != total_usage {
                        self.store
                            .resources()
                            .set_project_resource_quota(project_resource.id, total_usage)
                            .await?;
                        self.store.resources().mark_quota_desynced(project_resource.project_id, resource_id).await?;
                    }
                }
                QuotaDistributionConfig::Autogrow {
                    growth_multiplier,
                    project_base_quota,
                    ..
                } => {
                    self.recompute_autogrow(project_resource, resource_id, *growth_multiplier, *project_base_quota)
                        .await?;
                }
            }
        }

        Ok(())
    }

    async fn recompute_autogrow(
        &self,
        project_resource: &limes_model::entities::ProjectResource,
        resource_id: ResourceId,
        growth_multiplier: f64,
        project_base_quota: u64,
    ) -> Result<(), Error> {
        let az_resources = self
            .store
            .resources()
            .list_project_az_resources(project_resource.id)
            .await?;

        let mut changed = false;
        let mut concrete_sum: u64 = 0;
        let mut any_record: Option<(limes_model::ids::ProjectAzResourceId, u64)> = None;

        for az_resource in &az_resources {
            if az_resource.az.is_any() {
                any_record = Some((az_resource.id, az_resource.quota));
                continue;
            }

            // §4.6: quota[az] = max(usage[az], active_commitments[az]) plus
            // a growth allowance on the historical peak. No usage-history
            // table is modeled (§1 storage-engine internals are out of
            // scope), so the peak is approximated as the larger of current
            // usage and the resource's previously computed quota.
            let historical_peak = az_resource.usage.max(az_resource.quota);
            let confirmed = self.confirmed_amount_for(resource_id, &az_resource.az, project_resource.id).await?;
            let new_quota = autogrow_az_quota(az_resource.usage, confirmed, historical_peak, growth_multiplier);

            concrete_sum += new_quota;
            if az_resource.quota != new_quota {
                self.store.resources().set_project_az_quota(az_resource.id, new_quota).await?;
                changed = true;
            }
        }

        if let Some((any_id, current_any_quota)) = any_record {
            let any_quota = any_bucket_quota(project_base_quota, concrete_sum);
            if current_any_quota != any_quota {
                self.store.resources().set_project_az_quota(any_id, any_quota).await?;
                changed = true;
            }
        }

        let total_quota: u64 =
            concrete_sum + any_record.map(|_| any_bucket_quota(project_base_quota, concrete_sum)).unwrap_or(0);
        if project_resource.quota != total_quota {
            self.store
                .resources()
                .set_project_resource_quota(project_resource.id, total_quota)
                .await?;
            changed = true;
        }

        if changed {
            self.store
                .resources()
                .mark_quota_desynced(project_resource.project_id, resource_id)
                .await?;
        }

        Ok(())
    }

    async fn confirmed_amount_for(
        &self,
        resource_id: ResourceId,
        az: &limes_model::topology::AvailabilityZone,
        project_resource_id: limes_model::ids::ProjectResourceId,
    ) -> Result<u64, Error> {
        let rows = self
            .store
            .commitments()
            .usage_and_confirmed_by_project(resource_id, az)
            .await?;
        Ok(rows
            .into_iter()
            .find(|(id, _, _)| *id == project_resource_id)
            .map(|(_, _, confirmed)| confirmed)
            .unwrap_or(0))
    }
}

/// §4.6 step 2: one AZ's autogrow quota, floored at `max(usage, confirmed)`
/// plus a growth allowance on the historical peak.
fn autogrow_az_quota(usage: u64, confirmed: u64, historical_peak: u64, growth_multiplier: f64) -> u64 {
    let growth_allowance = (growth_multiplier * historical_peak as f64).ceil() as u64;
    usage.max(confirmed) + growth_allowance
}

/// §4.6 step 3: the `any` bucket absorbs whatever base quota the concrete AZs
/// haven't already claimed; never negative.
fn any_bucket_quota(project_base_quota: u64, concrete_sum: u64) -> u64 {
    project_base_quota.saturating_sub(concrete_sum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn autogrow_quota_floors_at_usage_when_growth_is_zero() {
        assert_eq!(autogrow_az_quota(100, 40, 100, 0.0), 100);
    }

    #[test]
    fn autogrow_quota_floors_at_confirmed_when_above_usage() {
        assert_eq!(autogrow_az_quota(10, 80, 80, 0.0), 80);
    }

    #[test]
    fn autogrow_quota_adds_ceiled_growth_allowance() {
        // 0.1 * 95 = 9.5, ceiled to 10.
        assert_eq!(autogrow_az_quota(50, 50, 95, 0.1), 60);
    }

    #[test]
    fn any_bucket_absorbs_remaining_base_quota() {
        assert_eq!(any_bucket_quota(1000, 300), 700);
    }

    #[test]
    fn any_bucket_never_goes_negative_when_concrete_azs_exceed_base() {
        assert_eq!(any_bucket_quota(1000, 1500), 0);
    }
}
