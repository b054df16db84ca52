use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use limes_common::clock::Clock;
use limes_model::commitment::{ProjectCommitment, ProvenanceContext, ProvenanceReason};
use limes_model::config::ClusterConfig;
use limes_model::ids::{ProjectResourceId, ResourceId};
use limes_model::topology::{AvailabilityZone, Topology};

use crate::util::Error;

/// The deterministic commitment placement algorithm (§4.5). Runs once per
/// `(resource, az)` pair after a successful capacity scrape.
#[derive(Clone)]
pub struct Confirmer {
    store: limes_db::Store,
    config: Arc<ClusterConfig>,
    clock: Arc<dyn Clock>,
}

impl Confirmer {
    pub fn new(store: limes_db::Store, config: Arc<ClusterConfig>, clock: Arc<dyn Clock>) -> Self {
        Self { store, config, clock }
    }

    pub async fn confirm_resource(
        &self,
        resource_id: ResourceId,
        service_type: &str,
        resource_name: &str,
    ) -> Result<(), Error> {
        let behavior = self.config.resource_behavior(service_type, resource_name);
        if behavior.commitment_durations.is_empty() {
            // §4.5: "commitment behavior has at least one declared
            // duration" is the gate; otherwise this resource never admits
            // commitments.
            return Ok(());
        }

        let Some(resource) = self.store.resources().get(resource_id).await? else {
            return Ok(());
        };

        let az_resources = self.store.resources().list_az_resources(resource_id).await?;
        for az_resource in &az_resources {
            if resource.topology == Topology::Flat && !az_resource.az.is_any() {
                continue;
            }
            if az_resource.az.is_unknown() {
                // §4.5: only the configured AZ set (or `{any}` for flat) is
                // committable.
                continue;
            }
            self.confirm_az(
                resource_id,
                &az_resource.az,
                az_resource.raw_capacity,
                behavior.overcommit_factor.effective_capacity(az_resource.raw_capacity),
                behavior.commitment_min_confirm_delay_seconds,
            )
            .await?;
        }

        Ok(())
    }

    async fn confirm_az(
        &self,
        resource_id: ResourceId,
        az: &AvailabilityZone,
        _raw_capacity: u64,
        effective_capacity: u64,
        min_confirm_delay_seconds: i64,
    ) -> Result<(), Error> {
        let candidates = self.store.commitments().lock_confirmable(resource_id, az).await?;
        if candidates.is_empty() {
            return Ok(());
        }

        let usage_and_confirmed = self
            .store
            .commitments()
            .usage_and_confirmed_by_project(resource_id, az)
            .await?;
        let mut usage_by_project: HashMap<ProjectResourceId, u64> = HashMap::new();
        for (project_resource_id, usage, _confirmed) in &usage_and_confirmed {
            usage_by_project.insert(*project_resource_id, *usage);
        }

        let mut sum_confirmed = self.store.commitments().sum_confirmed(resource_id, az).await?;

        // Candidates are already locked in `(confirm_by, created_at, id)`
        // order by the repository query (§4.5, §5).
        for candidate in candidates {
            if candidate.confirm_by > self.clock.now() {
                continue;
            }
            if !can_confirm_now(candidate.created_at, min_confirm_delay_seconds, self.clock.now()) {
                // §4.5: the resource's "can confirm" gate hasn't opened yet
                // for this commitment even though `confirm_by` has passed.
                continue;
            }

            let global_usage: u64 = usage_by_project
                .iter()
                .filter(|(project_resource_id, _)| **project_resource_id != candidate.project_resource_id)
                .map(|(_, usage)| *usage)
                .sum();
            let global_confirmed_outside_p: u64 = usage_and_confirmed
                .iter()
                .filter(|(id, _, _)| *id != candidate.project_resource_id)
                .map(|(_, _, confirmed)| *confirmed)
                .sum();
            let global_unused_usage_outside_p = global_usage.saturating_sub(global_confirmed_outside_p);

            let budget = effective_budget(effective_capacity, global_unused_usage_outside_p);

            if fits(sum_confirmed, candidate.amount, budget) {
                self.apply_confirmation(&candidate, Vec::new()).await?;
                sum_confirmed += candidate.amount;
                continue;
            }

            // §4.5: attempt a takeover through donor commitments before
            // giving up on this candidate for this pass.
            let donors = self
                .store
                .commitments()
                .list_donors(resource_id, az, &candidate)
                .await?;
            if donors.is_empty() {
                continue;
            }

            let donor_amounts: Vec<u64> = donors.iter().map(|d| d.amount).collect();
            let Some(takes) = plan_donor_takeover(candidate.amount, &donor_amounts) else {
                // Not enough donor capacity to fully satisfy the candidate;
                // leave it for a future pass.
                continue;
            };
            let routed: Vec<(ProjectCommitment, u64)> =
                donors.into_iter().zip(takes).filter(|(_, take)| *take > 0).collect();

            for (donor, taken) in &routed {
                if *taken == donor.amount {
                    let context = ProvenanceContext {
                        reason: ProvenanceReason::Consume,
                        related_ids: vec![candidate.id],
                    };
                    self.store.commitments().supersede(donor.id, self.clock.now(), &context).await?;
                    self.notify_consume(donor).await?;
                } else {
                    // §4.5 step 3: the donor is only partially consumed, so
                    // its supersede context must point at the remainder it
                    // was split into, not at the consumer that triggered the
                    // split. Mint the remainder's id up front so it can be
                    // threaded into both records.
                    let remainder_id = limes_model::ids::CommitmentId(uuid::Uuid::new_v4());
                    let context = ProvenanceContext {
                        reason: ProvenanceReason::Split,
                        related_ids: vec![remainder_id],
                    };
                    self.store.commitments().supersede(donor.id, self.clock.now(), &context).await?;
                    self.store
                        .commitments()
                        .insert_split_remainder(remainder_id, donor, donor.amount - taken, donor.id)
                        .await?;
                    self.notify_consume(donor).await?;
                }
            }

            self.apply_confirmation(&candidate, routed.into_iter().map(|(d, amt)| (d.id, amt)).collect())
                .await?;
            sum_confirmed += candidate.amount;
        }

        Ok(())
    }

    async fn apply_confirmation(
        &self,
        candidate: &ProjectCommitment,
        _amount_from_donors: Vec<(limes_model::ids::CommitmentId, u64)>,
    ) -> Result<(), Error> {
        self.store.commitments().confirm(candidate.id, self.clock.now()).await?;

        let project_az_resource_id = self
            .store
            .resources()
            .ensure_project_az_resource(candidate.project_resource_id, &candidate.az)
            .await?;
        let existing = self
            .store
            .resources()
            .list_project_az_resources(candidate.project_resource_id)
            .await?
            .into_iter()
            .find(|par| par.id == project_az_resource_id)
            .map(|par| par.quota)
            .unwrap_or(0);
        if existing < candidate.amount {
            self.store
                .resources()
                .set_project_az_quota(project_az_resource_id, candidate.amount)
                .await?;
        }

        if candidate.notify_on_confirm {
            self.notify_confirm(candidate).await?;
        }

        Ok(())
    }

    async fn notify_confirm(&self, commitment: &ProjectCommitment) -> Result<(), Error> {
        let project_id = self.project_id_for(commitment.project_resource_id).await?;
        let subject = self
            .config
            .mail
            .commitment_confirmed_subject
            .clone()
            .unwrap_or_else(|| "Your commitment has been confirmed".to_string());
        let body = self
            .config
            .mail
            .commitment_confirmed_body
            .clone()
            .unwrap_or_else(|| format!("Commitment {} for {} units has been confirmed.", commitment.id, commitment.amount));
        self.store.mail().enqueue(project_id, &subject, &body).await?;
        Ok(())
    }

    async fn notify_consume(&self, donor: &ProjectCommitment) -> Result<(), Error> {
        if !donor.notify_on_confirm {
            return Ok(());
        }
        let project_id = self.project_id_for(donor.project_resource_id).await?;
        let subject = "Your commitment has been transferred".to_string();
        let body = format!("Commitment {} was consumed by a takeover.", donor.id);
        self.store.mail().enqueue(project_id, &subject, &body).await?;
        Ok(())
    }

    async fn project_id_for(&self, project_resource_id: ProjectResourceId) -> Result<limes_model::ids::ProjectId, Error> {
        // project_resources rows are always scoped to exactly one project
        // (§3 invariant 1); resolved via the resource repo to avoid a
        // dedicated lookup table.
        let conn = self.store.pool().get().await.map_err(limes_db::Error::from)?;
        let row = conn
            .query_one(
                "SELECT project_id FROM project_resources WHERE id = $1",
                &[&project_resource_id.0],
            )
            .await
            .map_err(limes_db::Error::from)?;
        Ok(limes_model::ids::ProjectId(row.get("project_id")))
    }
}

/// §4.5's "can confirm" gate: a commitment isn't eligible until at least
/// `min_confirm_delay_seconds` have passed since it was created, regardless
/// of `confirm_by`. A non-positive delay never blocks confirmation.
fn can_confirm_now(created_at: chrono::DateTime<Utc>, min_confirm_delay_seconds: i64, now: chrono::DateTime<Utc>) -> bool {
    if min_confirm_delay_seconds <= 0 {
        return true;
    }
    now >= created_at + chrono::Duration::seconds(min_confirm_delay_seconds)
}

/// §4.5 step 3: capacity left for new confirmations once other projects'
/// unconfirmed usage is carved out of the resource's effective capacity.
fn effective_budget(effective_capacity: u64, global_unused_usage_outside_p: u64) -> u64 {
    effective_capacity.saturating_sub(global_unused_usage_outside_p)
}

/// Whether a candidate's amount fits in what's left of the budget.
fn fits(sum_confirmed: u64, amount: u64, budget: u64) -> bool {
    sum_confirmed + amount <= budget
}

/// §4.5 step 4: greedily takes from donors in the order given until `needed`
/// is covered. Returns the amount taken from each donor (in the same order),
/// or `None` if the donors' combined amount can't fully cover `needed`.
fn plan_donor_takeover(needed: u64, donor_amounts: &[u64]) -> Option<Vec<u64>> {
    let mut remaining = needed;
    let mut takes = Vec::with_capacity(donor_amounts.len());
    for &amount in donor_amounts {
        let take = remaining.min(amount);
        takes.push(take);
        remaining -= take;
    }
    if remaining > 0 { None } else { Some(takes) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn can_confirm_now_allows_a_zero_delay_immediately() {
        assert!(can_confirm_now(at(1000), 0, at(1000)));
    }

    #[test]
    fn can_confirm_now_blocks_until_the_delay_elapses() {
        assert!(!can_confirm_now(at(1000), 300, at(1200)));
        assert!(can_confirm_now(at(1000), 300, at(1300)));
    }

    #[test]
    fn effective_budget_subtracts_unused_usage_outside_project() {
        assert_eq!(effective_budget(1000, 200), 800);
    }

    #[test]
    fn effective_budget_floors_at_zero() {
        assert_eq!(effective_budget(100, 500), 0);
    }

    #[test]
    fn fits_accepts_amount_within_budget() {
        assert!(fits(400, 100, 500));
        assert!(fits(400, 100, 501));
    }

    #[test]
    fn fits_rejects_amount_over_budget() {
        assert!(!fits(400, 200, 500));
    }

    #[test]
    fn donor_takeover_covers_needed_from_multiple_donors() {
        let takes = plan_donor_takeover(150, &[50, 60, 100]).unwrap();
        assert_eq!(takes, vec![50, 60, 40]);
    }

    #[test]
    fn donor_takeover_takes_nothing_from_donors_past_the_needed_amount() {
        let takes = plan_donor_takeover(50, &[20, 100]).unwrap();
        assert_eq!(takes, vec![20, 30]);
    }

    #[test]
    fn donor_takeover_fails_when_donors_cant_cover_needed() {
        assert!(plan_donor_takeover(1000, &[50, 60]).is_none());
    }

    #[test]
    fn donor_takeover_with_no_donors_fails_unless_needed_is_zero() {
        assert!(plan_donor_takeover(0, &[]).is_some());
        assert!(plan_donor_takeover(1, &[]).is_none());
    }
}
