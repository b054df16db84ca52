use deadpool_postgres::Pool;
use limes_model::commitment::{
    CommitmentStatus, ProjectCommitment, ProvenanceContext, ProvenanceReason, TransferStatus,
};
use limes_model::ids::{CommitmentId, ProjectResourceId, ResourceId};
use limes_model::topology::AvailabilityZone;

use crate::error::Result;

pub struct CommitmentRepo<'a> {
    pool: &'a Pool,
}

/// One AZ's entry in the backchannel's `GetResourceDemand` response (§4.4
/// step 3, §6).
#[derive(Debug, Clone)]
pub struct AzDemand {
    pub az: AvailabilityZone,
    pub usage: u64,
    pub unused_commitments: u64,
    pub pending_commitments: u64,
}

impl<'a> CommitmentRepo<'a> {
    pub(crate) fn new(pool: &'a Pool) -> Self {
        Self { pool }
    }

    /// Applies the status-sync CASE expression to every non-terminal
    /// commitment belonging to one resource (§4.4.1). Transitions into
    /// `superseded`/`expired` clear transfer fields in the same statement.
    pub async fn sync_status(&self, resource_id: ResourceId) -> Result<u64> {
        let conn = self.pool.get().await?;
        let affected = conn
            .execute(
                "UPDATE project_commitments pc SET \
                   status = CASE \
                     WHEN pc.superseded_at IS NOT NULL THEN 'superseded' \
                     WHEN pc.expires_at <= NOW()        THEN 'expired' \
                     WHEN pc.confirm_by > NOW()         THEN 'planned' \
                     WHEN pc.confirmed_at IS NULL       THEN 'pending' \
                     ELSE                                     'confirmed' \
                   END, \
                   transfer_token = CASE \
                     WHEN pc.superseded_at IS NOT NULL OR pc.expires_at <= NOW() THEN NULL \
                     ELSE pc.transfer_token END, \
                   transfer_status = CASE \
                     WHEN pc.superseded_at IS NOT NULL OR pc.expires_at <= NOW() THEN NULL \
                     ELSE pc.transfer_status END \
                 FROM project_resources pr \
                 WHERE pc.project_resource_id = pr.id \
                   AND pr.resource_id = $1 \
                   AND pc.status NOT IN ('superseded', 'expired')",
                &[&resource_id.0],
            )
            .await?;
        Ok(affected)
    }

    /// Locks every `pending`/`planned` commitment due for consideration at
    /// one AZ-location, in the strict FCFS order required by confirmation
    /// (§4.5, §5).
    pub async fn lock_confirmable(
        &self,
        resource_id: ResourceId,
        az: &AvailabilityZone,
    ) -> Result<Vec<ProjectCommitment>> {
        let conn = self.pool.get().await?;
        let rows = conn
            .query(
                "SELECT pc.id, pc.project_resource_id, pc.az, pc.amount, pc.duration_seconds, \
                        pc.created_at, pc.creator_uuid, pc.confirm_by, pc.confirmed_at, pc.expires_at, \
                        pc.status, pc.superseded_at, pc.transfer_token, pc.transfer_status, \
                        pc.creation_context, pc.supersede_context, pc.notify_on_confirm \
                 FROM project_commitments pc \
                 JOIN project_resources pr ON pr.id = pc.project_resource_id \
                 WHERE pr.resource_id = $1 AND pc.az = $2 \
                   AND pc.status IN ('pending', 'planned') AND pc.confirm_by <= NOW() \
                 ORDER BY pc.confirm_by ASC, pc.created_at ASC, pc.id ASC \
                 FOR UPDATE OF pc SKIP LOCKED",
                &[&resource_id.0, &az.as_str()],
            )
            .await?;
        rows.into_iter().map(row_to_commitment).collect()
    }

    /// Eligible donors for takeover of `consumer`: public transfer offers
    /// posted no later than the consumer, whose window strictly contains it
    /// (§4.5).
    pub async fn list_donors(
        &self,
        resource_id: ResourceId,
        az: &AvailabilityZone,
        consumer: &ProjectCommitment,
    ) -> Result<Vec<ProjectCommitment>> {
        let conn = self.pool.get().await?;
        let rows = conn
            .query(
                "SELECT pc.id, pc.project_resource_id, pc.az, pc.amount, pc.duration_seconds, \
                        pc.created_at, pc.creator_uuid, pc.confirm_by, pc.confirmed_at, pc.expires_at, \
                        pc.status, pc.superseded_at, pc.transfer_token, pc.transfer_status, \
                        pc.creation_context, pc.supersede_context, pc.notify_on_confirm \
                 FROM project_commitments pc \
                 JOIN project_resources pr ON pr.id = pc.project_resource_id \
                 WHERE pr.resource_id = $1 AND pc.az = $2 \
                   AND pc.status = 'confirmed' \
                   AND pc.transfer_status = 'public' \
                   AND pc.project_resource_id <> $3 \
                   AND pc.confirm_by < $4 AND pc.expires_at >= $5 \
                   AND pc.created_at <= $6 \
                 ORDER BY pc.created_at ASC, pc.id ASC \
                 FOR UPDATE OF pc SKIP LOCKED",
                &[
                    &resource_id.0,
                    &az.as_str(),
                    &consumer.project_resource_id.0,
                    &consumer.confirm_by,
                    &consumer.expires_at,
                    &consumer.created_at,
                ],
            )
            .await?;
        rows.into_iter().map(row_to_commitment).collect()
    }

    /// Per-project usage and already-confirmed amount at one AZ-location,
    /// the raw material for the fit test's `global_unused_usage_outside_P`
    /// term (§4.5).
    pub async fn usage_and_confirmed_by_project(
        &self,
        resource_id: ResourceId,
        az: &AvailabilityZone,
    ) -> Result<Vec<(ProjectResourceId, u64, u64)>> {
        let conn = self.pool.get().await?;
        let rows = conn
            .query(
                "SELECT pr.id AS project_resource_id, COALESCE(pazr.usage, 0)::BIGINT AS usage, \
                        COALESCE(confirmed.amount, 0)::BIGINT AS confirmed \
                 FROM project_resources pr \
                 LEFT JOIN project_az_resources pazr ON pazr.project_resource_id = pr.id AND pazr.az = $2 \
                 LEFT JOIN ( \
                   SELECT pc.project_resource_id, SUM(pc.amount) AS amount \
                   FROM project_commitments pc WHERE pc.status = 'confirmed' AND pc.az = $2 \
                   GROUP BY pc.project_resource_id \
                 ) confirmed ON confirmed.project_resource_id = pr.id \
                 WHERE pr.resource_id = $1",
                &[&resource_id.0, &az.as_str()],
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    ProjectResourceId(row.get("project_resource_id")),
                    row.get::<_, i64>("usage") as u64,
                    row.get::<_, i64>("confirmed") as u64,
                )
            })
            .collect())
    }

    pub async fn sum_confirmed(&self, resource_id: ResourceId, az: &AvailabilityZone) -> Result<u64> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_one(
                "SELECT COALESCE(SUM(pc.amount), 0)::BIGINT FROM project_commitments pc \
                 JOIN project_resources pr ON pr.id = pc.project_resource_id \
                 WHERE pr.resource_id = $1 AND pc.az = $2 AND pc.status = 'confirmed'",
                &[&resource_id.0, &az.as_str()],
            )
            .await?;
        Ok(row.get::<_, i64>(0) as u64)
    }

    pub async fn confirm(&self, id: CommitmentId, confirmed_at: chrono::DateTime<chrono::Utc>) -> Result<()> {
        let conn = self.pool.get().await?;
        conn.execute(
            "UPDATE project_commitments SET status = 'confirmed', confirmed_at = $2 WHERE id = $1",
            &[&id.0, &confirmed_at],
        )
        .await?;
        Ok(())
    }

    /// Marks a donor `superseded` via consume or split, clearing its
    /// transfer fields (§4.5 steps 2-3).
    pub async fn supersede(
        &self,
        id: CommitmentId,
        superseded_at: chrono::DateTime<chrono::Utc>,
        context: &ProvenanceContext,
    ) -> Result<()> {
        let conn = self.pool.get().await?;
        let context_json = serde_json::to_value(context).unwrap_or(serde_json::Value::Null);
        conn.execute(
            "UPDATE project_commitments SET status = 'superseded', superseded_at = $2, \
             supersede_context = $3, transfer_token = NULL, transfer_status = NULL WHERE id = $1",
            &[&id.0, &superseded_at, &context_json],
        )
        .await?;
        Ok(())
    }

    /// Inserts the remainder commitment left over from a partial donor
    /// consumption (§4.5 step 3), under a caller-chosen id so the supersede
    /// context recorded on the donor can point at it. Inherits the donor's
    /// original transfer fields so the remainder itself remains a public
    /// donor.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_split_remainder(
        &self,
        remainder_id: CommitmentId,
        donor: &ProjectCommitment,
        remaining_amount: u64,
        original_donor_id: CommitmentId,
    ) -> Result<CommitmentId> {
        let conn = self.pool.get().await?;
        let creation_context = ProvenanceContext {
            reason: ProvenanceReason::Split,
            related_ids: vec![original_donor_id],
        };
        let creation_json = serde_json::to_value(&creation_context).unwrap_or(serde_json::Value::Null);
        let row = conn
            .query_one(
                "INSERT INTO project_commitments \
                   (id, project_resource_id, az, amount, duration_seconds, created_at, creator_uuid, \
                    confirm_by, confirmed_at, expires_at, status, transfer_token, transfer_status, \
                    creation_context, notify_on_confirm) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
                 RETURNING id",
                &[
                    &remainder_id.0,
                    &donor.project_resource_id.0,
                    &donor.az.as_str(),
                    &(remaining_amount as i64),
                    &donor.duration_seconds,
                    &donor.created_at,
                    &donor.creator_uuid,
                    &donor.confirm_by,
                    &donor.confirmed_at,
                    &donor.expires_at,
                    &donor.status.as_str(),
                    &donor.transfer_token,
                    &donor.transfer_status.map(|s| match s {
                        TransferStatus::Public => "public",
                        TransferStatus::Private => "private",
                    }),
                    &creation_json,
                    &donor.notify_on_confirm,
                ],
            )
            .await?;
        Ok(CommitmentId(row.get("id")))
    }

    /// Aggregate per-AZ demand for one resource: usage, the confirmed
    /// commitment amount in excess of usage, and the amount still pending
    /// confirmation. This is the data the backchannel's `GetResourceDemand`
    /// callback hands to drivers mid-scrape (§4.4 step 3, §6).
    pub async fn demand_by_az(&self, resource_id: ResourceId) -> Result<Vec<AzDemand>> {
        let conn = self.pool.get().await?;
        let rows = conn
            .query(
                "SELECT ar.az, COALESCE(ar.usage, 0)::BIGINT AS usage, \
                        COALESCE(confirmed.amount, 0)::BIGINT AS confirmed, \
                        COALESCE(pending.amount, 0)::BIGINT AS pending \
                 FROM az_resources ar \
                 LEFT JOIN ( \
                   SELECT pc.az, SUM(pc.amount) AS amount FROM project_commitments pc \
                   JOIN project_resources pr ON pr.id = pc.project_resource_id \
                   WHERE pr.resource_id = $1 AND pc.status = 'confirmed' GROUP BY pc.az \
                 ) confirmed ON confirmed.az = ar.az \
                 LEFT JOIN ( \
                   SELECT pc.az, SUM(pc.amount) AS amount FROM project_commitments pc \
                   JOIN project_resources pr ON pr.id = pc.project_resource_id \
                   WHERE pr.resource_id = $1 AND pc.status IN ('pending', 'planned') GROUP BY pc.az \
                 ) pending ON pending.az = ar.az \
                 WHERE ar.resource_id = $1",
                &[&resource_id.0],
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let az_str: String = row.get("az");
                let usage = row.get::<_, i64>("usage") as u64;
                let confirmed = row.get::<_, i64>("confirmed") as u64;
                AzDemand {
                    az: AvailabilityZone::named(az_str),
                    usage,
                    unused_commitments: confirmed.saturating_sub(usage),
                    pending_commitments: row.get::<_, i64>("pending") as u64,
                }
            })
            .collect())
    }

    pub async fn project_resource_of(&self, id: CommitmentId) -> Result<ProjectResourceId> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_one(
                "SELECT project_resource_id FROM project_commitments WHERE id = $1",
                &[&id.0],
            )
            .await?;
        Ok(ProjectResourceId(row.get("project_resource_id")))
    }
}

fn row_to_commitment(row: tokio_postgres::Row) -> Result<ProjectCommitment> {
    let status_str: String = row.get("status");
    let status = status_str.parse::<CommitmentStatus>().map_err(|_| crate::error::Error::MissingValue("status"))?;
    let az_str: String = row.get("az");
    let transfer_status = row
        .get::<_, Option<String>>("transfer_status")
        .map(|s| match s.as_str() {
            "public" => TransferStatus::Public,
            _ => TransferStatus::Private,
        });
    let creation_context: Option<serde_json::Value> = row.get("creation_context");
    let supersede_context: Option<serde_json::Value> = row.get("supersede_context");
    Ok(ProjectCommitment {
        id: CommitmentId(row.get("id")),
        project_resource_id: ProjectResourceId(row.get("project_resource_id")),
        az: AvailabilityZone::named(az_str),
        amount: row.get::<_, i64>("amount") as u64,
        duration_seconds: row.get("duration_seconds"),
        created_at: row.get("created_at"),
        creator_uuid: row.get("creator_uuid"),
        confirm_by: row.get("confirm_by"),
        confirmed_at: row.get("confirmed_at"),
        expires_at: row.get("expires_at"),
        status,
        superseded_at: row.get("superseded_at"),
        transfer_token: row.get("transfer_token"),
        transfer_status,
        creation_context: creation_context.and_then(|v| serde_json::from_value(v).ok()),
        supersede_context: supersede_context.and_then(|v| serde_json::from_value(v).ok()),
        notify_on_confirm: row.get("notify_on_confirm"),
    })
}
