use deadpool_postgres::{Pool, Transaction};
use limes_model::entities::{AzResource, ProjectAzResource, ProjectResource, Resource};
use limes_model::ids::{AzResourceId, ProjectAzResourceId, ProjectResourceId, ProjectId, ResourceId, ServiceId};
use limes_model::topology::{AvailabilityZone, Topology};
use tokio_postgres::GenericClient;

use crate::error::{Error, Result};

pub struct ResourceRepo<'a> {
    pool: &'a Pool,
}

impl<'a> ResourceRepo<'a> {
    pub(crate) fn new(pool: &'a Pool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: ResourceId) -> Result<Option<Resource>> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_opt(
                "SELECT id, service_id, name, unit, topology, has_capacity, has_quota, needs_resource_demand \
                 FROM resources WHERE id = $1",
                &[&id.0],
            )
            .await?;
        row.map(row_to_resource).transpose()
    }

    /// Looks up a resource by its service type and name, for the
    /// backchannel's `GetResourceDemand` callback (§4.4 step 3, §6), which
    /// only has the driver's own naming to go on.
    pub async fn find_by_service_type_and_name(&self, service_type: &str, name: &str) -> Result<Option<Resource>> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_opt(
                "SELECT r.id, r.service_id, r.name, r.unit, r.topology, r.has_capacity, r.has_quota, \
                        r.needs_resource_demand \
                 FROM resources r \
                 JOIN services s ON s.id = r.service_id \
                 WHERE s.service_type = $1 AND r.name = $2",
                &[&service_type, &name],
            )
            .await?;
        row.map(row_to_resource).transpose()
    }

    pub async fn list_by_service(&self, service_id: ServiceId) -> Result<Vec<Resource>> {
        let conn = self.pool.get().await?;
        list_by_service_on(&*conn, service_id).await
    }

    pub async fn list_by_service_tx(tx: &Transaction<'_>, service_id: ServiceId) -> Result<Vec<Resource>> {
        list_by_service_on(tx, service_id).await
    }

    pub async fn upsert_resource(
        &self,
        service_id: ServiceId,
        name: &str,
        unit: &str,
        topology: Topology,
        has_capacity: bool,
        has_quota: bool,
        needs_resource_demand: bool,
    ) -> Result<ResourceId> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_one(
                "INSERT INTO resources (service_id, name, unit, topology, has_capacity, has_quota, needs_resource_demand) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 ON CONFLICT (service_id, name) DO UPDATE SET \
                   unit = EXCLUDED.unit, topology = EXCLUDED.topology, has_capacity = EXCLUDED.has_capacity, \
                   has_quota = EXCLUDED.has_quota, needs_resource_demand = EXCLUDED.needs_resource_demand \
                 RETURNING id",
                &[
                    &service_id.0,
                    &name,
                    &unit,
                    &topology.as_str(),
                    &has_capacity,
                    &has_quota,
                    &needs_resource_demand,
                ],
            )
            .await?;
        Ok(ResourceId(row.get("id")))
    }

    /// Deletes a resource that the driver no longer advertises (§4.4 step
    /// 4). Fails with [`Error::DeletionBlocked`] if any non-terminal
    /// commitment still references one of its AZ-resources (§3 invariant
    /// 4/5); the caller propagates this as a fatal scrape error.
    pub async fn delete_resource(&self, id: ResourceId) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let tx = conn.transaction().await?;

        let blocked: i64 = tx
            .query_one(
                "SELECT COUNT(*) FROM project_commitments pc \
                 JOIN project_resources pr ON pr.id = pc.project_resource_id \
                 WHERE pr.resource_id = $1 AND pc.status NOT IN ('superseded', 'expired')",
                &[&id.0],
            )
            .await?
            .get(0);

        if blocked > 0 {
            tx.rollback().await?;
            return Err(Error::DeletionBlocked(id.0));
        }

        tx.execute("DELETE FROM resources WHERE id = $1", &[&id.0])
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn list_az_resources(&self, resource_id: ResourceId) -> Result<Vec<AzResource>> {
        let conn = self.pool.get().await?;
        list_az_resources_on(&*conn, resource_id).await
    }

    pub async fn list_az_resources_tx(tx: &Transaction<'_>, resource_id: ResourceId) -> Result<Vec<AzResource>> {
        list_az_resources_on(tx, resource_id).await
    }

    pub async fn ensure_az_resource(&self, resource_id: ResourceId, az: &AvailabilityZone) -> Result<AzResourceId> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_one(
                "INSERT INTO az_resources (resource_id, az, raw_capacity, last_nonzero_raw_capacity) \
                 VALUES ($1, $2, 0, 0) \
                 ON CONFLICT (resource_id, az) DO UPDATE SET resource_id = EXCLUDED.resource_id \
                 RETURNING id",
                &[&resource_id.0, &az.as_str()],
            )
            .await?;
        Ok(AzResourceId(row.get("id")))
    }

    /// Applies a capacity-report reconciliation to one AZ-resource row
    /// within the caller's capacity-scrape transaction (§4.4 step 6).
    /// `last_nonzero_raw_capacity` is only ever advanced, never cleared.
    pub async fn apply_capacity_report(
        &self,
        id: AzResourceId,
        raw_capacity: u64,
        usage: Option<u64>,
        subcapacities: &serde_json::Value,
    ) -> Result<()> {
        let conn = self.pool.get().await?;
        apply_capacity_report_on(&*conn, id, raw_capacity, usage, subcapacities).await
    }

    /// Same as [`Self::apply_capacity_report`], but runs inside an
    /// already-open transaction so it shares atomicity with the rest of the
    /// scrape's step-6 block (§4.4 step 6, §5).
    pub async fn apply_capacity_report_tx(
        tx: &Transaction<'_>,
        id: AzResourceId,
        raw_capacity: u64,
        usage: Option<u64>,
        subcapacities: &serde_json::Value,
    ) -> Result<()> {
        apply_capacity_report_on(tx, id, raw_capacity, usage, subcapacities).await
    }

    /// Treats a vanished `unknown` AZ bucket as `capacity = 0, usage = NULL`
    /// (§4.4 step 6) without disturbing `last_nonzero_raw_capacity`.
    pub async fn clear_unknown_bucket(&self, id: AzResourceId) -> Result<()> {
        let conn = self.pool.get().await?;
        clear_unknown_bucket_on(&*conn, id).await
    }

    pub async fn clear_unknown_bucket_tx(tx: &Transaction<'_>, id: AzResourceId) -> Result<()> {
        clear_unknown_bucket_on(tx, id).await
    }

    pub async fn ensure_project_resource(
        &self,
        project_id: ProjectId,
        resource_id: ResourceId,
    ) -> Result<ProjectResourceId> {
        let conn = self.pool.get().await?;
        ensure_project_resource_on(&*conn, project_id, resource_id).await
    }

    pub async fn ensure_project_resource_tx(
        tx: &Transaction<'_>,
        project_id: ProjectId,
        resource_id: ResourceId,
    ) -> Result<ProjectResourceId> {
        ensure_project_resource_on(tx, project_id, resource_id).await
    }

    pub async fn list_project_resources_by_resource(
        &self,
        resource_id: ResourceId,
    ) -> Result<Vec<ProjectResource>> {
        let conn = self.pool.get().await?;
        let rows = conn
            .query(
                "SELECT id, project_id, resource_id, quota, backend_quota, quota_override \
                 FROM project_resources WHERE resource_id = $1 ORDER BY id ASC",
                &[&resource_id.0],
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| ProjectResource {
                id: ProjectResourceId(row.get("id")),
                project_id: ProjectId(row.get("project_id")),
                resource_id: ResourceId(row.get("resource_id")),
                quota: row.get::<_, i64>("quota") as u64,
                backend_quota: row.get::<_, Option<i64>>("backend_quota").map(|v| v as u64),
                quota_override: row.get::<_, Option<i64>>("quota_override").map(|v| v as u64),
            })
            .collect())
    }

    pub async fn set_project_resource_quota(&self, id: ProjectResourceId, quota: u64) -> Result<()> {
        let conn = self.pool.get().await?;
        conn.execute(
            "UPDATE project_resources SET quota = $2 WHERE id = $1",
            &[&id.0, &(quota as i64)],
        )
        .await?;
        Ok(())
    }

    pub async fn ensure_project_az_resource(
        &self,
        project_resource_id: ProjectResourceId,
        az: &AvailabilityZone,
    ) -> Result<ProjectAzResourceId> {
        let conn = self.pool.get().await?;
        ensure_project_az_resource_on(&*conn, project_resource_id, az).await
    }

    pub async fn ensure_project_az_resource_tx(
        tx: &Transaction<'_>,
        project_resource_id: ProjectResourceId,
        az: &AvailabilityZone,
    ) -> Result<ProjectAzResourceId> {
        ensure_project_az_resource_on(tx, project_resource_id, az).await
    }

    pub async fn list_project_az_resources(
        &self,
        project_resource_id: ProjectResourceId,
    ) -> Result<Vec<ProjectAzResource>> {
        let conn = self.pool.get().await?;
        let rows = conn
            .query(
                "SELECT id, project_resource_id, az, quota, usage, physical_usage \
                 FROM project_az_resources WHERE project_resource_id = $1",
                &[&project_resource_id.0],
            )
            .await?;
        Ok(rows.into_iter().map(row_to_project_az_resource).collect())
    }

    pub async fn set_project_az_quota(&self, id: ProjectAzResourceId, quota: u64) -> Result<()> {
        let conn = self.pool.get().await?;
        conn.execute(
            "UPDATE project_az_resources SET quota = $2 WHERE id = $1",
            &[&id.0, &(quota as i64)],
        )
        .await?;
        Ok(())
    }

    pub async fn set_project_az_usage(
        &self,
        id: ProjectAzResourceId,
        usage: u64,
        physical_usage: Option<u64>,
    ) -> Result<()> {
        let conn = self.pool.get().await?;
        set_project_az_usage_on(&*conn, id, usage, physical_usage).await
    }

    pub async fn set_project_az_usage_tx(
        tx: &Transaction<'_>,
        id: ProjectAzResourceId,
        usage: u64,
        physical_usage: Option<u64>,
    ) -> Result<()> {
        set_project_az_usage_on(tx, id, usage, physical_usage).await
    }

    pub async fn mark_quota_desynced(&self, project_id: ProjectId, resource_id: ResourceId) -> Result<()> {
        let conn = self.pool.get().await?;
        conn.execute(
            "UPDATE project_services ps SET quota_desynced_at = NOW() \
             FROM resources r \
             WHERE ps.project_id = $1 AND ps.service_id = r.service_id AND r.id = $2",
            &[&project_id.0, &resource_id.0],
        )
        .await?;
        Ok(())
    }
}

async fn list_by_service_on(conn: &impl GenericClient, service_id: ServiceId) -> Result<Vec<Resource>> {
    let rows = conn
        .query(
            "SELECT id, service_id, name, unit, topology, has_capacity, has_quota, needs_resource_demand \
             FROM resources WHERE service_id = $1 ORDER BY id ASC",
            &[&service_id.0],
        )
        .await?;
    rows.into_iter().map(row_to_resource).collect()
}

async fn list_az_resources_on(conn: &impl GenericClient, resource_id: ResourceId) -> Result<Vec<AzResource>> {
    let rows = conn
        .query(
            "SELECT id, resource_id, az, raw_capacity, last_nonzero_raw_capacity, usage, subcapacities \
             FROM az_resources WHERE resource_id = $1",
            &[&resource_id.0],
        )
        .await?;
    Ok(rows.into_iter().map(row_to_az_resource).collect())
}

/// Shared body for [`ResourceRepo::apply_capacity_report`] and
/// [`ResourceRepo::apply_capacity_report_tx`]: generic over anything that can
/// run a query, so the exact same statement runs whether it's handed a
/// pooled connection or a transaction.
async fn apply_capacity_report_on(
    conn: &impl GenericClient,
    id: AzResourceId,
    raw_capacity: u64,
    usage: Option<u64>,
    subcapacities: &serde_json::Value,
) -> Result<()> {
    conn.execute(
        "UPDATE az_resources SET raw_capacity = $2, usage = $3, subcapacities = $4, \
         last_nonzero_raw_capacity = CASE WHEN $2 > 0 THEN $2 ELSE last_nonzero_raw_capacity END \
         WHERE id = $1",
        &[&id.0, &(raw_capacity as i64), &usage.map(|u| u as i64), subcapacities],
    )
    .await?;
    Ok(())
}

async fn clear_unknown_bucket_on(conn: &impl GenericClient, id: AzResourceId) -> Result<()> {
    conn.execute(
        "UPDATE az_resources SET raw_capacity = 0, usage = NULL WHERE id = $1",
        &[&id.0],
    )
    .await?;
    Ok(())
}

async fn ensure_project_resource_on(
    conn: &impl GenericClient,
    project_id: ProjectId,
    resource_id: ResourceId,
) -> Result<ProjectResourceId> {
    let row = conn
        .query_one(
            "INSERT INTO project_resources (project_id, resource_id, quota) VALUES ($1, $2, 0) \
             ON CONFLICT (project_id, resource_id) DO UPDATE SET project_id = EXCLUDED.project_id \
             RETURNING id",
            &[&project_id.0, &resource_id.0],
        )
        .await?;
    Ok(ProjectResourceId(row.get("id")))
}

async fn ensure_project_az_resource_on(
    conn: &impl GenericClient,
    project_resource_id: ProjectResourceId,
    az: &AvailabilityZone,
) -> Result<ProjectAzResourceId> {
    let row = conn
        .query_one(
            "INSERT INTO project_az_resources (project_resource_id, az, quota, usage) \
             VALUES ($1, $2, 0, 0) \
             ON CONFLICT (project_resource_id, az) DO UPDATE SET project_resource_id = EXCLUDED.project_resource_id \
             RETURNING id",
            &[&project_resource_id.0, &az.as_str()],
        )
        .await?;
    Ok(ProjectAzResourceId(row.get("id")))
}

async fn set_project_az_usage_on(
    conn: &impl GenericClient,
    id: ProjectAzResourceId,
    usage: u64,
    physical_usage: Option<u64>,
) -> Result<()> {
    conn.execute(
        "UPDATE project_az_resources SET usage = $2, physical_usage = $3 WHERE id = $1",
        &[&id.0, &(usage as i64), &physical_usage.map(|v| v as i64)],
    )
    .await?;
    Ok(())
}

fn row_to_resource(row: tokio_postgres::Row) -> Result<Resource> {
    let topology_str: String = row.get("topology");
    let topology = topology_str
        .parse::<Topology>()
        .map_err(|_| Error::MissingValue("topology"))?;
    Ok(Resource {
        id: ResourceId(row.get("id")),
        service_id: ServiceId(row.get("service_id")),
        name: row.get("name"),
        unit: row.get("unit"),
        topology,
        has_capacity: row.get("has_capacity"),
        has_quota: row.get("has_quota"),
        needs_resource_demand: row.get("needs_resource_demand"),
    })
}

fn row_to_az_resource(row: tokio_postgres::Row) -> AzResource {
    let az_str: String = row.get("az");
    AzResource {
        id: AzResourceId(row.get("id")),
        resource_id: ResourceId(row.get("resource_id")),
        az: AvailabilityZone::named(az_str),
        raw_capacity: row.get::<_, i64>("raw_capacity") as u64,
        last_nonzero_raw_capacity: row.get::<_, i64>("last_nonzero_raw_capacity") as u64,
        usage: row.get::<_, Option<i64>>("usage").map(|v| v as u64),
        subcapacities: row.get("subcapacities"),
    }
}

fn row_to_project_az_resource(row: tokio_postgres::Row) -> ProjectAzResource {
    let az_str: String = row.get("az");
    ProjectAzResource {
        id: ProjectAzResourceId(row.get("id")),
        project_resource_id: ProjectResourceId(row.get("project_resource_id")),
        az: AvailabilityZone::named(az_str),
        quota: row.get::<_, i64>("quota") as u64,
        usage: row.get::<_, i64>("usage") as u64,
        physical_usage: row.get::<_, Option<i64>>("physical_usage").map(|v| v as u64),
    }
}
