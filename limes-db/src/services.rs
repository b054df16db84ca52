use deadpool_postgres::{Pool, Transaction};
use limes_model::entities::{Project, ProjectService, Service};
use limes_model::ids::{ProjectId, ProjectServiceId, ServiceId};
use tokio_postgres::GenericClient;

use crate::error::Result;

pub struct ServiceRepo<'a> {
    pool: &'a Pool,
}

impl<'a> ServiceRepo<'a> {
    pub(crate) fn new(pool: &'a Pool) -> Self {
        Self { pool }
    }

    pub async fn list_all(&self) -> Result<Vec<Service>> {
        let conn = self.pool.get().await?;
        let rows = conn
            .query(
                "SELECT id, service_type, liquid_version FROM services ORDER BY id ASC",
                &[],
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| Service {
                id: ServiceId(row.get("id")),
                service_type: row.get("service_type"),
                liquid_version: row.get("liquid_version"),
            })
            .collect())
    }

    /// Removes `services` rows whose type is no longer configured (§4.3).
    /// Cascades to resources/az-resources via the schema's foreign keys.
    pub async fn delete_missing(&self, configured_types: &[String]) -> Result<u64> {
        let conn = self.pool.get().await?;
        let affected = conn
            .execute(
                "DELETE FROM services WHERE service_type <> ALL($1)",
                &[&configured_types],
            )
            .await?;
        Ok(affected)
    }

    pub async fn ensure_exists(&self, service_type: &str) -> Result<ServiceId> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_one(
                "INSERT INTO services (service_type, liquid_version) VALUES ($1, 0) \
                 ON CONFLICT (service_type) DO UPDATE SET service_type = EXCLUDED.service_type \
                 RETURNING id",
                &[&service_type],
            )
            .await?;
        Ok(ServiceId(row.get("id")))
    }

    pub async fn set_liquid_version(&self, id: ServiceId, version: i64) -> Result<()> {
        let conn = self.pool.get().await?;
        conn.execute(
            "UPDATE services SET liquid_version = $2 WHERE id = $1",
            &[&id.0, &version],
        )
        .await?;
        Ok(())
    }

    /// Materializes every `project_services` row for one newly discovered
    /// project (§4.2), so the scraper picks it up immediately.
    pub async fn materialize_for_project(&self, project_id: ProjectId) -> Result<u64> {
        let conn = self.pool.get().await?;
        let affected = conn
            .execute(
                "INSERT INTO project_services (project_id, service_id, next_scrape_at, stale) \
                 SELECT $1, s.id, NOW(), TRUE FROM services s \
                 ON CONFLICT (project_id, service_id) DO NOTHING",
                &[&project_id.0],
            )
            .await?;
        Ok(affected)
    }

    /// Inserts any missing `project_services` row as the cross-product of
    /// `projects × services` (§4.3, §4.2). Idempotent.
    pub async fn sync_project_services(&self) -> Result<u64> {
        let conn = self.pool.get().await?;
        let affected = conn
            .execute(
                "INSERT INTO project_services (project_id, service_id, next_scrape_at, stale) \
                 SELECT p.id, s.id, NOW(), TRUE \
                 FROM projects p CROSS JOIN services s \
                 ON CONFLICT (project_id, service_id) DO NOTHING",
                &[],
            )
            .await?;
        Ok(affected)
    }

    /// Removes `project_services` rows whose project or service no longer
    /// exists. Relies on the schema's foreign keys to cascade in the common
    /// case; kept for the narrow window where a service row survives but a
    /// project's ownership set has shrunk.
    pub async fn remove_orphaned_project_services(&self) -> Result<u64> {
        let conn = self.pool.get().await?;
        let affected = conn
            .execute(
                "DELETE FROM project_services ps \
                 WHERE NOT EXISTS (SELECT 1 FROM projects p WHERE p.id = ps.project_id) \
                    OR NOT EXISTS (SELECT 1 FROM services s WHERE s.id = ps.service_id)",
                &[],
            )
            .await?;
        Ok(affected)
    }

    /// Selects one due project-service task in the job runner's strict
    /// total order and bumps `next_scrape_at` so no concurrent runner picks
    /// it up again before this pass finishes (§4.4 step 1, §5).
    pub async fn lock_next_due(&self, error_interval_secs: i64) -> Result<Option<(ProjectService, Project, Service)>> {
        let mut conn = self.pool.get().await?;
        let tx = conn.transaction().await?;

        let row = tx
            .query_opt(
                "SELECT ps.id, ps.project_id, ps.service_id, ps.next_scrape_at, ps.scraped_at, \
                        ps.stale, ps.quota_desynced_at, ps.scrape_error_message, ps.scrape_error_count, ps.metrics, \
                        p.domain_id, p.name AS project_name, p.parent_id, \
                        s.service_type, s.liquid_version \
                 FROM project_services ps \
                 JOIN projects p ON p.id = ps.project_id \
                 JOIN services s ON s.id = ps.service_id \
                 WHERE ps.next_scrape_at <= NOW() \
                 ORDER BY ps.next_scrape_at ASC, ps.id ASC \
                 LIMIT 1 \
                 FOR UPDATE OF ps SKIP LOCKED",
                &[],
            )
            .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };

        let ps_id: i64 = row.get("id");
        tx.execute(
            "UPDATE project_services SET next_scrape_at = NOW() + make_interval(secs => $2) WHERE id = $1",
            &[&ps_id, &(error_interval_secs as f64)],
        )
        .await?;
        tx.commit().await?;

        let project_service = ProjectService {
            id: ProjectServiceId(ps_id),
            project_id: ProjectId(row.get("project_id")),
            service_id: ServiceId(row.get("service_id")),
            next_scrape_at: row.get("next_scrape_at"),
            scraped_at: row.get("scraped_at"),
            stale: row.get("stale"),
            quota_desynced_at: row.get("quota_desynced_at"),
            scrape_error_message: row.get("scrape_error_message"),
            scrape_error_count: row.get("scrape_error_count"),
            metrics: row.get("metrics"),
        };
        let project = Project {
            id: project_service.project_id,
            domain_id: limes_model::ids::DomainId(row.get("domain_id")),
            name: row.get("project_name"),
            parent_id: row.get::<_, Option<i64>>("parent_id").map(ProjectId),
        };
        let service = Service {
            id: project_service.service_id,
            service_type: row.get("service_type"),
            liquid_version: row.get("liquid_version"),
        };

        Ok(Some((project_service, project, service)))
    }

    pub async fn record_scrape_error(
        &self,
        id: ProjectServiceId,
        message: &str,
        next_scrape_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        let conn = self.pool.get().await?;
        conn.execute(
            "UPDATE project_services SET scrape_error_message = $2, scrape_error_count = scrape_error_count + 1, \
             next_scrape_at = $3 WHERE id = $1",
            &[&id.0, &message, &next_scrape_at],
        )
        .await?;
        Ok(())
    }

    pub async fn record_scrape_success(
        &self,
        id: ProjectServiceId,
        scraped_at: chrono::DateTime<chrono::Utc>,
        next_scrape_at: chrono::DateTime<chrono::Utc>,
        metrics: &serde_json::Value,
    ) -> Result<()> {
        let conn = self.pool.get().await?;
        record_scrape_success_on(&*conn, id, scraped_at, next_scrape_at, metrics).await
    }

    /// Same as [`Self::record_scrape_success`], but runs inside the scrape's
    /// step-6 transaction so the schedule advance is atomic with the
    /// capacity/usage rows it reports on (§4.4 step 6, §5).
    pub async fn record_scrape_success_tx(
        tx: &Transaction<'_>,
        id: ProjectServiceId,
        scraped_at: chrono::DateTime<chrono::Utc>,
        next_scrape_at: chrono::DateTime<chrono::Utc>,
        metrics: &serde_json::Value,
    ) -> Result<()> {
        record_scrape_success_on(tx, id, scraped_at, next_scrape_at, metrics).await
    }
}

async fn record_scrape_success_on(
    conn: &impl GenericClient,
    id: ProjectServiceId,
    scraped_at: chrono::DateTime<chrono::Utc>,
    next_scrape_at: chrono::DateTime<chrono::Utc>,
    metrics: &serde_json::Value,
) -> Result<()> {
    conn.execute(
        "UPDATE project_services SET scraped_at = $2, next_scrape_at = $3, stale = FALSE, \
         scrape_error_message = NULL, scrape_error_count = 0, metrics = $4 WHERE id = $1",
        &[&id.0, &scraped_at, &next_scrape_at, metrics],
    )
    .await?;
    Ok(())
}
