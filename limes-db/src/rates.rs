use deadpool_postgres::Pool;
use limes_model::entities::ProjectRate;
use limes_model::ids::ProjectServiceId;

use crate::error::Result;

pub struct RateRepo<'a> {
    pool: &'a Pool,
}

impl<'a> RateRepo<'a> {
    pub(crate) fn new(pool: &'a Pool) -> Self {
        Self { pool }
    }

    pub async fn list_by_project_service(&self, project_service_id: ProjectServiceId) -> Result<Vec<ProjectRate>> {
        let conn = self.pool.get().await?;
        let rows = conn
            .query(
                "SELECT id, project_service_id, rate_name, value, previous_state \
                 FROM project_rates WHERE project_service_id = $1",
                &[&project_service_id.0],
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| ProjectRate {
                id: row.get("id"),
                project_service_id: ProjectServiceId(row.get("project_service_id")),
                rate_name: row.get("rate_name"),
                value: row.get("value"),
                previous_state: row.get("previous_state"),
            })
            .collect())
    }

    /// Upserts a counter snapshot, normalized to a big-integer string by
    /// the caller (§4.7). Unknown rates the driver returns are discarded by
    /// the caller before this is invoked; vanished rates are left alone so
    /// the last value is retained.
    pub async fn upsert(
        &self,
        project_service_id: ProjectServiceId,
        rate_name: &str,
        value: &str,
        state: Option<&serde_json::Value>,
    ) -> Result<()> {
        let conn = self.pool.get().await?;
        conn.execute(
            "INSERT INTO project_rates (project_service_id, rate_name, value, previous_state) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (project_service_id, rate_name) \
             DO UPDATE SET value = EXCLUDED.value, previous_state = EXCLUDED.previous_state",
            &[&project_service_id.0, &rate_name, &value, &state],
        )
        .await?;
        Ok(())
    }
}
