use deadpool_postgres::Pool;
use limes_model::entities::Project;
use limes_model::ids::{DomainId, ProjectId};

use crate::error::Result;

pub struct ProjectRepo<'a> {
    pool: &'a Pool,
}

impl<'a> ProjectRepo<'a> {
    pub(crate) fn new(pool: &'a Pool) -> Self {
        Self { pool }
    }

    pub async fn list_by_domain(&self, domain_id: DomainId) -> Result<Vec<Project>> {
        let conn = self.pool.get().await?;
        let rows = conn
            .query(
                "SELECT id, domain_id, external_id, name, parent_id FROM projects WHERE domain_id = $1 ORDER BY id ASC",
                &[&domain_id.0],
            )
            .await?;
        Ok(rows.into_iter().map(row_to_project).collect())
    }

    pub async fn get(&self, id: ProjectId) -> Result<Option<Project>> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_opt(
                "SELECT id, domain_id, external_id, name, parent_id FROM projects WHERE id = $1",
                &[&id.0],
            )
            .await?;
        Ok(row.map(row_to_project))
    }

    pub async fn list_all(&self) -> Result<Vec<Project>> {
        let conn = self.pool.get().await?;
        let rows = conn
            .query(
                "SELECT id, domain_id, external_id, name, parent_id FROM projects ORDER BY id ASC",
                &[],
            )
            .await?;
        Ok(rows.into_iter().map(row_to_project).collect())
    }

    /// Inserts a project discovered by keystone sync. The caller is
    /// responsible for materializing its `ProjectService` rows afterwards
    /// (§4.2).
    pub async fn insert(
        &self,
        domain_id: DomainId,
        external_id: &str,
        name: &str,
        parent_id: Option<ProjectId>,
    ) -> Result<ProjectId> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_one(
                "INSERT INTO projects (domain_id, external_id, name, parent_id) VALUES ($1, $2, $3, $4) RETURNING id",
                &[&domain_id.0, &external_id, &name, &parent_id.map(|p| p.0)],
            )
            .await?;
        Ok(ProjectId(row.get("id")))
    }

    pub async fn rename(&self, id: ProjectId, name: &str) -> Result<()> {
        let conn = self.pool.get().await?;
        conn.execute("UPDATE projects SET name = $2 WHERE id = $1", &[&id.0, &name])
            .await?;
        Ok(())
    }

    /// Deletes a project (§4.2): first removes commitments in terminal
    /// states in a nested transaction, then attempts the project row
    /// deletion. If the database rejects it because of live (non-terminal)
    /// commitments still referencing the project's resources, the whole
    /// operation rolls back and `false` is returned rather than propagating
    /// an error — the project is retained for a future sync pass.
    pub async fn try_delete(&self, id: ProjectId) -> Result<bool> {
        let mut conn = self.pool.get().await?;
        let tx = conn.transaction().await?;

        tx.execute(
            "DELETE FROM project_commitments pc \
             USING project_resources pr \
             WHERE pc.project_resource_id = pr.id \
               AND pr.project_id = $1 \
               AND pc.status IN ('superseded', 'expired')",
            &[&id.0],
        )
        .await?;

        let outcome = tx.execute("DELETE FROM projects WHERE id = $1", &[&id.0]).await;

        match outcome {
            Ok(_) => {
                tx.commit().await?;
                Ok(true)
            }
            Err(err) if is_foreign_key_violation(&err) => {
                tx.rollback().await?;
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn row_to_project(row: tokio_postgres::Row) -> Project {
    Project {
        id: ProjectId(row.get("id")),
        domain_id: DomainId(row.get("domain_id")),
        external_id: row.get("external_id"),
        name: row.get("name"),
        parent_id: row.get::<_, Option<i64>>("parent_id").map(ProjectId),
    }
}

fn is_foreign_key_violation(err: &tokio_postgres::Error) -> bool {
    err.code()
        .is_some_and(|code| code == &tokio_postgres::error::SqlState::FOREIGN_KEY_VIOLATION)
}
