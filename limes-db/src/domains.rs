use deadpool_postgres::Pool;
use limes_model::entities::Domain;
use limes_model::ids::DomainId;

use crate::error::Result;

pub struct DomainRepo<'a> {
    pool: &'a Pool,
}

impl<'a> DomainRepo<'a> {
    pub(crate) fn new(pool: &'a Pool) -> Self {
        Self { pool }
    }

    pub async fn list_all(&self) -> Result<Vec<Domain>> {
        let conn = self.pool.get().await?;
        let rows = conn
            .query("SELECT id, external_id, name FROM domains ORDER BY id ASC", &[])
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| Domain {
                id: DomainId(row.get("id")),
                external_id: row.get("external_id"),
                name: row.get("name"),
            })
            .collect())
    }

    /// Inserts a domain discovered by keystone sync (§4.2). Newly created
    /// domains recurse into project listing by the caller, not here.
    pub async fn insert(&self, external_id: &str, name: &str) -> Result<DomainId> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_one(
                "INSERT INTO domains (external_id, name) VALUES ($1, $2) RETURNING id",
                &[&external_id, &name],
            )
            .await?;
        Ok(DomainId(row.get("id")))
    }

    pub async fn rename(&self, id: DomainId, name: &str) -> Result<()> {
        let conn = self.pool.get().await?;
        conn.execute("UPDATE domains SET name = $2 WHERE id = $1", &[&id.0, &name])
            .await?;
        Ok(())
    }

    /// Deletes a domain; cascades to `projects` via the schema's foreign key
    /// (§3 invariant, ownership: a domain owns its projects).
    pub async fn delete(&self, id: DomainId) -> Result<()> {
        let conn = self.pool.get().await?;
        conn.execute("DELETE FROM domains WHERE id = $1", &[&id.0])
            .await?;
        Ok(())
    }
}
