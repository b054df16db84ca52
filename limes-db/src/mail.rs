use deadpool_postgres::Pool;
use limes_model::entities::ProjectMailNotification;
use limes_model::ids::ProjectId;

use crate::error::Result;

pub struct MailRepo<'a> {
    pool: &'a Pool,
}

impl<'a> MailRepo<'a> {
    pub(crate) fn new(pool: &'a Pool) -> Self {
        Self { pool }
    }

    /// Inserted whenever confirmation produces a notifiable event (§4.5).
    pub async fn enqueue(&self, project_id: ProjectId, subject: &str, body: &str) -> Result<i64> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_one(
                "INSERT INTO project_mail_notifications \
                   (project_id, subject, body, next_submission_at, failed_submissions) \
                 VALUES ($1, $2, $3, NOW(), 0) \
                 RETURNING id",
                &[&project_id.0, &subject, &body],
            )
            .await?;
        Ok(row.get("id"))
    }

    /// Selects the one due notification in the mail worker's ordering
    /// (§4.8): least-retried first, locked against other mail workers.
    pub async fn lock_next_due(&self) -> Result<Option<ProjectMailNotification>> {
        let mut conn = self.pool.get().await?;
        let tx = conn.transaction().await?;
        let row = tx
            .query_opt(
                "SELECT id, project_id, subject, body, next_submission_at, failed_submissions \
                 FROM project_mail_notifications \
                 WHERE next_submission_at <= NOW() \
                 ORDER BY failed_submissions ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED",
                &[],
            )
            .await?;
        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };
        let notification = ProjectMailNotification {
            id: row.get("id"),
            project_id: ProjectId(row.get("project_id")),
            subject: row.get("subject"),
            body: row.get("body"),
            next_submission_at: row.get("next_submission_at"),
            failed_submissions: row.get("failed_submissions"),
        };
        tx.execute(
            "UPDATE project_mail_notifications SET next_submission_at = NOW() + INTERVAL '1 hour' WHERE id = $1",
            &[&notification.id],
        )
        .await?;
        tx.commit().await?;
        Ok(Some(notification))
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let conn = self.pool.get().await?;
        conn.execute("DELETE FROM project_mail_notifications WHERE id = $1", &[&id])
            .await?;
        Ok(())
    }

    pub async fn reschedule_after_failure(
        &self,
        id: i64,
        failed_submissions: i32,
        next_submission_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        let conn = self.pool.get().await?;
        conn.execute(
            "UPDATE project_mail_notifications SET failed_submissions = $2, next_submission_at = $3 WHERE id = $1",
            &[&id, &failed_submissions, &next_submission_at],
        )
        .await?;
        Ok(())
    }
}
