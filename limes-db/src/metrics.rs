//! Read-only aggregation queries backing the metrics exporter (§4.9). Each
//! query uses `JSON_OBJECT_AGG` database-side so the exporter can stream one
//! row per series without N+1 fetching in the request path.

use deadpool_postgres::Pool;

use crate::error::Result;

pub struct MetricsRepo<'a> {
    pool: &'a Pool,
}

/// One labeled sample, pre-aggregated by the database. `labels` carries
/// whatever dimensions the series is keyed by (service type, resource name,
/// AZ, project id) as a flat JSON object so the exporter can format label
/// pairs without a second round trip.
#[derive(Debug)]
pub struct LabeledSample {
    pub labels: serde_json::Value,
    pub value: f64,
}

impl<'a> MetricsRepo<'a> {
    pub(crate) fn new(pool: &'a Pool) -> Self {
        Self { pool }
    }

    pub async fn az_resource_raw_capacity(&self) -> Result<Vec<LabeledSample>> {
        self.run(
            "SELECT JSON_BUILD_OBJECT( \
                'service_type', s.service_type, 'resource', r.name, 'az', ar.az \
              ) AS labels, ar.raw_capacity::FLOAT8 AS value \
             FROM az_resources ar \
             JOIN resources r ON r.id = ar.resource_id \
             JOIN services s ON s.id = r.service_id",
        )
        .await
    }

    pub async fn az_resource_usage(&self, report_zeroes: bool) -> Result<Vec<LabeledSample>> {
        let sql = if report_zeroes {
            "SELECT JSON_BUILD_OBJECT( \
                'service_type', s.service_type, 'resource', r.name, 'az', ar.az \
              ) AS labels, COALESCE(ar.usage, 0)::FLOAT8 AS value \
             FROM az_resources ar \
             JOIN resources r ON r.id = ar.resource_id \
             JOIN services s ON s.id = r.service_id"
        } else {
            "SELECT JSON_BUILD_OBJECT( \
                'service_type', s.service_type, 'resource', r.name, 'az', ar.az \
              ) AS labels, ar.usage::FLOAT8 AS value \
             FROM az_resources ar \
             JOIN resources r ON r.id = ar.resource_id \
             JOIN services s ON s.id = r.service_id \
             WHERE ar.usage IS NOT NULL AND ar.usage <> 0"
        };
        self.run(sql).await
    }

    pub async fn project_resource_quota(&self) -> Result<Vec<LabeledSample>> {
        self.run(
            "SELECT JSON_BUILD_OBJECT( \
                'domain_id', p.domain_id, 'project_id', p.id, \
                'service_type', s.service_type, 'resource', r.name \
              ) AS labels, pr.quota::FLOAT8 AS value \
             FROM project_resources pr \
             JOIN resources r ON r.id = pr.resource_id \
             JOIN services s ON s.id = r.service_id \
             JOIN projects p ON p.id = pr.project_id",
        )
        .await
    }

    pub async fn project_az_resource_usage(&self, report_zeroes: bool) -> Result<Vec<LabeledSample>> {
        let sql = if report_zeroes {
            "SELECT JSON_BUILD_OBJECT( \
                'domain_id', p.domain_id, 'project_id', p.id, \
                'service_type', s.service_type, 'resource', r.name, 'az', pazr.az \
              ) AS labels, pazr.usage::FLOAT8 AS value \
             FROM project_az_resources pazr \
             JOIN project_resources pr ON pr.id = pazr.project_resource_id \
             JOIN resources r ON r.id = pr.resource_id \
             JOIN services s ON s.id = r.service_id \
             JOIN projects p ON p.id = pr.project_id"
        } else {
            "SELECT JSON_BUILD_OBJECT( \
                'domain_id', p.domain_id, 'project_id', p.id, \
                'service_type', s.service_type, 'resource', r.name, 'az', pazr.az \
              ) AS labels, pazr.usage::FLOAT8 AS value \
             FROM project_az_resources pazr \
             JOIN project_resources pr ON pr.id = pazr.project_resource_id \
             JOIN resources r ON r.id = pr.resource_id \
             JOIN services s ON s.id = r.service_id \
             JOIN projects p ON p.id = pr.project_id \
             WHERE pazr.usage <> 0"
        };
        self.run(sql).await
    }

    pub async fn project_commitment_amount(&self) -> Result<Vec<LabeledSample>> {
        self.run(
            "SELECT JSON_BUILD_OBJECT( \
                'domain_id', p.domain_id, 'project_id', p.id, \
                'service_type', s.service_type, 'resource', r.name, 'az', pc.az, 'status', pc.status \
              ) AS labels, pc.amount::FLOAT8 AS value \
             FROM project_commitments pc \
             JOIN project_resources pr ON pr.id = pc.project_resource_id \
             JOIN resources r ON r.id = pr.resource_id \
             JOIN services s ON s.id = r.service_id \
             JOIN projects p ON p.id = pr.project_id \
             WHERE pc.status IN ('pending', 'planned', 'confirmed')",
        )
        .await
    }

    async fn run(&self, sql: &str) -> Result<Vec<LabeledSample>> {
        let conn = self.pool.get().await?;
        let rows = conn.query(sql, &[]).await?;
        Ok(rows
            .into_iter()
            .map(|row| LabeledSample {
                labels: row.get("labels"),
                value: row.get("value"),
            })
            .collect())
    }
}
