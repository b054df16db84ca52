use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::*;
use crate::topology::{AvailabilityZone, Topology};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    pub id: DomainId,
    /// Stable identifier from the external identity store; `name` may be
    /// renamed without changing this (§4.2).
    pub external_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub domain_id: DomainId,
    pub external_id: String,
    pub name: String,
    pub parent_id: Option<ProjectId>,
}

/// A globally-registered resource driver identity (§3). Owned by the
/// cluster; deleted only when the driver disappears from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub service_type: String,
    pub liquid_version: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub service_id: ServiceId,
    pub name: String,
    pub unit: String,
    pub topology: Topology,
    pub has_capacity: bool,
    pub has_quota: bool,
    pub needs_resource_demand: bool,
}

/// One row per `(Resource, AvailabilityZone)` (§3, invariant 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzResource {
    pub id: AzResourceId,
    pub resource_id: ResourceId,
    pub az: AvailabilityZone,
    pub raw_capacity: u64,
    /// Set whenever a non-zero capacity has ever been observed; never reset
    /// to zero (invariant 3), except across a driver-initiated resource
    /// deletion that recreates the row.
    pub last_nonzero_raw_capacity: u64,
    pub usage: Option<u64>,
    /// Serialized `[{name, capacity, attributes}]` subcapacity breakdown
    /// from the most recent capacity report (§4.4 step 6, §6).
    pub subcapacities: serde_json::Value,
}

/// One per `(Project, Service)` (§3, invariant 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectService {
    pub id: ProjectServiceId,
    pub project_id: ProjectId,
    pub service_id: ServiceId,
    pub next_scrape_at: DateTime<Utc>,
    pub scraped_at: Option<DateTime<Utc>>,
    pub stale: bool,
    pub quota_desynced_at: Option<DateTime<Utc>>,
    pub scrape_error_message: Option<String>,
    pub scrape_error_count: i32,
    /// Serialized per-project usage/capacity metric samples captured by the
    /// last successful scrape (§4.4 step 6).
    pub metrics: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectResource {
    pub id: ProjectResourceId,
    pub project_id: ProjectId,
    pub resource_id: ResourceId,
    pub quota: u64,
    pub backend_quota: Option<u64>,
    pub quota_override: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectAzResource {
    pub id: ProjectAzResourceId,
    pub project_resource_id: ProjectResourceId,
    pub az: AvailabilityZone,
    pub quota: u64,
    pub usage: u64,
    pub physical_usage: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRate {
    pub id: i64,
    pub project_service_id: ProjectServiceId,
    pub rate_name: String,
    /// Normalized to a big-integer string, since rate counters can exceed
    /// u64 over a project's lifetime (§4.7).
    pub value: String,
    /// Opaque per-rate continuation state handed back to the driver on the
    /// next scrape (§6 `ScrapeRates`).
    pub previous_state: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMailNotification {
    pub id: i64,
    pub project_id: ProjectId,
    pub subject: String,
    pub body: String,
    pub next_submission_at: DateTime<Utc>,
    pub failed_submissions: i32,
}
