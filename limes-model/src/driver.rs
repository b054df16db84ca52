//! Wire types for the liquid driver HTTP contract (§6). These are the JSON
//! shapes exchanged with each service's driver process during capacity and
//! rate scrapes; the collector itself never interprets resource-specific
//! attributes beyond passing them through to storage/metrics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub version: i64,
    pub resources: BTreeMap<String, ResourceInfo>,
    #[serde(default)]
    pub rates: BTreeMap<String, RateInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub unit: String,
    pub topology: String,
    #[serde(default)]
    pub has_capacity: bool,
    #[serde(default = "default_true")]
    pub has_quota: bool,
    #[serde(default)]
    pub needs_resource_demand: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateInfo {
    #[serde(default)]
    pub unit: Option<String>,
}

/// `GET /capacity-report` response (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCapacityReport {
    pub info_version: i64,
    pub resources: BTreeMap<String, ResourceCapacityReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceCapacityReport {
    /// Keyed by availability zone name, or `"any"` for flat-topology
    /// resources (§3).
    pub per_az: BTreeMap<String, AzCapacityReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzCapacityReport {
    pub capacity: u64,
    #[serde(default)]
    pub usage: Option<u64>,
    #[serde(default)]
    pub subcapacities: Vec<Subcapacity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subcapacity {
    pub name: String,
    pub capacity: u64,
    #[serde(default)]
    pub attributes: serde_json::Value,
}

/// `GET /usage-report` response, scoped to one project (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceUsageReport {
    pub info_version: i64,
    pub resources: BTreeMap<String, ResourceUsageReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUsageReport {
    pub per_az: BTreeMap<String, AzUsageReport>,
    #[serde(default)]
    pub quota: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzUsageReport {
    pub usage: u64,
    #[serde(default)]
    pub physical_usage: Option<u64>,
}

/// Response body for the backchannel's `GetResourceDemand` callback: a
/// driver calls this back into the collector mid-scrape to size its
/// capacity plans against commitments already admitted (§4.4 step 3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDemand {
    pub per_az: BTreeMap<String, AzResourceDemand>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzResourceDemand {
    pub usage: u64,
    pub unused_commitments: u64,
    pub pending_commitments: u64,
}

/// `PUT /quota` request body for quota-bearing resources (§6, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetQuotaRequest {
    pub resources: BTreeMap<String, QuotaByAz>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaByAz {
    pub per_az: BTreeMap<String, u64>,
}

/// `POST /rate-scrape` request/response pair (§4.7, §6). `previous_state` is
/// an opaque blob the driver returned on the prior scrape for this project;
/// the collector stores and replays it verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateScrapeRequest {
    #[serde(default)]
    pub previous_state: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateScrapeReport {
    pub rates: BTreeMap<String, String>,
    #[serde(default)]
    pub state: Option<serde_json::Value>,
}
