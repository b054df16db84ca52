//! The cluster's static, read-only configuration (§5, §9): which services
//! are discovered, which liquid driver backs each one, and the per-resource
//! behavior rules (overcommit, commitment durations, quota distribution)
//! that every worker consults. Loaded once at startup from YAML and shared
//! behind an `Arc` — nothing in this module ever mutates after load.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::quota::{OvercommitFactor, QuotaDistributionConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub discovery: DiscoveryConfig,
    pub services: Vec<ServiceConfig>,
    #[serde(default)]
    pub mail: MailTemplatesConfig,
    /// The cluster's named availability zones, passed to drivers during
    /// capacity scrape (§4.4 step 3) and used to seed `az-aware`/
    /// `az-separated` resources' AZ-resource rows.
    #[serde(default)]
    pub availability_zones: Vec<String>,
}

impl ClusterConfig {
    pub fn service(&self, service_type: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.service_type == service_type)
    }

    pub fn resource_behavior(&self, service_type: &str, resource_name: &str) -> ResourceBehavior {
        self.service(service_type)
            .and_then(|s| s.resource_behaviors.get(resource_name))
            .cloned()
            .unwrap_or_default()
    }
}

/// How the keystone sync job decides which domains/projects are in scope
/// (§4.2). Limes itself has no concept of domain/project filtering beyond
/// this static allow/deny list; anything not excluded is included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Base URL of the external identity store's domain/project listing
    /// endpoint (§4.2). The wire format it speaks is out of this
    /// specification's scope; only the shape the collector consumes here
    /// matters (§1).
    pub source_endpoint: String,
    #[serde(default)]
    pub exclude_domain_names: Vec<String>,
    #[serde(default)]
    pub exclude_project_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub service_type: String,
    /// Base URL of the liquid driver process for this service (§6). The
    /// collector appends the documented sub-paths (`/info`,
    /// `/capacity-report`, ...) itself.
    pub driver_endpoint: String,
    #[serde(default)]
    pub resource_behaviors: BTreeMap<String, ResourceBehavior>,
    #[serde(default = "default_scrape_interval")]
    pub scrape_interval_seconds: i64,
}

fn default_scrape_interval() -> i64 {
    900
}

impl ServiceConfig {
    pub fn scrape_interval(&self) -> Duration {
        Duration::from_secs(self.scrape_interval_seconds.max(0) as u64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceBehavior {
    #[serde(default)]
    pub overcommit_factor: OvercommitFactor,
    #[serde(default)]
    pub quota_distribution: QuotaDistributionConfig,
    /// How long a new commitment has to wait before it is confirmed against
    /// fresh capacity, in seconds (§4.4 step 5, §4.5 step 2). `0` means
    /// commitments for this resource confirm immediately if capacity
    /// allows.
    #[serde(default)]
    pub commitment_min_confirm_delay_seconds: i64,
    /// Commitment durations a project is allowed to request for this
    /// resource, e.g. `["1 month", "1 year", "3 years"]` (§4.5, GLOSSARY).
    #[serde(default)]
    pub commitment_durations: Vec<String>,
}

impl Default for ResourceBehavior {
    fn default() -> Self {
        ResourceBehavior {
            overcommit_factor: OvercommitFactor::default(),
            quota_distribution: QuotaDistributionConfig::default(),
            commitment_min_confirm_delay_seconds: 0,
            commitment_durations: Vec::new(),
        }
    }
}

/// Mail body/subject templates for the notifications the mail worker
/// enqueues (§4.8). Templates are plain format strings with `{field}`
/// placeholders filled in by the worker producing the notification; this
/// crate only carries the configured text, never renders it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MailTemplatesConfig {
    #[serde(default)]
    pub commitment_confirmed_subject: Option<String>,
    #[serde(default)]
    pub commitment_confirmed_body: Option<String>,
    #[serde(default)]
    pub commitment_expired_subject: Option<String>,
    #[serde(default)]
    pub commitment_expired_body: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::OvercommitFactor;

    fn sample_config() -> ClusterConfig {
        let mut behaviors = BTreeMap::new();
        behaviors.insert(
            "cores".to_string(),
            ResourceBehavior {
                overcommit_factor: OvercommitFactor(2.0),
                ..Default::default()
            },
        );

        ClusterConfig {
            discovery: DiscoveryConfig {
                source_endpoint: "http://keystone.example/v3".to_string(),
                exclude_domain_names: Vec::new(),
                exclude_project_names: Vec::new(),
            },
            services: vec![ServiceConfig {
                service_type: "compute".to_string(),
                driver_endpoint: "http://liquid-compute.example".to_string(),
                resource_behaviors: behaviors,
                scrape_interval_seconds: 900,
            }],
            mail: MailTemplatesConfig::default(),
            availability_zones: vec!["az-one".to_string()],
        }
    }

    #[test]
    fn resource_behavior_returns_the_configured_behavior() {
        let config = sample_config();
        let behavior = config.resource_behavior("compute", "cores");
        assert_eq!(behavior.overcommit_factor, OvercommitFactor(2.0));
    }

    #[test]
    fn resource_behavior_falls_back_to_default_for_unknown_resource() {
        let config = sample_config();
        let behavior = config.resource_behavior("compute", "ram");
        assert_eq!(behavior.overcommit_factor, OvercommitFactor::default());
    }

    #[test]
    fn resource_behavior_falls_back_to_default_for_unknown_service() {
        let config = sample_config();
        let behavior = config.resource_behavior("storage", "capacity");
        assert_eq!(behavior.overcommit_factor, OvercommitFactor::default());
    }

    #[test]
    fn service_lookup_finds_by_service_type() {
        let config = sample_config();
        assert!(config.service("compute").is_some());
        assert!(config.service("missing").is_none());
    }
}
