use serde::{Deserialize, Serialize};

/// How a resource's project quota is computed during the quota job (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum QuotaDistributionConfig {
    /// Quota tracks historical usage plus committed amounts, growing by
    /// `growth_multiplier` whenever the project gets close to its current
    /// quota (§4.6 step 2).
    Autogrow {
        growth_multiplier: f64,
        project_base_quota: u64,
        usage_data_retention_period_seconds: i64,
        #[serde(default)]
        overcommit_until_allocated_percent: f64,
    },
    /// Quota equals usage; no growth, no commitments considered. Used for
    /// resources where capacity is not commitment-trackable.
    #[serde(rename = "usage-based")]
    UsageBased,
}

impl Default for QuotaDistributionConfig {
    fn default() -> Self {
        QuotaDistributionConfig::UsageBased
    }
}

/// Multiplier applied to raw capacity when computing how much commitment
/// volume a resource can admit before being considered full (§4.4 step 5,
/// §4.5 step 3). `1.0` means no overcommit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OvercommitFactor(pub f64);

impl Default for OvercommitFactor {
    fn default() -> Self {
        OvercommitFactor(1.0)
    }
}

impl OvercommitFactor {
    pub fn effective_capacity(&self, raw_capacity: u64) -> u64 {
        ((raw_capacity as f64) * self.0).floor() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_overcommit_factor_is_a_no_op() {
        assert_eq!(OvercommitFactor::default().effective_capacity(1000), 1000);
    }

    #[test]
    fn overcommit_factor_scales_and_floors() {
        // 1.5 * 101 = 151.5, floored to 151.
        assert_eq!(OvercommitFactor(1.5).effective_capacity(101), 151);
    }

    #[test]
    fn undercommit_factor_reduces_effective_capacity() {
        assert_eq!(OvercommitFactor(0.5).effective_capacity(100), 50);
    }
}
