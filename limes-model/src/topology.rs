use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a resource's capacity and usage are distributed across availability
/// zones (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topology {
    /// No AZ dimension; all capacity/usage lives in the `any` bucket.
    Flat,
    /// Capacity/usage is reported per AZ but every AZ competes for one
    /// cluster-wide total when confirming commitments.
    AzAware,
    /// Capacity/usage is reported and confirmed independently per AZ.
    AzSeparated,
}

impl Topology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topology::Flat => "flat",
            Topology::AzAware => "az-aware",
            Topology::AzSeparated => "az-separated",
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Topology {
    type Err = UnknownTopology;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flat" => Ok(Topology::Flat),
            "az-aware" => Ok(Topology::AzAware),
            "az-separated" => Ok(Topology::AzSeparated),
            other => Err(UnknownTopology(other.to_owned())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown resource topology: {0}")]
pub struct UnknownTopology(pub String);

/// A logical location dimension. `Any` is the zone-agnostic bucket and
/// `Unknown` is the unattributed bucket; everything else is a concrete,
/// cluster-defined zone name (GLOSSARY).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvailabilityZone {
    Any,
    Unknown,
    Named(String),
}

impl AvailabilityZone {
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        match name.as_str() {
            "any" => AvailabilityZone::Any,
            "unknown" => AvailabilityZone::Unknown,
            _ => AvailabilityZone::Named(name),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, AvailabilityZone::Any)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, AvailabilityZone::Unknown)
    }

    pub fn as_str(&self) -> &str {
        match self {
            AvailabilityZone::Any => "any",
            AvailabilityZone::Unknown => "unknown",
            AvailabilityZone::Named(name) => name,
        }
    }
}

impl fmt::Display for AvailabilityZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for AvailabilityZone {
    fn from(value: &str) -> Self {
        AvailabilityZone::named(value)
    }
}

impl From<String> for AvailabilityZone {
    fn from(value: String) -> Self {
        AvailabilityZone::named(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topology_round_trips_through_its_string_form() {
        for topology in [Topology::Flat, Topology::AzAware, Topology::AzSeparated] {
            assert_eq!(topology.as_str().parse::<Topology>().unwrap(), topology);
        }
    }

    #[test]
    fn topology_rejects_unknown_strings() {
        assert!("region-aware".parse::<Topology>().is_err());
    }

    #[test]
    fn availability_zone_named_recognizes_reserved_names() {
        assert_eq!(AvailabilityZone::named("any"), AvailabilityZone::Any);
        assert_eq!(AvailabilityZone::named("unknown"), AvailabilityZone::Unknown);
        assert_eq!(
            AvailabilityZone::named("eu-central-1"),
            AvailabilityZone::Named("eu-central-1".to_string())
        );
    }

    #[test]
    fn availability_zone_predicates() {
        assert!(AvailabilityZone::Any.is_any());
        assert!(!AvailabilityZone::Any.is_unknown());
        assert!(AvailabilityZone::Unknown.is_unknown());
        assert!(!AvailabilityZone::named("az1").is_any());
    }
}
