//! Newtype identifiers so a `ServiceId` and a `ResourceId` can't be swapped
//! by accident at a call site — both are `i64` underneath, matching the
//! `SERIAL`/`BIGSERIAL` primary keys the schema uses for everything except
//! commitments, which are operator-facing UUIDs (§3).

use serde::{Deserialize, Serialize};

macro_rules! int_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

int_id!(DomainId);
int_id!(ProjectId);
int_id!(ServiceId);
int_id!(ResourceId);
int_id!(AzResourceId);
int_id!(ProjectServiceId);
int_id!(ProjectResourceId);
int_id!(ProjectAzResourceId);

/// Commitments are referenced across API boundaries and mail templates, so
/// they carry an operator-facing UUID rather than a bare serial (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitmentId(pub uuid::Uuid);

impl std::fmt::Display for CommitmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
