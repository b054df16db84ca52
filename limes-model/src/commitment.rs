use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ids::{CommitmentId, ProjectAzResourceId, ProjectResourceId};
use crate::topology::AvailabilityZone;

/// Lifecycle state of a commitment (§4.4.1, §4.5). Transitions are strictly
/// forward except `Superseded`/`Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitmentStatus {
    Planned,
    Pending,
    Confirmed,
    Superseded,
    Expired,
}

impl CommitmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitmentStatus::Planned => "planned",
            CommitmentStatus::Pending => "pending",
            CommitmentStatus::Confirmed => "confirmed",
            CommitmentStatus::Superseded => "superseded",
            CommitmentStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for CommitmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CommitmentStatus {
    type Err = UnknownCommitmentStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" => Ok(CommitmentStatus::Planned),
            "pending" => Ok(CommitmentStatus::Pending),
            "confirmed" => Ok(CommitmentStatus::Confirmed),
            "superseded" => Ok(CommitmentStatus::Superseded),
            "expired" => Ok(CommitmentStatus::Expired),
            other => Err(UnknownCommitmentStatus(other.to_owned())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown commitment status: {0}")]
pub struct UnknownCommitmentStatus(pub String);

/// Why a commitment's reserved amount moved between project AZ resources
/// during confirmation (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvenanceReason {
    /// The commitment was split to fit the remaining free capacity.
    Split,
    /// The commitment consumed capacity freed up by a donor commitment's
    /// split.
    Consume,
}

/// Recorded alongside a commitment whenever confirmation reshapes it, so
/// the history of splits/takeovers can be reconstructed later (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceContext {
    pub reason: ProvenanceReason,
    #[serde(default)]
    pub related_ids: Vec<CommitmentId>,
}

/// Visibility of a donor commitment's transfer offer (§4.5). Only `Public`
/// donors are eligible to be routed through during takeover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Public,
    Private,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectCommitment {
    pub id: CommitmentId,
    pub project_resource_id: ProjectResourceId,
    pub az: AvailabilityZone,
    pub amount: u64,
    pub duration_seconds: i64,
    pub created_at: DateTime<Utc>,
    pub creator_uuid: uuid::Uuid,
    /// Deadline by which this commitment must be confirmed or it expires
    /// unconfirmed (§4.5 step 2).
    pub confirm_by: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub status: CommitmentStatus,
    pub superseded_at: Option<DateTime<Utc>>,
    /// Non-null only while this commitment is a donor available for
    /// takeover by a later consumer (§4.5).
    pub transfer_token: Option<String>,
    pub transfer_status: Option<TransferStatus>,
    /// Why this commitment itself was created (e.g. as a split remainder).
    pub creation_context: Option<ProvenanceContext>,
    /// Why this commitment was superseded, once it has been.
    pub supersede_context: Option<ProvenanceContext>,
    pub notify_on_confirm: bool,
}

impl ProjectCommitment {
    /// The project AZ resource amount this commitment reserves, mirrored
    /// onto `ProjectAzResource.quota` once confirmed (§4.5 step 5).
    pub fn reserved_amount(&self) -> u64 {
        self.amount
    }
}

/// Outcome of confirmation for a single commitment, returned by the fit-test
/// so the confirmation job can apply the database writes atomically (§4.5).
#[derive(Debug, Clone)]
pub enum ConfirmationOutcome {
    Confirmed {
        amount_from_donors: Vec<(CommitmentId, u64)>,
    },
    Deferred,
    Expired,
}

/// The AZ resource a confirmed commitment draws capacity from, and the
/// amount of headroom still available to later commitments in FCFS order
/// (§4.5 step 3). `free_capacity` is capacity minus usage minus the sum of
/// already-confirmed commitments this pass.
#[derive(Debug, Clone)]
pub struct CommitmentFitContext {
    pub project_az_resource_id: ProjectAzResourceId,
    pub free_capacity: u64,
    pub overcommit_factor: f64,
}
