//! Job status enum mapping to the SMALLINT `status_id` column.
//!
//! Discriminants are part of the stored data; never renumber them.

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

/// Lifecycle status of a generation job.
///
/// `Pending` is assigned at creation, before the first poll result
/// arrives. `Queued` and `Processing` mirror what the inference
/// service reports. `Completed` and `Failed` are terminal: the
/// background monitor stops polling once either is stored.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending = 1,
    Queued = 2,
    Processing = 3,
    Completed = 4,
    Failed = 5,
}

impl JobStatus {
    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Look up a status from its database ID.
    pub fn from_id(id: StatusId) -> Option<Self> {
        match id {
            1 => Some(Self::Pending),
            2 => Some(Self::Queued),
            3 => Some(Self::Processing),
            4 => Some(Self::Completed),
            5 => Some(Self::Failed),
            _ => None,
        }
    }

    /// Lowercase wire name used in API responses.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether polling should stop once this status is stored.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl From<JobStatus> for StatusId {
    fn from(value: JobStatus) -> Self {
        value as StatusId
    }
}
