//! Job status enum mapping to the `job_statuses` SMALLSERIAL lookup table.
//!
//! Variant discriminants match the seed data order (1-based). Statuses
//! only ever move forward: `queued -> processing -> {completed | failed
//! | timed_out}`, and nothing leaves a terminal state. The repositories
//! enforce this in SQL; [`JobStatus::can_transition_to`] is the same
//! rule as a pure function for callers and tests.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

/// Lifecycle status of a generation job.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued = 1,
    Processing = 2,
    Completed = 3,
    Failed = 4,
    TimedOut = 5,
}

/// Terminal statuses: completed, failed, timed_out.
pub const TERMINAL_STATUSES: [StatusId; 3] = [
    JobStatus::Completed as StatusId,
    JobStatus::Failed as StatusId,
    JobStatus::TimedOut as StatusId,
];

impl JobStatus {
    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Look a status up by its database ID.
    pub fn from_id(id: StatusId) -> Option<Self> {
        match id {
            1 => Some(Self::Queued),
            2 => Some(Self::Processing),
            3 => Some(Self::Completed),
            4 => Some(Self::Failed),
            5 => Some(Self::TimedOut),
            _ => None,
        }
    }

    /// Wire name, matching the seeded `job_statuses.name` column.
    pub fn name(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }

    /// Whether this status admits no further transitions.
    pub fn is_terminal(self) -> bool {
        TERMINAL_STATUSES.contains(&self.id())
    }

    /// The forward-only transition rule.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        match self {
            Self::Queued => matches!(
                next,
                Self::Processing | Self::Completed | Self::Failed | Self::TimedOut
            ),
            Self::Processing => {
                matches!(next, Self::Completed | Self::Failed | Self::TimedOut)
            }
            Self::Completed | Self::Failed | Self::TimedOut => false,
        }
    }
}

impl From<JobStatus> for StatusId {
    fn from(value: JobStatus) -> Self {
        value as StatusId
    }
}
