//! Job records and their lifecycle.
//!
//! ```text
//! Queued ──match──► Running ──finish──► Completed
//!   │                  └────deadline──► TimedOut
//!   ├──cancel──► Stopped
//!   └──expiry──► TimedOut
//! ```
//!
//! `Completed`, `Stopped` and `TimedOut` are terminal. A job never holds
//! funds itself; its price is accounted against the market vault.

use hypernode_core::{Amount, ContentHash, Pubkey};
use serde::{Deserialize, Serialize};

use crate::config::QueuedJobExpiry;
use crate::error::{MarketError, Result};

/// The state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting in the market queue for a node.
    Queued,
    /// Bound to a node and executing.
    Running,
    /// Result delivered, payment released to the node.
    Completed,
    /// Withdrawn by the client before matching, payment refunded.
    Stopped,
    /// Deadline passed, payment refunded.
    TimedOut,
}

impl JobState {
    /// Checks if a transition to the target state is valid.
    #[must_use]
    pub const fn can_transition_to(&self, target: &Self) -> bool {
        use JobState::{Completed, Queued, Running, Stopped, TimedOut};

        matches!(
            (self, target),
            (Queued, Running | Stopped | TimedOut) | (Running, Completed | TimedOut)
        )
    }

    /// Returns true for `Completed`, `Stopped` and `TimedOut`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::TimedOut)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Stopped => write!(f, "stopped"),
            Self::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// GPU vendor requirement of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpuType {
    /// Any vendor.
    #[default]
    Any,
    /// NVIDIA GPUs only.
    Nvidia,
    /// AMD GPUs only.
    Amd,
}

impl TryFrom<u8> for GpuType {
    type Error = MarketError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Any),
            1 => Ok(Self::Nvidia),
            2 => Ok(Self::Amd),
            other => Err(MarketError::InvalidInput(format!("unknown gpu type {other}"))),
        }
    }
}

impl std::str::FromStr for GpuType {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "any" => Ok(Self::Any),
            "nvidia" => Ok(Self::Nvidia),
            "amd" => Ok(Self::Amd),
            other => Err(MarketError::InvalidInput(format!("unknown gpu type '{other}'"))),
        }
    }
}

impl std::fmt::Display for GpuType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Nvidia => write!(f, "nvidia"),
            Self::Amd => write!(f, "amd"),
        }
    }
}

/// Client request to create a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateJob {
    /// Caller-supplied, globally unique job id.
    pub id: Pubkey,
    /// Content hash of the job definition.
    pub ipfs_job: ContentHash,
    /// Minimum VRAM in GB.
    pub min_vram: u8,
    /// GPU vendor requirement.
    pub gpu_type: GpuType,
}

/// A unit of compute work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Job id.
    pub id: Pubkey,
    /// Owning market (lookup key, not ownership).
    pub market: Pubkey,
    /// Client that created and paid for the job.
    pub client: Pubkey,
    /// Bound node, set exactly once on match.
    pub node: Option<Pubkey>,
    /// Content hash of the job definition.
    pub ipfs_job: ContentHash,
    /// Content hash of the result, zero until completed.
    pub ipfs_result: ContentHash,
    /// Price escrowed for this job, copied from the market at creation.
    pub price: Amount,
    /// Deadline in seconds, copied from the market at creation.
    pub timeout: i64,
    /// Minimum VRAM in GB.
    pub min_vram: u8,
    /// GPU vendor requirement.
    pub gpu_type: GpuType,
    /// Current state.
    pub state: JobState,
    /// Creation timestamp.
    pub time_created: i64,
    /// Match timestamp, zero until running.
    pub time_start: i64,
    /// Settlement timestamp, zero until terminal.
    pub time_end: i64,
}

impl Job {
    pub(crate) fn new(
        request: &CreateJob,
        market: Pubkey,
        client: Pubkey,
        price: Amount,
        timeout: i64,
        now: i64,
    ) -> Self {
        Self {
            id: request.id,
            market,
            client,
            node: None,
            ipfs_job: request.ipfs_job,
            ipfs_result: ContentHash::ZERO,
            price,
            timeout,
            min_vram: request.min_vram,
            gpu_type: request.gpu_type,
            state: JobState::Queued,
            time_created: now,
            time_start: 0,
            time_end: 0,
        }
    }

    /// Checks a transition without applying it.
    pub(crate) fn ensure_transition(&self, target: JobState) -> Result<()> {
        if self.state.can_transition_to(&target) {
            Ok(())
        } else {
            Err(MarketError::InvalidStateTransition {
                job: self.id,
                from: self.state,
                to: target,
            })
        }
    }

    /// Binds a node and starts the job. The node is set exactly once.
    pub(crate) fn start(&mut self, node: Pubkey, now: i64) -> Result<()> {
        self.ensure_transition(JobState::Running)?;
        if self.node.is_some() {
            return Err(MarketError::InvariantViolation(format!(
                "job {} already has a node",
                self.id
            )));
        }
        self.node = Some(node);
        self.state = JobState::Running;
        self.time_start = now;
        Ok(())
    }

    pub(crate) fn complete(&mut self, result: ContentHash, now: i64) -> Result<()> {
        self.ensure_transition(JobState::Completed)?;
        self.ipfs_result = result;
        self.state = JobState::Completed;
        self.time_end = now;
        Ok(())
    }

    pub(crate) fn stop(&mut self, now: i64) -> Result<()> {
        self.ensure_transition(JobState::Stopped)?;
        self.state = JobState::Stopped;
        self.time_end = now;
        Ok(())
    }

    pub(crate) fn time_out(&mut self, now: i64) -> Result<()> {
        self.ensure_transition(JobState::TimedOut)?;
        self.state = JobState::TimedOut;
        self.time_end = now;
        Ok(())
    }

    /// Returns true when the job's price is still held in the vault.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self.state, JobState::Queued | JobState::Running)
    }

    /// Returns true if the job is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// The timestamp after which the job may be timed out, if any.
    ///
    /// Running jobs are measured from `time_start`; queued jobs from
    /// `time_created` when the expiry policy covers them.
    #[must_use]
    pub fn deadline(&self, expiry: QueuedJobExpiry) -> Option<i64> {
        match self.state {
            JobState::Running => Some(self.time_start.saturating_add(self.timeout)),
            JobState::Queued if expiry == QueuedJobExpiry::QueuedAndRunning => {
                Some(self.time_created.saturating_add(self.timeout))
            }
            _ => None,
        }
    }

    /// Returns true when `now` is strictly past the job's deadline.
    #[must_use]
    pub fn is_expired(&self, now: i64, expiry: QueuedJobExpiry) -> bool {
        self.deadline(expiry).is_some_and(|deadline| now > deadline)
    }

    /// Seconds between start and end, zero unless the job ran.
    #[must_use]
    pub fn execution_secs(&self) -> u64 {
        if self.node.is_none() || self.time_end < self.time_start {
            return 0;
        }
        self.time_end.abs_diff(self.time_start)
    }
}
