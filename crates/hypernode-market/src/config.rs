//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::{MarketError, Result};

/// Default queue capacity per market.
pub const DEFAULT_MAX_QUEUE_LEN: usize = 314;

/// Which job states are eligible for the timeout transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuedJobExpiry {
    /// Only running jobs time out, measured from `time_start`.
    RunningOnly,
    /// Queued jobs also time out, measured from `time_created`.
    #[default]
    QueuedAndRunning,
}

/// Configuration for the marketplace engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of waiting entries per market queue.
    pub max_queue_len: usize,
    /// Timeout eligibility policy.
    pub queued_job_expiry: QueuedJobExpiry,
    /// Reject `finish_job` once the job's deadline has passed.
    pub enforce_deadline_on_finish: bool,
    /// Maintain per-node reputation records.
    pub track_reputation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_queue_len: DEFAULT_MAX_QUEUE_LEN,
            queued_job_expiry: QueuedJobExpiry::default(),
            enforce_deadline_on_finish: true,
            track_reputation: true,
        }
    }
}

impl EngineConfig {
    /// Creates a config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the queue capacity.
    #[must_use]
    pub const fn with_max_queue_len(mut self, len: usize) -> Self {
        self.max_queue_len = len;
        self
    }

    /// Sets the timeout eligibility policy.
    #[must_use]
    pub const fn with_queued_job_expiry(mut self, expiry: QueuedJobExpiry) -> Self {
        self.queued_job_expiry = expiry;
        self
    }

    /// Enables or disables the finish deadline check.
    #[must_use]
    pub const fn with_deadline_on_finish(mut self, enforce: bool) -> Self {
        self.enforce_deadline_on_finish = enforce;
        self
    }

    /// Enables or disables reputation tracking.
    #[must_use]
    pub const fn with_reputation(mut self, track: bool) -> Self {
        self.track_reputation = track;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidInput`] if the queue capacity is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_queue_len == 0 {
            return Err(MarketError::InvalidInput(
                "max_queue_len must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
