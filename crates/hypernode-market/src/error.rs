//! Error types for hypernode-market.

use hypernode_core::{Amount, Pubkey};
use thiserror::Error;

use crate::job::JobState;

/// Coarse classification of a [`MarketError`].
///
/// Callers that only need to branch on the failure category (retry, report
/// to the user, alert) match on this instead of the detailed variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed parameters.
    InvalidInput,
    /// Caller is not the identity the operation requires.
    Unauthorized,
    /// Transition attempted from a state that does not permit it.
    InvalidJobState,
    /// Queue or id uniqueness violation.
    DuplicateEntry,
    /// Escrow deposit cannot be covered.
    InsufficientFunds,
    /// Node stake below the market minimum.
    InsufficientStake,
    /// Unknown market or job.
    NotFound,
    /// Queue capacity reached.
    QueueFull,
    /// Arithmetic overflow or broken invariant.
    Internal,
}

/// Errors that can occur in marketplace operations.
///
/// Every failing operation leaves markets, jobs, vaults and balances
/// exactly as they were before the call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarketError {
    /// Malformed parameters.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Caller is not permitted to perform the operation.
    #[error("unauthorized: {caller} is not the {role} of {subject}")]
    Unauthorized {
        /// Identity that attempted the call.
        caller: Pubkey,
        /// The role the caller needed to hold.
        role: &'static str,
        /// The job or market the role applies to.
        subject: Pubkey,
    },

    /// Invalid job state transition.
    #[error("invalid state transition for job {job}: {from} -> {to}")]
    InvalidStateTransition {
        /// The job.
        job: Pubkey,
        /// The current state.
        from: JobState,
        /// The attempted target state.
        to: JobState,
    },

    /// Timeout attempted before the job's deadline.
    #[error("job {job} has not timed out yet (deadline {deadline}, now {now})")]
    JobNotTimedOut {
        /// The job.
        job: Pubkey,
        /// Unix timestamp after which the job may time out.
        deadline: i64,
        /// Current unix timestamp.
        now: i64,
    },

    /// Completion attempted after the job's deadline.
    #[error("job {job} expired at {deadline}")]
    JobExpired {
        /// The job.
        job: Pubkey,
        /// Unix timestamp the job expired at.
        deadline: i64,
    },

    /// Identity already present where it must be unique.
    #[error("duplicate {what}: {id}")]
    DuplicateEntry {
        /// What kind of entry collided (`job`, `node`).
        what: &'static str,
        /// The colliding identity.
        id: Pubkey,
    },

    /// Insufficient funds for the escrow deposit.
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Amount required for the operation.
        required: Amount,
        /// Amount currently available.
        available: Amount,
    },

    /// Node stake is below the market minimum.
    #[error("insufficient stake: required {required}, provided {provided}")]
    InsufficientStake {
        /// Market minimum.
        required: u128,
        /// Stake supplied for the node.
        provided: u128,
    },

    /// Market not found.
    #[error("market not found: {0}")]
    MarketNotFound(Pubkey),

    /// Job not found.
    #[error("job not found: {0}")]
    JobNotFound(Pubkey),

    /// Node is not waiting in the queue.
    #[error("node {0} is not queued")]
    NodeNotQueued(Pubkey),

    /// Queue capacity reached.
    #[error("queue full: capacity {capacity}")]
    QueueFull {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// Arithmetic overflow on a balance.
    #[error("balance overflow: {0}")]
    Overflow(String),

    /// A ledger invariant does not hold.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl MarketError {
    /// Returns the error category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) | Self::NodeNotQueued(_) => ErrorKind::InvalidInput,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::InvalidStateTransition { .. }
            | Self::JobNotTimedOut { .. }
            | Self::JobExpired { .. } => ErrorKind::InvalidJobState,
            Self::DuplicateEntry { .. } => ErrorKind::DuplicateEntry,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::InsufficientStake { .. } => ErrorKind::InsufficientStake,
            Self::MarketNotFound(_) | Self::JobNotFound(_) => ErrorKind::NotFound,
            Self::QueueFull { .. } => ErrorKind::QueueFull,
            Self::Overflow(_) | Self::InvariantViolation(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for marketplace operations.
pub type Result<T> = std::result::Result<T, MarketError>;

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn key() -> Pubkey {
        Pubkey::new([3; 32])
    }

    #[test]
    fn insufficient_funds_display() {
        let err = MarketError::InsufficientFunds {
            required: Amount::from_base(2_000_000),
            available: Amount::from_base(500_000),
        };
        let msg = err.to_string();
        assert!(msg.contains("2.000000 HYPER"));
        assert!(msg.contains("0.500000 HYPER"));
    }

    #[test]
    fn transition_display_names_states() {
        let err = MarketError::InvalidStateTransition {
            job: key(),
            from: JobState::Completed,
            to: JobState::TimedOut,
        };
        let msg = err.to_string();
        assert!(msg.contains("completed -> timed_out"));
    }

    #[test]
    fn unauthorized_display_names_role() {
        let err = MarketError::Unauthorized {
            caller: key(),
            role: "bound node",
            subject: key(),
        };
        assert!(err.to_string().contains("bound node"));
    }

    #[test_case(MarketError::InvalidInput("x".into()), ErrorKind::InvalidInput)]
    #[test_case(MarketError::NodeNotQueued(key()), ErrorKind::InvalidInput)]
    #[test_case(MarketError::JobExpired { job: key(), deadline: 1 }, ErrorKind::InvalidJobState)]
    #[test_case(MarketError::JobNotTimedOut { job: key(), deadline: 1, now: 0 }, ErrorKind::InvalidJobState)]
    #[test_case(MarketError::DuplicateEntry { what: "job", id: key() }, ErrorKind::DuplicateEntry)]
    #[test_case(MarketError::InsufficientStake { required: 2, provided: 1 }, ErrorKind::InsufficientStake)]
    #[test_case(MarketError::JobNotFound(key()), ErrorKind::NotFound)]
    #[test_case(MarketError::QueueFull { capacity: 1 }, ErrorKind::QueueFull)]
    #[test_case(MarketError::Overflow("vault".into()), ErrorKind::Internal)]
    fn kind_classification(err: MarketError, expected: ErrorKind) {
        assert_eq!(err.kind(), expected);
    }
}
