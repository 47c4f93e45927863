//! Reputation tracking for compute nodes.
//!
//! A node's record is updated as its jobs settle: completions raise the
//! completion rate, timeouts lower it. The score is an integer in
//! `0..=1000` and maps onto a [`Tier`].

use serde::{Deserialize, Serialize};

use crate::Amount;

/// Maximum reputation score.
pub const MAX_SCORE: u16 = 1000;

/// Minimum score for a node to be in good standing.
pub const GOOD_STANDING_SCORE: u16 = 500;

/// Reputation tier derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// 0..=200
    Starter,
    /// 201..=500
    Bronze,
    /// 501..=750
    Silver,
    /// 751..=900
    Gold,
    /// 901..=1000
    Diamond,
}

impl Tier {
    /// Returns the tier for a score.
    #[must_use]
    pub const fn from_score(score: u16) -> Self {
        match score {
            0..=200 => Self::Starter,
            201..=500 => Self::Bronze,
            501..=750 => Self::Silver,
            751..=900 => Self::Gold,
            _ => Self::Diamond,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Starter => write!(f, "starter"),
            Self::Bronze => write!(f, "bronze"),
            Self::Silver => write!(f, "silver"),
            Self::Gold => write!(f, "gold"),
            Self::Diamond => write!(f, "diamond"),
        }
    }
}

/// Settlement history of a single node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeReputation {
    completed_jobs: u64,
    timed_out_jobs: u64,
    total_revenue: Amount,
    avg_execution_secs: u64,
    last_active: i64,
}

impl NodeReputation {
    /// Creates an empty record. New nodes start with a perfect score.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            completed_jobs: 0,
            timed_out_jobs: 0,
            total_revenue: Amount::ZERO,
            avg_execution_secs: 0,
            last_active: 0,
        }
    }

    /// Records a completed job with its execution time and payout.
    pub fn record_success(&mut self, execution_secs: u64, revenue: Amount, at: i64) {
        self.completed_jobs = self.completed_jobs.saturating_add(1);
        self.total_revenue = self.total_revenue.checked_add(revenue).unwrap_or(Amount::MAX);

        // Rolling average weighted 9:1 towards history.
        self.avg_execution_secs = if self.avg_execution_secs == 0 {
            execution_secs
        } else {
            self.avg_execution_secs
                .saturating_mul(9)
                .saturating_add(execution_secs)
                / 10
        };
        self.last_active = at;
    }

    /// Records a job that the node let run past its deadline.
    pub fn record_timeout(&mut self, at: i64) {
        self.timed_out_jobs = self.timed_out_jobs.saturating_add(1);
        self.last_active = at;
    }

    /// Number of jobs completed.
    #[must_use]
    pub const fn completed_jobs(&self) -> u64 {
        self.completed_jobs
    }

    /// Number of jobs timed out while bound to this node.
    #[must_use]
    pub const fn timed_out_jobs(&self) -> u64 {
        self.timed_out_jobs
    }

    /// Total amount released to this node.
    #[must_use]
    pub const fn total_revenue(&self) -> Amount {
        self.total_revenue
    }

    /// Rolling average execution time in seconds.
    #[must_use]
    pub const fn avg_execution_secs(&self) -> u64 {
        self.avg_execution_secs
    }

    /// Timestamp of the last settlement involving this node.
    #[must_use]
    pub const fn last_active(&self) -> i64 {
        self.last_active
    }

    /// Completion rate in basis points (0..=10000).
    ///
    /// Nodes without history get the benefit of the doubt.
    #[must_use]
    pub fn completion_rate_bps(&self) -> u16 {
        let total = u128::from(self.completed_jobs) + u128::from(self.timed_out_jobs);
        if total == 0 {
            return 10_000;
        }
        (u128::from(self.completed_jobs) * 10_000 / total) as u16
    }

    /// Reputation score in `0..=1000`.
    #[must_use]
    pub fn score(&self) -> u16 {
        (self.completion_rate_bps() / 10).min(MAX_SCORE)
    }

    /// Tier for the current score.
    #[must_use]
    pub fn tier(&self) -> Tier {
        Tier::from_score(self.score())
    }

    /// True when the node is Silver tier or better.
    #[must_use]
    pub fn is_good_standing(&self) -> bool {
        self.score() >= GOOD_STANDING_SCORE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn new_node_has_perfect_score() {
        let rep = NodeReputation::new();
        assert_eq!(rep.score(), MAX_SCORE);
        assert_eq!(rep.tier(), Tier::Diamond);
        assert!(rep.is_good_standing());
    }

    #[test]
    fn success_accumulates_revenue_and_average() {
        let mut rep = NodeReputation::new();
        rep.record_success(100, Amount::from_base(500), 10);
        assert_eq!(rep.avg_execution_secs(), 100);
        rep.record_success(200, Amount::from_base(500), 20);
        assert_eq!(rep.avg_execution_secs(), 110);
        assert_eq!(rep.total_revenue(), Amount::from_base(1000));
        assert_eq!(rep.completed_jobs(), 2);
        assert_eq!(rep.last_active(), 20);
    }

    #[test]
    fn timeouts_lower_the_score() {
        let mut rep = NodeReputation::new();
        rep.record_success(60, Amount::from_base(1), 1);
        rep.record_timeout(2);
        assert_eq!(rep.completion_rate_bps(), 5_000);
        assert_eq!(rep.score(), 500);
        assert_eq!(rep.tier(), Tier::Bronze);
        assert!(rep.is_good_standing());

        rep.record_timeout(3);
        assert_eq!(rep.score(), 333);
        assert!(!rep.is_good_standing());
    }

    #[test]
    fn only_timeouts_is_zero() {
        let mut rep = NodeReputation::new();
        rep.record_timeout(1);
        assert_eq!(rep.score(), 0);
        assert_eq!(rep.tier(), Tier::Starter);
    }

    #[test_case(0, Tier::Starter)]
    #[test_case(200, Tier::Starter)]
    #[test_case(201, Tier::Bronze)]
    #[test_case(500, Tier::Bronze)]
    #[test_case(750, Tier::Silver)]
    #[test_case(900, Tier::Gold)]
    #[test_case(1000, Tier::Diamond)]
    fn tier_boundaries(score: u16, expected: Tier) {
        assert_eq!(Tier::from_score(score), expected);
    }

    #[test]
    fn serde_roundtrip() {
        let mut rep = NodeReputation::new();
        rep.record_success(30, Amount::from_base(7), 5);
        rep.record_timeout(6);
        let json = serde_json::to_string(&rep).unwrap();
        let restored: NodeReputation = serde_json::from_str(&json).unwrap();
        assert_eq!(rep, restored);
    }
}
