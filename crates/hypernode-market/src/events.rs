//! Events emitted by successful transitions.
//!
//! The engine appends one event per state change. External collaborators
//! (indexers, the slashing program) consume them via
//! [`Marketplace::drain_events`](crate::Marketplace::drain_events).

use hypernode_core::{Amount, ContentHash, Pubkey};
use serde::{Deserialize, Serialize};

/// A marketplace event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MarketEvent {
    /// A market was created.
    MarketCreated {
        /// Market id.
        market: Pubkey,
        /// Creating authority.
        authority: Pubkey,
        /// Fixed job price.
        job_price: Amount,
        /// Unix timestamp.
        at: i64,
    },
    /// A job was escrowed and placed in the queue.
    JobQueued {
        /// Market id.
        market: Pubkey,
        /// Job id.
        job: Pubkey,
        /// 1-based queue position.
        position: usize,
        /// Unix timestamp.
        at: i64,
    },
    /// A job was bound to a node.
    JobMatched {
        /// Market id.
        market: Pubkey,
        /// Job id.
        job: Pubkey,
        /// Bound node.
        node: Pubkey,
        /// Unix timestamp.
        at: i64,
    },
    /// An idle node was placed in the queue.
    NodeQueued {
        /// Market id.
        market: Pubkey,
        /// Node id.
        node: Pubkey,
        /// 1-based queue position.
        position: usize,
        /// Unix timestamp.
        at: i64,
    },
    /// An idle node left the queue.
    NodeDelisted {
        /// Market id.
        market: Pubkey,
        /// Node id.
        node: Pubkey,
        /// Unix timestamp.
        at: i64,
    },
    /// A job completed and its price was released to the node.
    JobCompleted {
        /// Market id.
        market: Pubkey,
        /// Job id.
        job: Pubkey,
        /// Paid node.
        node: Pubkey,
        /// Result hash.
        ipfs_result: ContentHash,
        /// Released amount.
        payout: Amount,
        /// Unix timestamp.
        at: i64,
    },
    /// A queued job was withdrawn and refunded.
    JobStopped {
        /// Market id.
        market: Pubkey,
        /// Job id.
        job: Pubkey,
        /// Refunded client.
        client: Pubkey,
        /// Refunded amount.
        refund: Amount,
        /// Unix timestamp.
        at: i64,
    },
    /// A job passed its deadline and was refunded.
    ///
    /// `node` is set when the job was running, which is where a stake
    /// penalty would attach.
    JobTimedOut {
        /// Market id.
        market: Pubkey,
        /// Job id.
        job: Pubkey,
        /// Refunded client.
        client: Pubkey,
        /// Node that failed to deliver, if matched.
        node: Option<Pubkey>,
        /// Refunded amount.
        refund: Amount,
        /// Unix timestamp.
        at: i64,
    },
}

impl MarketEvent {
    /// The market the event belongs to.
    #[must_use]
    pub const fn market(&self) -> &Pubkey {
        match self {
            Self::MarketCreated { market, .. }
            | Self::JobQueued { market, .. }
            | Self::JobMatched { market, .. }
            | Self::NodeQueued { market, .. }
            | Self::NodeDelisted { market, .. }
            | Self::JobCompleted { market, .. }
            | Self::JobStopped { market, .. }
            | Self::JobTimedOut { market, .. } => market,
        }
    }

    /// Short name of the event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MarketCreated { .. } => "market_created",
            Self::JobQueued { .. } => "job_queued",
            Self::JobMatched { .. } => "job_matched",
            Self::NodeQueued { .. } => "node_queued",
            Self::NodeDelisted { .. } => "node_delisted",
            Self::JobCompleted { .. } => "job_completed",
            Self::JobStopped { .. } => "job_stopped",
            Self::JobTimedOut { .. } => "job_timed_out",
        }
    }
}
