//! Serializable ledger state.
//!
//! A snapshot is the persisted layout: one record per market holding the
//! market, its vault balance and its jobs, plus the payable balances and
//! node reputations. [`Marketplace::restore`](crate::Marketplace::restore)
//! re-checks every invariant before accepting one.

use std::collections::BTreeMap;

use hypernode_core::{Amount, NodeReputation, Pubkey};
use serde::{Deserialize, Serialize};

use crate::job::Job;
use crate::market::Market;
use crate::vault::BalanceBook;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One market with its escrow and jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketRecord {
    /// The market record.
    pub market: Market,
    /// Escrowed total held by the market's vault.
    pub vault_balance: Amount,
    /// Every job created against the market, oldest first.
    pub jobs: Vec<Job>,
}

/// Complete state of a marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Format version.
    pub version: u32,
    /// Markets ordered by id.
    pub markets: Vec<MarketRecord>,
    /// Payable balances.
    #[serde(default)]
    pub balances: BalanceBook,
    /// Node reputation records.
    #[serde(default)]
    pub reputations: BTreeMap<Pubkey, NodeReputation>,
}

impl Default for LedgerSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            markets: Vec::new(),
            balances: BalanceBook::new(),
            reputations: BTreeMap::new(),
        }
    }
}

impl LedgerSnapshot {
    /// Number of jobs across all markets.
    #[must_use]
    pub fn job_count(&self) -> usize {
        self.markets.iter().map(|record| record.jobs.len()).sum()
    }
}
