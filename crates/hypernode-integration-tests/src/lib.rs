//! Integration test crate for the Hypernode marketplace.
//!
//! The tests live under `tests/`. This library only holds the shared
//! harness: a marketplace on a manual clock with one market already open.

#![forbid(unsafe_code)]

use std::sync::Arc;

use hypernode_core::{Amount, ContentHash, Pubkey};
use hypernode_market::{
    CreateJob, EngineConfig, GpuType, JobAdmission, ManualClock, MarketParams, Marketplace, Result,
};

/// Timestamp every harness clock starts at.
pub const GENESIS: i64 = 1_700_000_000;

/// A marketplace with a pinned clock and one open market.
#[derive(Debug)]
pub struct Harness {
    /// Engine under test.
    pub place: Marketplace,
    /// Clock driving `place`.
    pub clock: Arc<ManualClock>,
    /// The open market.
    pub market: Pubkey,
    /// Authority that created `market`.
    pub authority: Pubkey,
}

impl Harness {
    /// Opens a market with `params` under the default config.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are rejected.
    pub fn new(params: MarketParams) -> Result<Self> {
        Self::with_config(params, EngineConfig::default())
    }

    /// Opens a market with `params` under `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config or parameters are rejected.
    pub fn with_config(params: MarketParams, config: EngineConfig) -> Result<Self> {
        let clock = Arc::new(ManualClock::new(GENESIS));
        let place = Marketplace::new(config, clock.clone())?;
        let authority = Pubkey::derive(&[b"authority"]);
        let market = place.create_market(authority, params)?;
        Ok(Self {
            place,
            clock,
            market,
            authority,
        })
    }

    /// A client identity credited with `hyper` whole tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the deposit overflows.
    pub fn funded_client(&self, label: &str, hyper: u64) -> Result<Pubkey> {
        let client = identity(label);
        self.place.deposit(client, Amount::from_hyper(hyper))?;
        Ok(client)
    }

    /// Submits a job with id derived from `label` to the harness market.
    ///
    /// # Errors
    ///
    /// Returns whatever `create_job` rejects.
    pub fn submit(
        &self,
        client: Pubkey,
        label: &str,
    ) -> Result<(Pubkey, JobAdmission)> {
        let request = job_request(label, 0, GpuType::Any);
        let id = request.id;
        let admission = self.place.create_job(self.market, client, request)?;
        Ok((id, admission))
    }

    /// Vault balance of the harness market.
    ///
    /// # Errors
    ///
    /// Returns an error if the market is missing.
    pub fn vault(&self) -> Result<Amount> {
        self.place.vault_balance(&self.market)
    }
}

/// Deterministic identity for a label.
#[must_use]
pub fn identity(label: &str) -> Pubkey {
    Pubkey::derive(&[b"identity", label.as_bytes()])
}

/// Non-zero content hash for a label.
#[must_use]
pub fn content(label: &str) -> ContentHash {
    ContentHash::of(label.as_bytes())
}

/// A job request whose id and definition hash derive from `label`.
#[must_use]
pub fn job_request(label: &str, min_vram: u8, gpu_type: GpuType) -> CreateJob {
    CreateJob {
        id: Pubkey::derive(&[b"job", label.as_bytes()]),
        ipfs_job: content(label),
        min_vram,
        gpu_type,
    }
}
