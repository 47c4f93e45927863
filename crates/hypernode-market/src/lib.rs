//! # hypernode-market
//!
//! Matching and escrow engine for the Hypernode GPU job marketplace.
//!
//! This crate provides:
//!
//! - [`MatchQueue`]: a single FIFO holding either waiting jobs or idle
//!   nodes, cross-matching on arrival
//! - [`Job`] records and their state machine
//! - [`Vault`] escrow that always holds the price of every open job
//! - [`Marketplace`], the store that serializes transitions per market
//! - [`LedgerSnapshot`] persistence and [`MarketEvent`] notifications
//!
//! ```
//! use std::sync::Arc;
//!
//! use hypernode_core::{Amount, ContentHash, Pubkey};
//! use hypernode_market::{
//!     CreateJob, EngineConfig, GpuType, JobAdmission, ManualClock, MarketParams, Marketplace,
//!     NodeAdmission,
//! };
//!
//! let place = Marketplace::new(EngineConfig::default(), Arc::new(ManualClock::new(0)))?;
//! let market = place.create_market(
//!     Pubkey::new_unique(),
//!     MarketParams::new(Amount::from_hyper(1), 3600, 0),
//! )?;
//!
//! let client = Pubkey::new_unique();
//! place.deposit(client, Amount::from_hyper(5))?;
//! let job = CreateJob {
//!     id: Pubkey::new_unique(),
//!     ipfs_job: ContentHash::of(b"job.json"),
//!     min_vram: 8,
//!     gpu_type: GpuType::Nvidia,
//! };
//! assert_eq!(
//!     place.create_job(market, client, job.clone())?,
//!     JobAdmission::Queued { position: 1 }
//! );
//!
//! let node = Pubkey::new_unique();
//! assert_eq!(place.list_node(market, node, 0)?, NodeAdmission::Matched { job: job.id });
//! place.finish_job(job.id, node, ContentHash::of(b"result"))?;
//! assert_eq!(place.balance(&node), Amount::from_hyper(1));
//! # Ok::<(), hypernode_market::MarketError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod job;
pub mod market;
pub mod marketplace;
pub mod queue;
pub mod snapshot;
pub mod vault;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, QueuedJobExpiry};
pub use error::{ErrorKind, MarketError, Result};
pub use events::MarketEvent;
pub use job::{CreateJob, GpuType, Job, JobState};
pub use market::{JobAdmission, Market, MarketParams, NodeAdmission};
pub use marketplace::Marketplace;
pub use queue::{MatchQueue, QueueType};
pub use snapshot::{LedgerSnapshot, MarketRecord};
pub use vault::{BalanceBook, Vault};
