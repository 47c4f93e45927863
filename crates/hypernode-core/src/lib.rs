//! # hypernode-core
//!
//! Primitives shared by the Hypernode GPU job marketplace.
//!
//! This crate provides:
//!
//! - [`Pubkey`]: 32-byte identity for markets, jobs, clients and nodes
//! - [`Amount`]: HYPER token amount in base units (6 decimals)
//! - [`ContentHash`]: fixed-width content address for job definitions and results
//! - [`NodeReputation`]: per-node completion history and tiering

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod amount;
pub mod error;
pub mod hash;
pub mod pubkey;
pub mod reputation;

pub use amount::Amount;
pub use error::CoreError;
pub use hash::ContentHash;
pub use pubkey::Pubkey;
pub use reputation::{NodeReputation, Tier};
