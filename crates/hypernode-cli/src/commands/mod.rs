//! CLI command implementations.
//!
//! Each submodule implements a specific CLI command group:
//! - [`account`] - Identities and payable balances
//! - [`market`] - Market creation, inspection and timeout sweeps
//! - [`job`] - Job lifecycle
//! - [`node`] - Node listing and reputation

pub mod account;
pub mod job;
pub mod market;
pub mod node;

pub use account::AccountCommand;
pub use job::JobCommand;
pub use market::MarketCommand;
pub use node::NodeCommand;
