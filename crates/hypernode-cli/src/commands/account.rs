//! Identity and balance commands.

use std::io::Write;

use hypernode_core::{Amount, Pubkey};
use hypernode_market::Marketplace;
use tracing::debug;

use crate::error::CliError;
use crate::output::{BalanceView, KeyView, OutputFormat};

/// Account command executor.
pub struct AccountCommand<'a> {
    place: &'a Marketplace,
}

impl<'a> AccountCommand<'a> {
    /// Create a new account command.
    #[must_use]
    pub const fn new(place: &'a Marketplace) -> Self {
        Self { place }
    }

    /// Generate a fresh identity. Nothing is written to the ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn keygen<W: Write>(writer: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let pubkey = Pubkey::new_unique();
        debug!(pubkey = %pubkey, "generated identity");
        format.write(writer, &KeyView { pubkey })
    }

    /// Credit an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the deposit is rejected or writing fails.
    pub fn deposit<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        account: Pubkey,
        amount: Amount,
    ) -> Result<(), CliError> {
        let balance = self.place.deposit(account, amount)?;
        format.write(writer, &BalanceView { account, balance })
    }

    /// Show an account's balance.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn balance<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        account: Pubkey,
    ) -> Result<(), CliError> {
        let balance = self.place.balance(&account);
        format.write(writer, &BalanceView { account, balance })
    }
}
