//! Market commands.

use std::io::Write;

use hypernode_core::Pubkey;
use hypernode_market::{Market, MarketParams, Marketplace};

use crate::cli::{CreateMarketArgs, MarketCommands};
use crate::error::CliError;
use crate::output::{MarketList, MarketView, OutputFormat, SweepReport};

/// Market command executor.
pub struct MarketCommand<'a> {
    place: &'a Marketplace,
}

impl<'a> MarketCommand<'a> {
    /// Create a new market command.
    #[must_use]
    pub const fn new(place: &'a Marketplace) -> Self {
        Self { place }
    }

    /// Execute a market subcommand.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails.
    pub fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        command: &MarketCommands,
    ) -> Result<(), CliError> {
        match command {
            MarketCommands::Create(args) => {
                let id = self.create(args)?;
                format.write(writer, &self.view(&id)?)?;
            }
            MarketCommands::Show { id } => {
                format.write(writer, &self.view(id)?)?;
            }
            MarketCommands::List => {
                let markets = self
                    .place
                    .markets()
                    .into_iter()
                    .map(|market| self.with_vault(market))
                    .collect::<Result<Vec<_>, _>>()?;
                format.write(writer, &MarketList { markets })?;
            }
        }
        Ok(())
    }

    /// Time out every expired job of a market.
    ///
    /// # Errors
    ///
    /// Returns an error if the market is unknown or writing fails.
    pub fn sweep<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        market: Pubkey,
    ) -> Result<(), CliError> {
        let timed_out = self.place.sweep_timeouts(market)?;
        format.write(writer, &SweepReport { market, timed_out })
    }

    fn create(&self, args: &CreateMarketArgs) -> Result<Pubkey, CliError> {
        let params = MarketParams::new(args.price, args.timeout, args.min_stake);
        Ok(self.place.create_market(args.authority, params)?)
    }

    fn view(&self, id: &Pubkey) -> Result<MarketView, CliError> {
        let market = self
            .place
            .market(id)
            .ok_or_else(|| CliError::NotFound(format!("market {id}")))?;
        self.with_vault(market)
    }

    fn with_vault(&self, market: Market) -> Result<MarketView, CliError> {
        let vault_balance = self.place.vault_balance(&market.id)?;
        Ok(MarketView {
            market,
            vault_balance,
        })
    }
}
