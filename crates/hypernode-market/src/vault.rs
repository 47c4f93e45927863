//! Escrow vault and payable balances.
//!
//! A [`Vault`] belongs to exactly one market and holds the price of every
//! open job of that market. Funds move between a vault and the
//! [`BalanceBook`] only inside job transitions; neither type exposes a way
//! to mint or burn value.

use std::collections::BTreeMap;

use hypernode_core::{Amount, Pubkey};
use serde::{Deserialize, Serialize};

use crate::error::{MarketError, Result};

/// Seed prefix for vault addresses.
const VAULT_SEED: &[u8] = b"vault";

/// Escrow account of a market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    address: Pubkey,
    balance: Amount,
}

impl Vault {
    /// Creates the empty vault for `market`.
    #[must_use]
    pub fn for_market(market: &Pubkey) -> Self {
        Self {
            address: Self::address_of(market),
            balance: Amount::ZERO,
        }
    }

    /// Deterministic vault address of a market.
    #[must_use]
    pub fn address_of(market: &Pubkey) -> Pubkey {
        Pubkey::derive(&[VAULT_SEED, market.as_bytes()])
    }

    pub(crate) const fn with_balance(mut self, balance: Amount) -> Self {
        self.balance = balance;
        self
    }

    /// Vault address.
    #[must_use]
    pub const fn address(&self) -> &Pubkey {
        &self.address
    }

    /// Escrowed total.
    #[must_use]
    pub const fn balance(&self) -> Amount {
        self.balance
    }

    /// Checks that `amount` can be deposited without overflow.
    pub(crate) fn check_deposit(&self, amount: Amount) -> Result<Amount> {
        self.balance
            .checked_add(amount)
            .ok_or_else(|| MarketError::Overflow(format!("vault {}", self.address)))
    }

    /// Adds a job price to the vault.
    pub(crate) fn deposit(&mut self, amount: Amount) -> Result<()> {
        self.balance = self.check_deposit(amount)?;
        Ok(())
    }

    /// Removes a job price from the vault, returning it for crediting.
    ///
    /// Used for both release and refund; only the recipient differs.
    pub(crate) fn withdraw(&mut self, amount: Amount) -> Result<Amount> {
        self.balance = self.balance.checked_sub(amount).ok_or_else(|| {
            MarketError::InvariantViolation(format!(
                "vault {} holds {} but {} is owed",
                self.address, self.balance, amount
            ))
        })?;
        Ok(amount)
    }
}

/// Payable balances of clients and nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BalanceBook {
    accounts: BTreeMap<Pubkey, Amount>,
}

impl BalanceBook {
    /// Creates an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of `account`, zero if unknown.
    #[must_use]
    pub fn balance(&self, account: &Pubkey) -> Amount {
        self.accounts.get(account).copied().unwrap_or(Amount::ZERO)
    }

    /// Checks that `account` can pay `amount`.
    pub fn check_debit(&self, account: &Pubkey, amount: Amount) -> Result<()> {
        let available = self.balance(account);
        if available < amount {
            return Err(MarketError::InsufficientFunds {
                required: amount,
                available,
            });
        }
        Ok(())
    }

    /// Checks that `account` can receive `amount` without overflow.
    pub fn check_credit(&self, account: &Pubkey, amount: Amount) -> Result<()> {
        self.balance(account)
            .checked_add(amount)
            .map(|_| ())
            .ok_or_else(|| MarketError::Overflow(format!("balance of {account}")))
    }

    /// Adds `amount` to `account`.
    pub fn credit(&mut self, account: &Pubkey, amount: Amount) -> Result<Amount> {
        let updated = self
            .balance(account)
            .checked_add(amount)
            .ok_or_else(|| MarketError::Overflow(format!("balance of {account}")))?;
        self.accounts.insert(*account, updated);
        Ok(updated)
    }

    /// Removes `amount` from `account`.
    pub fn debit(&mut self, account: &Pubkey, amount: Amount) -> Result<Amount> {
        self.check_debit(account, amount)?;
        let updated = self
            .balance(account)
            .checked_sub(amount)
            .unwrap_or(Amount::ZERO);
        self.accounts.insert(*account, updated);
        Ok(updated)
    }
}
