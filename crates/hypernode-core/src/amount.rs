//! HYPER token amount type.
//!
//! Amounts are held in base units (10^-6 HYPER). Prices, vault balances and
//! payable balances are all expressed in base units, so every arithmetic
//! operation is checked and integer-only.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Number of decimal places of the HYPER token.
pub const DECIMALS: u32 = 6;

/// One whole HYPER in base units.
pub const BASE_PER_HYPER: u64 = 1_000_000;

/// A HYPER token amount in base units.
///
/// Serialized as a plain integer so ledger snapshots stay exact.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    /// Zero amount constant.
    pub const ZERO: Self = Self(0);

    /// Maximum possible amount.
    pub const MAX: Self = Self(u64::MAX);

    /// Creates an amount from base units.
    #[must_use]
    pub const fn from_base(base: u64) -> Self {
        Self(base)
    }

    /// Creates an amount from whole HYPER, saturating on overflow.
    #[must_use]
    pub const fn from_hyper(hyper: u64) -> Self {
        Self(hyper.saturating_mul(BASE_PER_HYPER))
    }

    /// Returns the amount in base units.
    #[must_use]
    pub const fn as_base(self) -> u64 {
        self.0
    }

    /// Returns the amount in whole HYPER (truncates fractional part).
    #[must_use]
    pub const fn as_hyper(self) -> u64 {
        self.0 / BASE_PER_HYPER
    }

    /// Checked addition. Returns `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Checked subtraction. Returns `None` on underflow.
    #[must_use]
    pub const fn checked_sub(self, rhs: Self) -> Option<Self> {
        match self.0.checked_sub(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Returns true if this amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / BASE_PER_HYPER;
        let frac = self.0 % BASE_PER_HYPER;
        write!(f, "{whole}.{frac:06} HYPER")
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, a| Self(acc.0.saturating_add(a.0)))
    }
}

impl FromStr for Amount {
    type Err = CoreError;

    /// Parses a decimal HYPER string such as `"12"` or `"0.25"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('-') {
            return Err(CoreError::InvalidAmount("negative values not allowed".into()));
        }

        let (whole_str, frac_str) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };

        if frac_str.contains('.') {
            return Err(CoreError::InvalidAmount(format!("invalid format: {s}")));
        }
        if frac_str.len() > DECIMALS as usize {
            return Err(CoreError::InvalidAmount("too many decimal places".into()));
        }

        let whole: u64 = if whole_str.is_empty() {
            0
        } else {
            whole_str
                .parse()
                .map_err(|_| CoreError::InvalidAmount(format!("invalid whole part: {s}")))?
        };

        let frac: u64 = if frac_str.is_empty() {
            0
        } else {
            format!("{frac_str:0<6}")
                .parse()
                .map_err(|_| CoreError::InvalidAmount(format!("invalid fractional part: {s}")))?
        };

        whole
            .checked_mul(BASE_PER_HYPER)
            .and_then(|w| w.checked_add(frac))
            .map(Amount)
            .ok_or_else(|| CoreError::InvalidAmount("overflow".into()))
    }
}
