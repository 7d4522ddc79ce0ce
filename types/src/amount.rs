//! Token amounts and holder balances.
//!
//! Amounts are fixed-point integers (u128) in the token's smallest unit to
//! avoid floating-point errors. Ownership shares are expressed in basis points.

use crate::address::AccountId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Smallest units per whole token (18 decimals).
pub const TOKEN_UNIT: u128 = 1_000_000_000_000_000_000;

/// Basis points in 100 %.
const BPS_SCALE: u128 = 10_000;

/// A token amount in smallest units.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TokenAmount(u128);

impl TokenAmount {
    pub const ZERO: Self = Self(0);

    pub fn new(raw: u128) -> Self {
        Self(raw)
    }

    /// Amount of `n` whole tokens.
    pub fn whole(n: u128) -> Self {
        Self(n.saturating_mul(TOKEN_UNIT))
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Share of `total` held by this amount, in basis points (rounded down).
    ///
    /// Returns 0 when `total` is zero.
    pub fn share_bps(&self, total: TokenAmount) -> u32 {
        if total.0 == 0 {
            return 0;
        }
        // Multiply first when it cannot overflow, otherwise scale the divisor down.
        let bps = match self.0.checked_mul(BPS_SCALE) {
            Some(scaled) => scaled / total.0,
            None => self.0 / (total.0 / BPS_SCALE).max(1),
        };
        bps.min(u32::MAX as u128) as u32
    }
}

impl Add for TokenAmount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for TokenAmount {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / TOKEN_UNIT;
        let frac = self.0 % TOKEN_UNIT;
        if frac == 0 {
            write!(f, "{whole}")
        } else {
            let digits = format!("{frac:018}");
            write!(f, "{whole}.{}", digits.trim_end_matches('0'))
        }
    }
}

/// One token holder's balance, as reported by the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HolderBalance {
    pub account: AccountId,
    pub balance: TokenAmount,
}

impl HolderBalance {
    pub fn new(account: AccountId, balance: TokenAmount) -> Self {
        Self { account, balance }
    }

    /// Ownership share of `circulating` in basis points.
    pub fn ownership_bps(&self, circulating: TokenAmount) -> u32 {
        self.balance.share_bps(circulating)
    }
}
