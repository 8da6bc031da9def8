//! Fixed-point money amounts.

use serde::{Deserialize, Serialize};

/// Money amount held in integer minor units to avoid floating point and
/// text parsing issues.
///
/// The marketplace trades in a single currency, so no currency code is
/// carried alongside the amount.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates an amount from minor units (e.g. `10000` = 10000 rupiah).
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Returns zero money.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in minor units.
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Adds another amount, returning `None` on overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Multiplies by a quantity, returning `None` on overflow.
    pub fn checked_mul(&self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
