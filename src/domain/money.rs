//! Lossless monetary amount type backed by rust_decimal.
//!
//! Provides canonical parsing from strings and formatting without exponent notation.

use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lossless monetary amount for auction prices, bids, and ceilings.
///
/// Backed by rust_decimal to avoid floating-point drift.
/// Serializes to JSON number (not string) by default.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(#[serde(with = "rust_decimal::serde::float")] RustDecimal);

impl Amount {
    /// Create an Amount from a RustDecimal.
    pub fn new(value: RustDecimal) -> Self {
        Amount(value)
    }

    /// Parse an Amount from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Amount)
    }

    /// Format the Amount as a canonical string (no exponent notation).
    pub fn to_canonical_string(&self) -> String {
        // normalize() removes trailing zeros; Display on the result has no exponent
        let normalized = self.0.normalize();
        format!("{}", normalized)
    }

    /// Get the underlying RustDecimal.
    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    /// The additive identity (0).
    pub fn zero() -> Self {
        Amount(RustDecimal::ZERO)
    }

    /// Returns true if the value is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Number of decimal places after normalization (trailing zeros ignored).
    pub fn scale(&self) -> u32 {
        self.0.normalize().scale()
    }

    /// Returns true if the amount is positive and has at most `max_scale`
    /// decimal places. Used to validate bid amounts and proxy ceilings.
    pub fn is_valid_money(&self, max_scale: u32) -> bool {
        self.is_positive() && self.scale() <= max_scale
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Amount {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Amount {
    fn from(value: RustDecimal) -> Self {
        Amount(value)
    }
}

impl From<Amount> for RustDecimal {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl std::ops::Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}
