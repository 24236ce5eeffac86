//! # Money — String-Amount Monetary Values
//!
//! Monetary amounts with currency, stored as strings to preserve precision.
//!
//! ## Security Invariant
//!
//! Financial amounts must never be represented as floating-point numbers.
//! String storage ensures no precision loss during serialization, and the
//! validated constructor rejects anything that is not a decimal number.
//!
//! Settlement arithmetic (penalty capture, claim deduction) operates in
//! smallest currency units via [`Money::minor_units`], which requires the
//! amount to be a whole number of minor units and rejects fractional
//! strings rather than rounding them.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Monetary amount with currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount as a decimal string in smallest currency units (e.g., "25000").
    pub amount: String,
    /// ISO 4217 currency code (e.g., "USD", "EUR").
    pub currency: String,
}

impl Money {
    /// Create a new monetary amount.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidAmount`] if the amount string is empty
    /// or contains non-numeric characters.
    pub fn new(amount: impl Into<String>, currency: impl Into<String>) -> Result<Self, CoreError> {
        let amount_str = amount.into();
        if !is_valid_decimal(&amount_str) {
            return Err(CoreError::InvalidAmount(amount_str));
        }
        Ok(Self {
            amount: amount_str,
            currency: currency.into(),
        })
    }

    /// Create from an `i64` number of smallest currency units.
    pub fn from_minor_units(units: i64, currency: impl Into<String>) -> Self {
        Self {
            amount: units.to_string(),
            currency: currency.into(),
        }
    }

    /// The amount as smallest currency units.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::FractionalAmount`] if the amount is not a whole
    /// number of minor units.
    pub fn minor_units(&self) -> Result<i64, CoreError> {
        self.amount
            .parse::<i64>()
            .map_err(|_| CoreError::FractionalAmount(self.amount.clone()))
    }

    /// Whether the amount is zero.
    pub fn is_zero(&self) -> bool {
        matches!(self.minor_units(), Ok(0))
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// Validate that a string represents a valid decimal number.
fn is_valid_decimal(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    let s = s.strip_prefix('-').unwrap_or(s);
    if s.is_empty() {
        return false;
    }
    let mut has_dot = false;
    let mut has_digit = false;
    for c in s.chars() {
        if c == '.' {
            if has_dot {
                return false;
            }
            has_dot = true;
        } else if c.is_ascii_digit() {
            has_digit = true;
        } else {
            return false;
        }
    }
    has_digit
}
