//! Token amount representation.
//!
//! Amounts are stored as wei (base units) internally for precision, with
//! conversion to and from the 18-decimal human representation used by
//! markets and the Provider API.

use crate::error::{ChainError, Result};
use crate::WEI_PER_TOKEN;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// An amount of an ERC20-style token.
///
/// Internally stored as wei (1 token = 10^18 wei). All arithmetic is
/// integer-only; the `f64` constructors exist for test ergonomics and are
/// rounded at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Amount {
    wei: u128,
}

impl Amount {
    /// Zero tokens.
    pub const ZERO: Self = Self { wei: 0 };

    /// Maximum amount (`u128::MAX` wei), used for unlimited approvals.
    pub const MAX: Self = Self { wei: u128::MAX };

    /// Create an amount from wei (base units).
    #[must_use]
    pub const fn from_wei(wei: u128) -> Self {
        Self { wei }
    }

    /// Create an amount from a decimal token value.
    ///
    /// # Panics
    ///
    /// Panics if the amount is negative.
    #[must_use]
    pub fn tokens(amount: f64) -> Self {
        assert!(amount >= 0.0, "amount must be non-negative");
        let wei = (amount * WEI_PER_TOKEN as f64).round() as u128;
        Self { wei }
    }

    /// Parse an amount from a human-unit decimal string, e.g. `"10"` or
    /// `"2.5"`.
    ///
    /// # Errors
    ///
    /// Returns error if the string is not a non-negative decimal number or
    /// carries more than 18 fractional digits.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s.starts_with('-') || s.starts_with('+') {
            return Err(ChainError::invalid_amount(format!(
                "not a non-negative decimal: {s:?}"
            )));
        }

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if frac.len() > 18 {
            return Err(ChainError::invalid_amount(format!(
                "more than 18 fractional digits: {s:?}"
            )));
        }

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| ChainError::invalid_amount(format!("bad integer part: {s:?}")))?
        };
        let frac_wei: u128 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{frac:0<18}");
            padded
                .parse()
                .map_err(|_| ChainError::invalid_amount(format!("bad fractional part: {s:?}")))?
        };

        whole
            .checked_mul(WEI_PER_TOKEN)
            .and_then(|w| w.checked_add(frac_wei))
            .map(Self::from_wei)
            .ok_or_else(|| ChainError::invalid_amount(format!("amount overflows: {s:?}")))
    }

    /// Get the amount in wei.
    #[must_use]
    pub const fn wei(&self) -> u128 {
        self.wei
    }

    /// Get the amount as a decimal token value (lossy above 2^53 wei).
    #[must_use]
    pub fn as_tokens(&self) -> f64 {
        self.wei as f64 / WEI_PER_TOKEN as f64
    }

    /// Format the amount as a human-unit decimal string without trailing
    /// zeroes, e.g. `"2.5"`.
    #[must_use]
    pub fn to_decimal_string(&self) -> String {
        let whole = self.wei / WEI_PER_TOKEN;
        let frac = self.wei % WEI_PER_TOKEN;
        if frac == 0 {
            return whole.to_string();
        }
        let frac = format!("{frac:018}");
        format!("{whole}.{}", frac.trim_end_matches('0'))
    }

    /// Check if the amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.wei == 0
    }

    /// Saturating addition.
    #[must_use]
    pub const fn saturating_add(&self, other: Self) -> Self {
        Self {
            wei: self.wei.saturating_add(other.wei),
        }
    }

    /// Saturating subtraction.
    #[must_use]
    pub const fn saturating_sub(&self, other: Self) -> Self {
        Self {
            wei: self.wei.saturating_sub(other.wei),
        }
    }

    /// Checked addition.
    #[must_use]
    pub const fn checked_add(&self, other: Self) -> Option<Self> {
        match self.wei.checked_add(other.wei) {
            Some(wei) => Some(Self { wei }),
            None => None,
        }
    }

    /// Checked subtraction.
    #[must_use]
    pub const fn checked_sub(&self, other: Self) -> Option<Self> {
        match self.wei.checked_sub(other.wei) {
            Some(wei) => Some(Self { wei }),
            None => None,
        }
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal_string())
    }
}

impl Add for Amount {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            wei: self.wei + other.wei,
        }
    }
}

impl Sub for Amount {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            wei: self.wei - other.wei,
        }
    }
}

impl From<u128> for Amount {
    fn from(wei: u128) -> Self {
        Self::from_wei(wei)
    }
}
