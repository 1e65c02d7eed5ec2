//! Money value object.
//!
//! Amounts are held in the currency's minor unit (pence, cents) as the
//! billing provider expects. Fractional intermediate results go through
//! `Decimal` and are rounded only when converted back to `Money`.

use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::ValidationError;

/// ISO-4217 currency code, stored lowercase like the billing provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    pub fn new(code: &str) -> Result<Self, ValidationError> {
        let code = code.trim().to_ascii_lowercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::invalid_format(
                "currency",
                format!("expected a 3-letter ISO code, got '{}'", code),
            ));
        }
        Ok(Self(code))
    }

    pub fn gbp() -> Self {
        Self("gbp".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display symbol, falling back to the upper-case code.
    pub fn sigil(&self) -> String {
        match self.0.as_str() {
            "gbp" => "£".to_string(),
            "usd" | "cad" | "aud" | "nzd" => "$".to_string(),
            "eur" => "€".to_string(),
            other => format!("{} ", other.to_ascii_uppercase()),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_ascii_uppercase())
    }
}

/// An amount of money in a single currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in minor units.
    amount: i64,
    currency: Currency,
}

impl Money {
    pub fn new(amount: i64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    /// Builds money from a major-unit decimal (e.g. `12.50`), rounding half
    /// away from zero to the nearest minor unit.
    pub fn from_major(major: Decimal, currency: Currency) -> Self {
        Self::new(round_to_minor(major * Decimal::ONE_HUNDRED), currency)
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    /// Amount in major units.
    pub fn to_major(&self) -> Decimal {
        Decimal::new(self.amount, 2)
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    pub fn is_negative(&self) -> bool {
        self.amount < 0
    }

    /// Multiplies by a (possibly fractional) factor, rounding the result.
    pub fn scale(&self, factor: Decimal) -> Self {
        let scaled = Decimal::from(self.amount) * factor;
        Self::new(round_to_minor(scaled), self.currency.clone())
    }

    /// Multiplies by `numerator / denominator`, dividing last so the only
    /// rounding is the final one. Saturates instead of overflowing.
    pub fn prorate(&self, numerator: Decimal, denominator: Decimal) -> Self {
        let exact = Decimal::from(self.amount)
            .checked_mul(numerator)
            .and_then(|product| product.checked_div(denominator))
            .map_or(i64::MAX, round_to_minor);
        Self::new(exact, self.currency.clone())
    }

    /// Same currency, different amount.
    pub fn with_amount(&self, amount: i64) -> Self {
        Self::new(amount, self.currency.clone())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let major = self.to_major().round_dp(2);
        write!(f, "{}{:.2}", self.currency.sigil(), major)
    }
}

fn round_to_minor(value: Decimal) -> i64 {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(i64::MAX)
}
