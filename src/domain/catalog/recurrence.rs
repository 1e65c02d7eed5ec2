//! Billing cadence of a recurring price.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::ValidationError;

/// Unit of a billing interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingInterval {
    Month,
    Year,
}

impl BillingInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Month => "month",
            BillingInterval::Year => "year",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "month" => Ok(BillingInterval::Month),
            "year" => Ok(BillingInterval::Year),
            other => Err(ValidationError::invalid_format(
                "interval",
                format!("expected 'month' or 'year', got '{}'", other),
            )),
        }
    }

    fn months(&self) -> u32 {
        match self {
            BillingInterval::Month => 1,
            BillingInterval::Year => 12,
        }
    }
}

/// Interval plus interval count, e.g. "every 2 months".
///
/// `interval_count` is at least 1, including when deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRecurrence")]
pub struct Recurrence {
    pub interval: BillingInterval,
    pub interval_count: u32,
}

#[derive(Deserialize)]
struct RawRecurrence {
    interval: BillingInterval,
    #[serde(default = "one")]
    interval_count: u32,
}

fn one() -> u32 {
    1
}

impl TryFrom<RawRecurrence> for Recurrence {
    type Error = ValidationError;

    fn try_from(raw: RawRecurrence) -> Result<Self, Self::Error> {
        Recurrence::new(raw.interval, raw.interval_count)
    }
}

impl Recurrence {
    pub fn new(interval: BillingInterval, interval_count: u32) -> Result<Self, ValidationError> {
        if interval_count == 0 {
            return Err(ValidationError::out_of_range(
                "interval_count",
                1,
                i64::from(u32::MAX),
                0,
            ));
        }
        Ok(Self {
            interval,
            interval_count,
        })
    }

    pub fn monthly() -> Self {
        Self {
            interval: BillingInterval::Month,
            interval_count: 1,
        }
    }

    pub fn annual() -> Self {
        Self {
            interval: BillingInterval::Year,
            interval_count: 1,
        }
    }

    /// Length of one billing period in months.
    pub fn months_per_period(&self) -> Decimal {
        Decimal::from(self.interval.months()) * Decimal::from(self.interval_count)
    }

    pub fn is_annual(&self) -> bool {
        self.interval == BillingInterval::Year
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.interval_count == 1 {
            write!(f, "{}", self.interval.as_str())
        } else {
            write!(f, "every {} {}s", self.interval_count, self.interval.as_str())
        }
    }
}
