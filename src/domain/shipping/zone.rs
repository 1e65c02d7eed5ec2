//! Shipping zone value objects.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::catalog::Money;
use crate::domain::foundation::ValidationError;

/// Unique 2-3 character zone code, e.g. `UK`, `EU`, `ROW`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ZoneCode(String);

impl ZoneCode {
    pub const REST_OF_WORLD: &'static str = "ROW";

    pub fn new(code: &str) -> Result<Self, ValidationError> {
        let code = code.trim().to_ascii_uppercase();
        if code.is_empty() {
            return Err(ValidationError::empty_field("zone_code"));
        }
        if !(2..=3).contains(&code.len()) || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ValidationError::invalid_format(
                "zone_code",
                "must be 2-3 characters",
            ));
        }
        Ok(Self(code))
    }

    pub fn rest_of_world() -> Self {
        Self(Self::REST_OF_WORLD.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ZoneCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ZoneCode::new(&value)
    }
}

impl From<ZoneCode> for String {
    fn from(code: ZoneCode) -> Self {
        code.0
    }
}

impl fmt::Display for ZoneCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named shipping tariff. `rate` is charged per delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingZone {
    pub code: ZoneCode,
    pub nickname: String,
    /// Configured ISO country codes. For the rest-of-world zone an empty
    /// list means "every country nobody else claims".
    #[serde(default)]
    pub countries: Vec<String>,
    pub rate: Money,
    #[serde(default)]
    pub rest_of_world: bool,
}

impl ShippingZone {
    pub fn contains(&self, country: &str) -> bool {
        self.countries
            .iter()
            .any(|c| c.eq_ignore_ascii_case(country.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::Currency;

    #[test]
    fn zone_code_normalises_and_validates() {
        assert_eq!(ZoneCode::new("eu").unwrap().as_str(), "EU");
        assert!(ZoneCode::new("E").is_err());
        assert!(ZoneCode::new("EURO").is_err());
        assert!(ZoneCode::new("").is_err());
    }

    #[test]
    fn zone_code_deserialises_through_validation() {
        let code: ZoneCode = serde_json::from_str("\"row\"").unwrap();
        assert_eq!(code, ZoneCode::rest_of_world());
        assert!(serde_json::from_str::<ZoneCode>("\"toolong\"").is_err());
    }

    #[test]
    fn contains_is_case_insensitive() {
        let zone = ShippingZone {
            code: ZoneCode::new("EU").unwrap(),
            nickname: "Europe".into(),
            countries: vec!["FR".into(), "DE".into()],
            rate: Money::new(500, Currency::gbp()),
            rest_of_world: false,
        };
        assert!(zone.contains("fr"));
        assert!(!zone.contains("US"));
    }
}
