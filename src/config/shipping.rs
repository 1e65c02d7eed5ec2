//! Shipping configuration

use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::shipping::CountryAllowList;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShippingConfig {
    /// Comma-separated ISO alpha-2 codes replacing the processor's list
    pub allowed_countries: Option<String>,
}

impl ShippingConfig {
    pub fn allow_list(&self) -> CountryAllowList {
        match &self.allowed_countries {
            Some(codes) => CountryAllowList::from_codes(codes.split(',')),
            None => CountryAllowList::processor_default(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let Some(codes) = &self.allowed_countries else {
            return Ok(());
        };
        for code in codes.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(ValidationError::InvalidCountryCode(code.to_string()));
            }
        }
        if self.allow_list().is_empty() {
            return Err(ValidationError::MissingRequired("SHIPPING__ALLOWED_COUNTRIES"));
        }
        Ok(())
    }
}
