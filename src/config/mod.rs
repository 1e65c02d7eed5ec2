//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `MEMBERSHIP_BILLING` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use membership_billing::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Gift codes allow {} redemption(s)", config.gift.max_redemptions);
//! ```

mod catalog;
mod error;
mod gift;
mod payment;
mod shipping;

pub use catalog::CatalogConfig;
pub use error::{ConfigError, ValidationError};
pub use gift::GiftConfig;
pub use payment::PaymentConfig;
pub use shipping::ShippingConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Payment configuration (Stripe)
    pub payment: PaymentConfig,

    /// Carrier and modern product ids
    pub catalog: CatalogConfig,

    /// Gift coupon naming and code limits
    #[serde(default)]
    pub gift: GiftConfig,

    /// Country allow-list override
    #[serde(default)]
    pub shipping: ShippingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `MEMBERSHIP_BILLING` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `MEMBERSHIP_BILLING__PAYMENT__STRIPE_API_KEY=...` -> `payment.stripe_api_key`
    /// - `MEMBERSHIP_BILLING__CATALOG__MODERN_PRODUCTS__CLASSICS_ANNUAL=prod_...`
    ///   -> `catalog.modern_products["classics_annual"]`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Required environment variables are missing
    /// - Values cannot be parsed into expected types
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("MEMBERSHIP_BILLING")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.payment.validate()?;
        self.catalog.validate()?;
        self.gift.validate()?;
        self.shipping.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const MINIMAL_ENV: [(&str, &str); 4] = [
        ("MEMBERSHIP_BILLING__PAYMENT__STRIPE_API_KEY", "sk_test_xxx"),
        ("MEMBERSHIP_BILLING__PAYMENT__STRIPE_WEBHOOK_SECRET", "whsec_xxx"),
        ("MEMBERSHIP_BILLING__CATALOG__SHIPPING_PRODUCT_ID", "prod_shipping"),
        ("MEMBERSHIP_BILLING__CATALOG__DONATION_PRODUCT_ID", "prod_donation"),
    ];

    fn set_minimal_env() {
        for (key, value) in MINIMAL_ENV {
            env::set_var(key, value);
        }
    }

    fn clear_env() {
        for (key, _) in MINIMAL_ENV {
            env::remove_var(key);
        }
        env::remove_var("MEMBERSHIP_BILLING__GIFT__MAX_REDEMPTIONS");
        env::remove_var("MEMBERSHIP_BILLING__CATALOG__MODERN_PRODUCTS__CLASSICS_ANNUAL");
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.payment.stripe_api_key, "sk_test_xxx");
        assert_eq!(config.catalog.shipping_product_id, "prod_shipping");
        assert_eq!(config.gift.max_redemptions, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_nested_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("MEMBERSHIP_BILLING__GIFT__MAX_REDEMPTIONS", "3");
        env::set_var(
            "MEMBERSHIP_BILLING__CATALOG__MODERN_PRODUCTS__CLASSICS_ANNUAL",
            "prod_ca",
        );
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.gift.max_redemptions, 3);
        assert_eq!(
            config.catalog.modern_products.get("classics_annual").map(String::as_str),
            Some("prod_ca")
        );
    }

    #[test]
    fn test_missing_payment_section_fails() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        assert!(AppConfig::load().is_err());
    }
}
