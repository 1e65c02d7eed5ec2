//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid Stripe API key format")]
    InvalidStripeKey,

    #[error("Invalid Stripe webhook secret format")]
    InvalidStripeWebhookSecret,

    #[error("Invalid product id for {0}")]
    InvalidProductId(String),

    #[error("Unknown modern product key: {0}")]
    UnknownModernProduct(String),

    #[error("Gift codes must allow at least one redemption")]
    InvalidMaxRedemptions,

    #[error("Gift coupon prefix leaves no room for the product name")]
    GiftCouponPrefixTooLong,

    #[error("Invalid country code in allow-list: {0}")]
    InvalidCountryCode(String),
}
