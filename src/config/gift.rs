//! Gift configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Longest coupon name the provider accepts.
const MAX_COUPON_NAME: usize = 40;

fn default_coupon_prefix() -> String {
    "Gift Card: ".to_string()
}

fn default_max_redemptions() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct GiftConfig {
    /// Prefix of per-product gift coupon names. Also how the gift card
    /// migration recognises gift discounts.
    #[serde(default = "default_coupon_prefix")]
    pub coupon_name_prefix: String,

    /// Redemptions allowed per minted code
    #[serde(default = "default_max_redemptions")]
    pub max_redemptions: u32,
}

impl Default for GiftConfig {
    fn default() -> Self {
        Self {
            coupon_name_prefix: default_coupon_prefix(),
            max_redemptions: default_max_redemptions(),
        }
    }
}

impl GiftConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_redemptions == 0 {
            return Err(ValidationError::InvalidMaxRedemptions);
        }
        if self.coupon_name_prefix.chars().count() >= MAX_COUPON_NAME {
            return Err(ValidationError::GiftCouponPrefixTooLong);
        }
        Ok(())
    }
}
