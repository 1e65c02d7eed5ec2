//! Strongly-typed identifier value objects.
//!
//! Billing objects are identified by opaque provider strings (`sub_*`,
//! `price_*`, `promo_*`). Each gets its own newtype so a price id can never be
//! passed where a subscription id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

macro_rules! provider_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Prefix the billing provider uses for this object type.
            pub const PREFIX: &'static str = $prefix;

            /// Wraps an id issued by the billing provider.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Parses user-supplied input, rejecting empty strings.
            pub fn parse(id: &str) -> Result<Self, ValidationError> {
                let id = id.trim();
                if id.is_empty() {
                    return Err(ValidationError::empty_field(stringify!($name)));
                }
                Ok(Self(id.to_string()))
            }

            /// Returns true if the raw string carries this object's provider prefix.
            pub fn has_prefix(raw: &str) -> bool {
                raw.starts_with(Self::PREFIX)
            }

            /// Returns the inner string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

provider_id!(
    /// Billing customer identifier.
    CustomerId,
    "cus_"
);
provider_id!(
    /// Recurring billing subscription identifier.
    SubscriptionId,
    "sub_"
);
provider_id!(
    /// Subscription item identifier.
    SubscriptionItemId,
    "si_"
);
provider_id!(
    /// Price identifier.
    PriceId,
    "price_"
);
provider_id!(
    /// Product identifier.
    ProductId,
    "prod_"
);
provider_id!(
    /// Promotion code identifier (not the customer-facing code).
    PromotionCodeId,
    "promo_"
);
provider_id!(
    /// Coupon identifier.
    CouponId,
    ""
);
provider_id!(
    /// Payment method identifier.
    PaymentMethodId,
    "pm_"
);
provider_id!(
    /// Membership plan identifier from the content system.
    PlanId,
    ""
);
provider_id!(
    /// Identifier of a priced offer on a membership plan.
    PlanPriceId,
    ""
);

/// User identifier (typically from auth provider).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Creates a new UserId, returning error if empty.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ValidationError::empty_field("user_id"));
        }
        Ok(Self(id))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_rejects_empty() {
        assert!(UserId::new("").is_err());
        assert_eq!(UserId::new("u-1").unwrap().as_str(), "u-1");
    }

    #[test]
    fn provider_id_parse_trims_and_rejects_blank() {
        assert_eq!(SubscriptionId::parse("  sub_123 ").unwrap().as_str(), "sub_123");
        assert!(SubscriptionId::parse("   ").is_err());
    }

    #[test]
    fn promotion_code_prefix_detection() {
        assert!(PromotionCodeId::has_prefix("promo_1AbC"));
        assert!(!PromotionCodeId::has_prefix("GIFT-ABC123"));
    }

    #[test]
    fn ids_display_inner_value() {
        let id = PriceId::new("price_42");
        assert_eq!(id.to_string(), "price_42");
    }
}
