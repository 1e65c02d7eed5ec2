//! Coupons and the discounts they produce on subscriptions.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{CouponId, Metadata, ProductId, PromotionCodeId};

/// How long a coupon keeps applying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "duration")]
pub enum CouponDuration {
    Once,
    Repeating { months: u32 },
    Forever,
}

impl CouponDuration {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponDuration::Once => "once",
            CouponDuration::Repeating { .. } => "repeating",
            CouponDuration::Forever => "forever",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    pub name: Option<String>,
    pub percent_off: Option<u32>,
    pub duration: CouponDuration,
    /// Products the coupon is restricted to; empty means all.
    #[serde(default)]
    pub applies_to: Vec<ProductId>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Coupon {
    pub fn name_contains(&self, needle: &str) -> bool {
        self.name.as_deref().map_or(false, |n| n.contains(needle))
    }
}

/// A coupon applied to a subscription, optionally through a promotion code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    pub coupon: Coupon,
    pub promotion_code: Option<PromotionCodeId>,
}
