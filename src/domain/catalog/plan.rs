//! Membership plans and their priced offers.
//!
//! A plan is the content-managed description of a membership (title,
//! deliveries per year). Each `PlanPrice` is one billing option for it and
//! knows which products it can be bought for and which shipping zones it
//! ships to for free.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::errors::BillingError;
use crate::domain::foundation::{PlanId, PlanPriceId, ProductId};
use crate::domain::shipping::{ShippingZone, ZoneCode};

use super::{Money, Recurrence};

/// Pricing tier of a plan price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceTier {
    #[default]
    Regular,
    Solidarity,
}

/// One billing option of a membership plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanPrice {
    pub id: PlanPriceId,
    pub amount: Money,
    pub recurrence: Recurrence,
    /// Products this price can be bought for.
    pub products: Vec<ProductId>,
    #[serde(default)]
    pub free_shipping_zones: Vec<ZoneCode>,
    #[serde(default)]
    pub tier: PriceTier,
}

impl PlanPrice {
    pub fn ships_free_to(&self, zone: &ZoneCode) -> bool {
        self.free_shipping_zones.iter().any(|z| z == zone)
    }

    /// Per-period shipping fee for `zone`.
    ///
    /// The zone rate is per delivery; it scales by deliveries per billing
    /// period, which may be fractional. Rounding happens once, on the final
    /// amount.
    pub fn shipping_fee(&self, deliveries_per_year: u32, zone: &ShippingZone) -> Money {
        if self.ships_free_to(&zone.code) {
            return Money::zero(zone.rate.currency().clone());
        }
        // deliveries per period = deliveries_per_year * months_per_period / 12
        let deliveries = Decimal::from(deliveries_per_year) * self.recurrence.months_per_period();
        zone.rate.prorate(deliveries, Decimal::from(12))
    }

    /// Picks the product to bill. The caller's choice wins but must be one of
    /// this price's products; without a choice there must be exactly one.
    pub fn resolve_product(&self, requested: Option<&ProductId>) -> Result<ProductId, BillingError> {
        match requested {
            Some(product) if self.products.contains(product) => Ok(product.clone()),
            None if self.products.len() == 1 => Ok(self.products[0].clone()),
            _ => Err(BillingError::AmbiguousProduct {
                price_id: self.id.to_string(),
                candidates: self.products.clone(),
            }),
        }
    }
}

impl std::fmt::Display for PlanPrice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        super::product::write_price(f, &self.amount, &self.recurrence)
    }
}

/// A membership plan as offered at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipPlan {
    pub id: PlanId,
    pub title: String,
    pub deliveries_per_year: u32,
    pub prices: Vec<PlanPrice>,
}

impl MembershipPlan {
    pub fn price(&self, id: &PlanPriceId) -> Option<&PlanPrice> {
        self.prices.iter().find(|p| &p.id == id)
    }

    /// Cheapest regular-tier price; the default offer for gifts.
    pub fn basic_price(&self) -> Option<&PlanPrice> {
        let cheapest = |tier: Option<PriceTier>| {
            self.prices
                .iter()
                .filter(|p| tier.map_or(true, |t| p.tier == t))
                .min_by_key(|p| p.amount.amount())
        };
        cheapest(Some(PriceTier::Regular)).or_else(|| cheapest(None))
    }

    /// Current price of `tier` billed on `recurrence`.
    pub fn price_for(&self, recurrence: &Recurrence, tier: PriceTier) -> Option<&PlanPrice> {
        self.prices
            .iter()
            .find(|p| &p.recurrence == recurrence && p.tier == tier)
    }

    pub fn shipping_fee(&self, price: &PlanPrice, zone: &ShippingZone) -> Money {
        price.shipping_fee(self.deliveries_per_year, zone)
    }
}
