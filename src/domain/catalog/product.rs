//! Products and their prices, as supplied by catalog sync.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Metadata, PriceId, ProductId};

use super::{Money, PriceTier, Recurrence};

const REGULAR_NICKNAME: &str = "regular";
const SOLIDARITY_NICKNAME: &str = "solidarity";

/// Where a price record came from, recovered from its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceLineage {
    /// Ordinary catalog price.
    Catalog,
    /// Shipping fee for the named zone code.
    Shipping { zone: Option<String> },
    /// Re-created from a pre-redesign plan.
    Legacy { plan_id: String },
}

/// A priced offer for a product. Immutable once a live subscription refers to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub id: PriceId,
    pub product: ProductId,
    pub unit_amount: Money,
    pub recurrence: Recurrence,
    pub nickname: Option<String>,
    pub active: bool,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Price {
    pub fn lineage(&self) -> PriceLineage {
        if let Some(plan_id) = self.metadata.get("legacy_stripe_plan_id") {
            return PriceLineage::Legacy {
                plan_id: plan_id.clone(),
            };
        }
        if self.metadata.contains_key("shipping") || self.metadata.contains_key("shipping_zone") {
            return PriceLineage::Shipping {
                zone: self.metadata.get("shipping_zone").cloned(),
            };
        }
        PriceLineage::Catalog
    }

    /// Tier implied by the nickname; anything but `solidarity` is regular.
    pub fn tier(&self) -> PriceTier {
        if self.has_nickname(SOLIDARITY_NICKNAME) {
            PriceTier::Solidarity
        } else {
            PriceTier::Regular
        }
    }

    fn has_nickname(&self, nickname: &str) -> bool {
        self.nickname
            .as_deref()
            .map(|n| n.eq_ignore_ascii_case(nickname))
            .unwrap_or(false)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_price(f, &self.unit_amount, &self.recurrence)
    }
}

/// Renders `£12.00/month` or `£30.00 / every 3 months`.
pub(crate) fn write_price(
    f: &mut fmt::Formatter<'_>,
    amount: &Money,
    recurrence: &Recurrence,
) -> fmt::Result {
    if recurrence.interval_count == 1 {
        write!(f, "{}/{}", amount, recurrence)
    } else {
        write!(f, "{} / {}", amount, recurrence)
    }
}

/// A purchasable membership tier (or a shipping/donation carrier product).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub active: bool,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub prices: Vec<Price>,
}

impl Product {
    /// Pickable products are offered as plan choices at checkout.
    pub fn is_pickable(&self) -> bool {
        flag(&self.metadata, "pickable")
    }

    /// Shipping-only products carry shipping fee lines.
    pub fn is_shipping(&self) -> bool {
        flag(&self.metadata, "shipping") || self.name.to_lowercase().contains("shipping")
    }

    pub fn is_donation(&self) -> bool {
        flag(&self.metadata, "donation")
    }

    fn active_prices(&self) -> impl Iterator<Item = &Price> {
        self.prices.iter().filter(|p| p.active)
    }

    /// The default price: the single unnamed active price if there is exactly
    /// one, otherwise the cheapest active price.
    pub fn basic_price(&self) -> Option<&Price> {
        let mut unnamed = self.active_prices().filter(|p| p.nickname.is_none());
        if let (Some(only), None) = (unnamed.next(), unnamed.next()) {
            return Some(only);
        }
        self.cheapest()
    }

    /// Price nicknamed `regular`, else the cheapest.
    pub fn regular_price(&self) -> Option<&Price> {
        self.active_prices()
            .find(|p| p.has_nickname(REGULAR_NICKNAME))
            .or_else(|| self.cheapest())
    }

    /// Price nicknamed `solidarity`, else the most expensive.
    pub fn solidarity_price(&self) -> Option<&Price> {
        self.active_prices()
            .find(|p| p.has_nickname(SOLIDARITY_NICKNAME))
            .or_else(|| {
                self.active_prices()
                    .max_by(|a, b| {
                        a.unit_amount
                            .amount()
                            .cmp(&b.unit_amount.amount())
                            .then_with(|| b.id.cmp(&a.id))
                    })
            })
    }

    /// True when the regular and solidarity prices differ.
    pub fn has_tiered_pricing(&self) -> bool {
        match (self.regular_price(), self.solidarity_price()) {
            (Some(regular), Some(solidarity)) => regular.id != solidarity.id,
            _ => false,
        }
    }

    fn cheapest(&self) -> Option<&Price> {
        self.active_prices().min_by(|a, b| {
            a.unit_amount
                .amount()
                .cmp(&b.unit_amount.amount())
                .then_with(|| a.id.cmp(&b.id))
        })
    }
}

fn flag(metadata: &Metadata, key: &str) -> bool {
    metadata
        .get(key)
        .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "" | "false" | "0"))
        .unwrap_or(false)
}
