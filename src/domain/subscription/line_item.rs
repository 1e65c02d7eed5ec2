//! Line items to add to a subscription.
//!
//! Each line carries inline, one-off price data instead of a persisted price
//! record. Price changes are therefore always new prices and never edits.

use serde::{Deserialize, Serialize};

use crate::domain::catalog::{Money, Recurrence};
use crate::domain::foundation::{Metadata, ProductId};
use crate::domain::shipping::ZoneCode;

use super::role::{SHIPPING_KEY, SHIPPING_ZONE_KEY};
use super::{ItemRole, SubscriptionItem};

/// Inline price definition for a subscription item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceData {
    pub product: ProductId,
    pub unit_amount: Money,
    pub recurrence: Recurrence,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub role: ItemRole,
    pub price_data: PriceData,
    pub quantity: u64,
}

impl LineItem {
    pub fn membership(product: ProductId, amount: Money, recurrence: Recurrence) -> Self {
        Self::new(ItemRole::Membership, product, amount, recurrence, Metadata::new())
    }

    /// Shipping line for `zone`, zero-amount lines included.
    pub fn shipping(
        shipping_product: ProductId,
        fee: Money,
        recurrence: Recurrence,
        zone: &ZoneCode,
    ) -> Self {
        Self::new(
            ItemRole::Shipping,
            shipping_product,
            fee,
            recurrence,
            shipping_zone_metadata(zone),
        )
    }

    pub fn donation(donation_product: ProductId, amount: Money, recurrence: Recurrence) -> Self {
        Self::new(ItemRole::Donation, donation_product, amount, recurrence, Metadata::new())
    }

    /// Re-creates an existing item as one-off price data with the same
    /// product, amount and cadence.
    pub fn recreate(item: &SubscriptionItem) -> Self {
        let role = item.role();
        let metadata = match (role, item.shipping_zone()) {
            (ItemRole::Shipping, Some(zone)) => shipping_zone_metadata(&zone),
            _ => Metadata::new(),
        };
        Self::new(
            role,
            item.price.product.clone(),
            item.price.unit_amount.clone(),
            item.price.recurrence,
            metadata,
        )
        .with_quantity(item.quantity)
    }

    fn new(
        role: ItemRole,
        product: ProductId,
        unit_amount: Money,
        recurrence: Recurrence,
        metadata: Metadata,
    ) -> Self {
        Self {
            role,
            price_data: PriceData {
                product,
                unit_amount,
                recurrence,
                metadata,
            },
            quantity: 1,
        }
    }

    pub fn with_quantity(mut self, quantity: u64) -> Self {
        self.quantity = quantity;
        self
    }

    /// Metadata stamped on the subscription item: the price tags plus the
    /// role tags. Inline prices cannot carry metadata at the provider, so
    /// the item is where the zone survives.
    pub fn item_metadata(&self) -> Metadata {
        let mut metadata = self.price_data.metadata.clone();
        metadata.extend(self.role.item_tags());
        metadata
    }

    pub fn amount(&self) -> &Money {
        &self.price_data.unit_amount
    }

    /// Zone a shipping line was priced for.
    pub fn shipping_zone(&self) -> Option<ZoneCode> {
        self.price_data
            .metadata
            .get(SHIPPING_ZONE_KEY)
            .and_then(|code| ZoneCode::new(code).ok())
    }

    /// True when `item` already bills exactly what this line describes.
    pub fn is_satisfied_by(&self, item: &SubscriptionItem) -> bool {
        item.role() == self.role
            && item.product() == &self.price_data.product
            && item.price.unit_amount == self.price_data.unit_amount
            && item.price.recurrence == self.price_data.recurrence
            && item.quantity == self.quantity
            && (self.role != ItemRole::Shipping || item.shipping_zone() == self.shipping_zone())
    }
}

/// Price metadata for a shipping line.
pub fn shipping_zone_metadata(zone: &ZoneCode) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(SHIPPING_KEY.to_string(), "true".to_string());
    metadata.insert(SHIPPING_ZONE_KEY.to_string(), zone.to_string());
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::snapshot::fixtures::item;

    #[test]
    fn recreate_keeps_amount_cadence_and_zone() {
        let mut shipping = item("si_ship", "prod_shipping", 300, ItemRole::Shipping);
        shipping.metadata.clear();
        shipping.price.metadata = shipping_zone_metadata(&ZoneCode::new("EU").unwrap());
        shipping.quantity = 2;

        let line = LineItem::recreate(&shipping);
        assert_eq!(line.role, ItemRole::Shipping);
        assert_eq!(line.amount().amount(), 300);
        assert_eq!(line.quantity, 2);
        assert_eq!(line.price_data.metadata.get("shipping_zone").unwrap(), "EU");
        assert_eq!(line.item_metadata().get("role").unwrap(), "shipping");
    }

    #[test]
    fn membership_line_is_tagged_primary() {
        let line = LineItem::membership(
            ProductId::new("prod_books"),
            Money::new(1000, crate::domain::catalog::Currency::gbp()),
            Recurrence::monthly(),
        );
        assert_eq!(line.item_metadata().get("primary").unwrap(), "true");
    }

    #[test]
    fn satisfied_only_by_identical_billing() {
        let existing = item("si_1", "prod_books", 1000, ItemRole::Membership);
        let same = LineItem::recreate(&existing);
        assert!(same.is_satisfied_by(&existing));

        let dearer = LineItem::membership(
            ProductId::new("prod_books"),
            Money::new(1200, crate::domain::catalog::Currency::gbp()),
            Recurrence::monthly(),
        );
        assert!(!dearer.is_satisfied_by(&existing));
    }

    #[test]
    fn shipping_zone_change_is_not_satisfied() {
        let mut shipping = item("si_ship", "prod_shipping", 300, ItemRole::Shipping);
        shipping
            .metadata
            .extend(shipping_zone_metadata(&ZoneCode::new("UK").unwrap()));

        let line = LineItem::shipping(
            ProductId::new("prod_shipping"),
            Money::new(300, crate::domain::catalog::Currency::gbp()),
            Recurrence::monthly(),
            &ZoneCode::new("EU").unwrap(),
        );
        assert!(!line.is_satisfied_by(&shipping));
    }
}
