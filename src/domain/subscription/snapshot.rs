//! Subscription snapshot as returned by the billing provider.
//!
//! Snapshots are never mutated locally. Every change goes to the provider
//! and a fresh snapshot is fetched back.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::catalog::Price;
use crate::domain::foundation::{
    CustomerId, Metadata, ProductId, SubscriptionId, SubscriptionItemId,
};

use crate::domain::shipping::ZoneCode;

use super::role::SHIPPING_ZONE_KEY;
use super::{Discount, ItemRole, RoleTags, SubscriptionMetadata};

/// Subscription status reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Unpaid,
    Incomplete,
    IncompleteExpired,
    Canceled,
    Paused,
    Unknown,
}

impl SubscriptionStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "active" => SubscriptionStatus::Active,
            "trialing" => SubscriptionStatus::Trialing,
            "past_due" => SubscriptionStatus::PastDue,
            "unpaid" => SubscriptionStatus::Unpaid,
            "incomplete" => SubscriptionStatus::Incomplete,
            "incomplete_expired" => SubscriptionStatus::IncompleteExpired,
            "canceled" => SubscriptionStatus::Canceled,
            "paused" => SubscriptionStatus::Paused,
            _ => SubscriptionStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::IncompleteExpired => "incomplete_expired",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::Unknown => "unknown",
        }
    }

    /// No further changes are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Canceled | SubscriptionStatus::IncompleteExpired
        )
    }

    /// Counts as a current membership.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active | SubscriptionStatus::Trialing | SubscriptionStatus::PastDue
        )
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the subscription participates in the gift protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionKind {
    /// Ordinary self-paid membership.
    Membership,
    /// Paid by a giver; never a membership in its own right.
    GiftGiver,
    /// Created by redeeming a gift code.
    GiftRecipient,
}

impl SubscriptionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionKind::Membership => "membership",
            SubscriptionKind::GiftGiver => "gift giver",
            SubscriptionKind::GiftRecipient => "gift recipient",
        }
    }
}

impl fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One billing component of a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionItem {
    pub id: SubscriptionItemId,
    pub price: Price,
    pub quantity: u64,
    #[serde(default)]
    pub metadata: Metadata,
    pub product_name: Option<String>,
    #[serde(default)]
    pub product_metadata: Metadata,
}

impl SubscriptionItem {
    pub fn role(&self) -> ItemRole {
        ItemRole::from_tags(RoleTags {
            item: &self.metadata,
            price: &self.price.metadata,
            product: &self.product_metadata,
            product_name: self.product_name.as_deref(),
        })
    }

    pub fn product(&self) -> &ProductId {
        &self.price.product
    }

    /// Zone a shipping item was priced for, from the price or the item tags.
    pub fn shipping_zone(&self) -> Option<ZoneCode> {
        self.price
            .metadata
            .get(SHIPPING_ZONE_KEY)
            .or_else(|| self.metadata.get(SHIPPING_ZONE_KEY))
            .and_then(|code| ZoneCode::new(code).ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub customer: CustomerId,
    pub status: SubscriptionStatus,
    pub items: Vec<SubscriptionItem>,
    #[serde(default)]
    pub metadata: Metadata,
    pub discount: Option<Discount>,
    /// Unix timestamp.
    pub created: i64,
}

impl Subscription {
    pub fn meta(&self) -> SubscriptionMetadata {
        SubscriptionMetadata::from_metadata(&self.metadata)
    }

    pub fn kind(&self) -> SubscriptionKind {
        let meta = self.meta();
        if meta.gift_mode {
            SubscriptionKind::GiftGiver
        } else if meta.gift_giver_subscription.is_some() {
            SubscriptionKind::GiftRecipient
        } else {
            SubscriptionKind::Membership
        }
    }

    pub fn is_gift_mode(&self) -> bool {
        self.kind() == SubscriptionKind::GiftGiver
    }

    /// Live and not a gift the customer bought for somebody else.
    pub fn is_active_membership(&self) -> bool {
        self.status.is_live() && !self.is_gift_mode()
    }

    pub fn items_with_role(&self, role: ItemRole) -> impl Iterator<Item = &SubscriptionItem> {
        self.items.iter().filter(move |i| i.role() == role)
    }

    pub fn item_for(&self, role: ItemRole) -> Option<&SubscriptionItem> {
        self.items_with_role(role).next()
    }

    /// Product of the membership item.
    pub fn primary_product(&self) -> Option<&ProductId> {
        self.item_for(ItemRole::Membership).map(|i| i.product())
    }

    pub fn membership_price(&self) -> Option<&Price> {
        self.item_for(ItemRole::Membership).map(|i| &i.price)
    }

    /// Item count per role.
    pub fn role_counts(&self) -> BTreeMap<ItemRole, usize> {
        let mut counts = BTreeMap::new();
        for item in &self.items {
            *counts.entry(item.role()).or_insert(0) += 1;
        }
        counts
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn status_parse_and_terminal() {
        assert_eq!(SubscriptionStatus::parse("past_due"), SubscriptionStatus::PastDue);
        assert_eq!(SubscriptionStatus::parse("whatever"), SubscriptionStatus::Unknown);
        assert!(SubscriptionStatus::IncompleteExpired.is_terminal());
        assert!(!SubscriptionStatus::Active.is_terminal());
    }

    #[test]
    fn kind_follows_metadata() {
        let mut sub = subscription("sub_1", vec![]);
        assert_eq!(sub.kind(), SubscriptionKind::Membership);

        sub.metadata.insert("gift_giver_subscription".into(), "sub_0".into());
        assert_eq!(sub.kind(), SubscriptionKind::GiftRecipient);

        sub.metadata.insert("gift_mode".into(), "True".into());
        assert_eq!(sub.kind(), SubscriptionKind::GiftGiver);
        assert!(!sub.is_active_membership());
    }

    #[test]
    fn primary_product_comes_from_membership_item() {
        let sub = subscription(
            "sub_1",
            vec![
                item("si_ship", "prod_shipping", 300, ItemRole::Shipping),
                item("si_member", "prod_books", 1000, ItemRole::Membership),
            ],
        );
        assert_eq!(sub.primary_product().unwrap().as_str(), "prod_books");
        assert_eq!(sub.role_counts().get(&ItemRole::Shipping), Some(&1));
    }
}
