//! Semantic role of a subscription item.
//!
//! The provider only stores free-form metadata. This module is the one
//! place that turns those keys into an `ItemRole` and back.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Metadata;

pub(crate) const ROLE_KEY: &str = "role";
pub(crate) const PRIMARY_KEY: &str = "primary";
pub(crate) const SHIPPING_KEY: &str = "shipping";
pub(crate) const SHIPPING_ZONE_KEY: &str = "shipping_zone";
pub(crate) const DONATION_KEY: &str = "donation";

/// What a subscription item pays for. At most one live item per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemRole {
    Membership,
    Shipping,
    Donation,
}

impl ItemRole {
    pub const ALL: [ItemRole; 3] = [ItemRole::Membership, ItemRole::Shipping, ItemRole::Donation];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemRole::Membership => "membership",
            ItemRole::Shipping => "shipping",
            ItemRole::Donation => "donation",
        }
    }

    /// Recovers the role from the raw tags the provider returns.
    ///
    /// Explicit item tags win. Older items carry only price or product
    /// markers, so those are read next; anything untagged is membership.
    /// Some older shipping items carry a stray `primary` marker, so it never
    /// overrides a shipping price.
    pub fn from_tags(tags: RoleTags<'_>) -> Self {
        match tags.item.get(ROLE_KEY).map(String::as_str) {
            Some("membership") => return ItemRole::Membership,
            Some("shipping") => return ItemRole::Shipping,
            Some("donation") => return ItemRole::Donation,
            _ => {}
        }
        if tags.price.contains_key(SHIPPING_KEY) || tags.price.contains_key(SHIPPING_ZONE_KEY) {
            return ItemRole::Shipping;
        }
        if tags.product.contains_key(DONATION_KEY) || tags.price.contains_key(DONATION_KEY) {
            return ItemRole::Donation;
        }
        if tags.product.contains_key(SHIPPING_KEY)
            || tags
                .product_name
                .map_or(false, |n| n.to_lowercase().contains("shipping"))
        {
            return ItemRole::Shipping;
        }
        ItemRole::Membership
    }

    /// Metadata written on a new item of this role.
    pub fn item_tags(&self) -> Metadata {
        let mut tags = Metadata::new();
        tags.insert(ROLE_KEY.to_string(), self.as_str().to_string());
        if *self == ItemRole::Membership {
            tags.insert(PRIMARY_KEY.to_string(), "true".to_string());
        }
        tags
    }
}

impl fmt::Display for ItemRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw metadata sources consulted when recovering an item's role.
#[derive(Debug, Clone, Copy)]
pub struct RoleTags<'a> {
    pub item: &'a Metadata,
    pub price: &'a Metadata,
    pub product: &'a Metadata,
    pub product_name: Option<&'a str>,
}
