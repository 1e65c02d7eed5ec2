//! Subscription module - snapshots, item roles and line-item composition.
//!
//! # Invariant
//!
//! A subscription holds at most one live item per `ItemRole`. Adding an item
//! of a role that already exists replaces the old one in the same mutation.

mod composer;
mod discount;
mod line_item;
mod metadata;
mod role;
mod snapshot;

pub use composer::{CarrierProducts, ComposeRequest, LineItemComposer};
pub use discount::{Coupon, CouponDuration, Discount};
pub use line_item::{shipping_zone_metadata, LineItem, PriceData};
pub use metadata::{LegacyProvenance, SubscriptionMetadata};
pub use role::{ItemRole, RoleTags};
pub use snapshot::{Subscription, SubscriptionItem, SubscriptionKind, SubscriptionStatus};

#[cfg(test)]
pub(crate) use snapshot::fixtures;
