//! Local subscription cache port.
//!
//! A read-through mirror of the provider's subscriptions. Writers call
//! `sync` with a freshly retrieved snapshot after every mutation; readers
//! use it for lookups the provider cannot answer directly (reverse links
//! from a promotion code or a giver subscription).
//!
//! The cache is never consulted when composing a mutation. The mutation
//! engine always re-fetches from the provider first.

use async_trait::async_trait;

use crate::domain::errors::BillingError;
use crate::domain::foundation::{CustomerId, PromotionCodeId, SubscriptionId};
use crate::domain::subscription::Subscription;

#[async_trait]
pub trait SubscriptionCache: Send + Sync {
    /// Inserts or replaces the cached copy of `subscription`.
    async fn sync(&self, subscription: &Subscription) -> Result<(), BillingError>;

    async fn get(&self, id: &SubscriptionId) -> Result<Option<Subscription>, BillingError>;

    /// Subscriptions whose `promo_code` link equals `code`.
    ///
    /// Both the giver and (after redemption) the recipient carry the link.
    async fn find_by_promo_code(
        &self,
        code: &PromotionCodeId,
    ) -> Result<Vec<Subscription>, BillingError>;

    /// Recipient subscriptions created from `giver`.
    async fn find_by_gift_giver(
        &self,
        giver: &SubscriptionId,
    ) -> Result<Vec<Subscription>, BillingError>;

    async fn find_for_customer(
        &self,
        customer: &CustomerId,
    ) -> Result<Vec<Subscription>, BillingError>;
}
