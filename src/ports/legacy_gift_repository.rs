//! Legacy gift records port.
//!
//! Gifts sold by the pre-redesign system were stored locally, not as
//! promotion codes. The migration job reads the pending ones and marks
//! each as migrated once its code exists at the provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::BillingError;
use crate::domain::foundation::{SubscriptionId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyGift {
    pub id: i64,
    /// Code printed on the gift card.
    pub gift_code: String,
    pub giving_subscription: SubscriptionId,
    pub giving_user: Option<UserId>,
    /// Set when the gift was redeemed in the old system.
    pub recipient: Option<UserId>,
}

#[async_trait]
pub trait LegacyGiftRepository: Send + Sync {
    async fn pending(&self) -> Result<Vec<LegacyGift>, BillingError>;

    async fn mark_migrated(&self, id: i64) -> Result<(), BillingError>;
}
