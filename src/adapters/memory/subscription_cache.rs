//! In-memory subscription cache.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::errors::BillingError;
use crate::domain::foundation::{CustomerId, PromotionCodeId, SubscriptionId};
use crate::domain::subscription::Subscription;
use crate::ports::SubscriptionCache;

/// Subscription mirror keyed by id.
#[derive(Debug, Clone, Default)]
pub struct InMemorySubscriptionCache {
    subscriptions: Arc<RwLock<HashMap<SubscriptionId, Subscription>>>,
}

impl InMemorySubscriptionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached subscriptions
    pub async fn len(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn filtered(&self, keep: impl Fn(&Subscription) -> bool) -> Vec<Subscription> {
        let mut found: Vec<Subscription> = self
            .subscriptions
            .read()
            .await
            .values()
            .filter(|s| keep(s))
            .cloned()
            .collect();
        found.sort_by_key(|s| s.created);
        found
    }
}

#[async_trait]
impl SubscriptionCache for InMemorySubscriptionCache {
    async fn sync(&self, subscription: &Subscription) -> Result<(), BillingError> {
        self.subscriptions
            .write()
            .await
            .insert(subscription.id.clone(), subscription.clone());
        Ok(())
    }

    async fn get(&self, id: &SubscriptionId) -> Result<Option<Subscription>, BillingError> {
        Ok(self.subscriptions.read().await.get(id).cloned())
    }

    async fn find_by_promo_code(
        &self,
        code: &PromotionCodeId,
    ) -> Result<Vec<Subscription>, BillingError> {
        Ok(self
            .filtered(|s| s.meta().promo_code.as_ref() == Some(code))
            .await)
    }

    async fn find_by_gift_giver(
        &self,
        giver: &SubscriptionId,
    ) -> Result<Vec<Subscription>, BillingError> {
        Ok(self
            .filtered(|s| s.meta().gift_giver_subscription.as_ref() == Some(giver))
            .await)
    }

    async fn find_for_customer(
        &self,
        customer: &CustomerId,
    ) -> Result<Vec<Subscription>, BillingError> {
        Ok(self.filtered(|s| &s.customer == customer).await)
    }
}
