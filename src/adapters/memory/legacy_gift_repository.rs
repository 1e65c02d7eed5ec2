//! In-memory legacy gift records.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::errors::BillingError;
use crate::domain::foundation::ValidationError;
use crate::ports::{LegacyGift, LegacyGiftRepository};

#[derive(Debug, Clone, Default)]
pub struct InMemoryLegacyGiftRepository {
    /// Gift record and its migrated flag, by id.
    gifts: Arc<RwLock<BTreeMap<i64, (LegacyGift, bool)>>>,
}

impl InMemoryLegacyGiftRepository {
    pub fn new(gifts: Vec<LegacyGift>) -> Self {
        Self {
            gifts: Arc::new(RwLock::new(
                gifts.into_iter().map(|g| (g.id, (g, false))).collect(),
            )),
        }
    }

    pub async fn is_migrated(&self, id: i64) -> bool {
        self.gifts
            .read()
            .await
            .get(&id)
            .map_or(false, |(_, migrated)| *migrated)
    }
}

#[async_trait]
impl LegacyGiftRepository for InMemoryLegacyGiftRepository {
    async fn pending(&self) -> Result<Vec<LegacyGift>, BillingError> {
        Ok(self
            .gifts
            .read()
            .await
            .values()
            .filter(|(_, migrated)| !migrated)
            .map(|(gift, _)| gift.clone())
            .collect())
    }

    async fn mark_migrated(&self, id: i64) -> Result<(), BillingError> {
        let mut gifts = self.gifts.write().await;
        let (_, migrated) = gifts.get_mut(&id).ok_or_else(|| {
            ValidationError::invalid_format("legacy_gift_id", format!("unknown gift {}", id))
        })?;
        *migrated = true;
        Ok(())
    }
}
