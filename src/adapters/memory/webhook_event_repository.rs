//! In-memory webhook event repository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::errors::BillingError;
use crate::ports::{SaveResult, WebhookEventRecord, WebhookEventRepository};

#[derive(Debug, Clone, Default)]
pub struct InMemoryWebhookEventRepository {
    events: Arc<RwLock<HashMap<String, WebhookEventRecord>>>,
}

impl InMemoryWebhookEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.events.read().await.len()
    }
}

#[async_trait]
impl WebhookEventRepository for InMemoryWebhookEventRepository {
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, BillingError> {
        Ok(self.events.read().await.get(event_id).cloned())
    }

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, BillingError> {
        let mut events = self.events.write().await;
        match events.get(&record.event_id) {
            Some(existing) if !existing.is_failure() => Ok(SaveResult::AlreadyExists),
            _ => {
                events.insert(record.event_id.clone(), record);
                Ok(SaveResult::Inserted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_save_reports_existing() {
        let repo = InMemoryWebhookEventRepository::new();
        let record = WebhookEventRecord::success("evt_1", "customer.subscription.updated");

        assert_eq!(repo.save(record.clone()).await.unwrap(), SaveResult::Inserted);
        assert_eq!(repo.save(record).await.unwrap(), SaveResult::AlreadyExists);
        assert_eq!(repo.count().await, 1);
    }

    #[tokio::test]
    async fn failed_record_can_be_retried() {
        let repo = InMemoryWebhookEventRepository::new();
        repo.save(WebhookEventRecord::failed("evt_1", "t", "boom"))
            .await
            .unwrap();

        let retry = repo
            .save(WebhookEventRecord::success("evt_1", "t"))
            .await
            .unwrap();
        assert_eq!(retry, SaveResult::Inserted);
        let stored = repo.find_by_event_id("evt_1").await.unwrap().unwrap();
        assert!(!stored.is_failure());
    }
}
