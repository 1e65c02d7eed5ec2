//! HandleBillingWebhookHandler - Command handler for billing provider webhooks.
//!
//! Events are delivered at least once. Each event id is recorded after
//! processing; a redelivery of an event that did not fail is acknowledged
//! without touching the provider again.

use std::sync::Arc;

use crate::application::handlers::gift::{CascadeGiftCancellationHandler, CascadeResult};
use crate::domain::errors::BillingError;
use crate::domain::subscription::{Subscription, SubscriptionKind};
use crate::ports::{
    BillingProvider, SubscriptionCache, WebhookEvent, WebhookEventRecord, WebhookEventRepository,
    WebhookEventType,
};

/// Command to handle a billing webhook.
#[derive(Debug, Clone)]
pub struct HandleBillingWebhookCommand {
    /// Raw webhook payload.
    pub payload: Vec<u8>,
    /// Webhook signature header.
    pub signature: String,
}

/// Result of webhook processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleBillingWebhookResult {
    /// Subscription re-read from the provider and cached.
    Synced { subscription_id: String },
    /// Subscription deleted; any gift recipients were canceled with it.
    Deleted {
        subscription_id: String,
        cascade: CascadeResult,
    },
    /// Already processed.
    Duplicate,
    /// Event ignored (unknown or unsupported type).
    Ignored,
}

pub struct HandleBillingWebhookHandler {
    provider: Arc<dyn BillingProvider>,
    cache: Arc<dyn SubscriptionCache>,
    events: Arc<dyn WebhookEventRepository>,
    cascade: CascadeGiftCancellationHandler,
}

impl HandleBillingWebhookHandler {
    pub fn new(
        provider: Arc<dyn BillingProvider>,
        cache: Arc<dyn SubscriptionCache>,
        events: Arc<dyn WebhookEventRepository>,
    ) -> Self {
        Self {
            cascade: CascadeGiftCancellationHandler::new(provider.clone(), cache.clone()),
            provider,
            cache,
            events,
        }
    }

    pub async fn handle(
        &self,
        cmd: HandleBillingWebhookCommand,
    ) -> Result<HandleBillingWebhookResult, BillingError> {
        // 1. Verify signature and parse
        let event = self
            .provider
            .verify_webhook(&cmd.payload, &cmd.signature)
            .await?;
        let event_type = event_type_name(&event.event_type);

        // 2. Skip redeliveries
        if let Some(existing) = self.events.find_by_event_id(&event.id).await? {
            if !existing.is_failure() {
                tracing::debug!(event_id = %event.id, "Webhook already processed");
                return Ok(HandleBillingWebhookResult::Duplicate);
            }
        }

        // 3. Process and record the outcome
        let outcome = self.process(&event).await;
        let record = match &outcome {
            Ok(HandleBillingWebhookResult::Ignored) => {
                WebhookEventRecord::ignored(&event.id, &event_type, "unhandled event type")
            }
            Ok(_) => WebhookEventRecord::success(&event.id, &event_type),
            Err(err) => {
                tracing::warn!(
                    event_id = %event.id,
                    event_type = %event_type,
                    error = %err,
                    "Webhook processing failed"
                );
                WebhookEventRecord::failed(&event.id, &event_type, err.to_string())
            }
        };
        self.events.save(record).await?;
        outcome
    }

    async fn process(
        &self,
        event: &WebhookEvent,
    ) -> Result<HandleBillingWebhookResult, BillingError> {
        match &event.event_type {
            WebhookEventType::SubscriptionCreated | WebhookEventType::SubscriptionUpdated => {
                let payload = payload_subscription(event)?;
                // The payload may be stale by the time it arrives
                let current = self
                    .provider
                    .retrieve_subscription(&payload.id)
                    .await?
                    .unwrap_or_else(|| payload.clone());
                self.cache.sync(&current).await?;
                tracing::info!(
                    event_id = %event.id,
                    subscription_id = %current.id,
                    status = %current.status,
                    "Subscription synced from webhook"
                );
                Ok(HandleBillingWebhookResult::Synced {
                    subscription_id: current.id.to_string(),
                })
            }
            WebhookEventType::SubscriptionDeleted => {
                let payload = payload_subscription(event)?;
                self.cache.sync(payload).await?;
                let cascade = if payload.kind() == SubscriptionKind::GiftGiver {
                    self.cascade.handle(&payload.id).await?
                } else {
                    CascadeResult::default()
                };
                tracing::info!(
                    event_id = %event.id,
                    subscription_id = %payload.id,
                    recipients_canceled = cascade.canceled.len(),
                    "Subscription deleted"
                );
                Ok(HandleBillingWebhookResult::Deleted {
                    subscription_id: payload.id.to_string(),
                    cascade,
                })
            }
            WebhookEventType::Unknown(raw) => {
                tracing::debug!(event_id = %event.id, event_type = %raw, "Webhook ignored");
                Ok(HandleBillingWebhookResult::Ignored)
            }
        }
    }
}

fn payload_subscription(event: &WebhookEvent) -> Result<&Subscription, BillingError> {
    event
        .subscription
        .as_ref()
        .ok_or_else(|| BillingError::provider(format!("event {} has no subscription", event.id)))
}

fn event_type_name(event_type: &WebhookEventType) -> String {
    match event_type {
        WebhookEventType::SubscriptionCreated => "customer.subscription.created".to_string(),
        WebhookEventType::SubscriptionUpdated => "customer.subscription.updated".to_string(),
        WebhookEventType::SubscriptionDeleted => "customer.subscription.deleted".to_string(),
        WebhookEventType::Unknown(raw) => raw.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryWebhookEventRepository;
    use crate::application::handlers::gift::{
        ConfigureGiver, GiftCodeIssuer, GiftReference, GiftSettings, RedeemGiftCommand,
        RedeemGiftHandler,
    };
    use crate::application::handlers::test_support::Harness;
    use crate::domain::foundation::Metadata;
    use crate::domain::subscription::SubscriptionStatus;

    fn handler(h: &Harness, events: &InMemoryWebhookEventRepository) -> HandleBillingWebhookHandler {
        HandleBillingWebhookHandler::new(
            h.provider(),
            Arc::new(h.cache.clone()),
            Arc::new(events.clone()),
        )
    }

    fn command() -> HandleBillingWebhookCommand {
        HandleBillingWebhookCommand {
            payload: b"{}".to_vec(),
            signature: "t=1,v1=abc".into(),
        }
    }

    fn event(id: &str, event_type: WebhookEventType, subscription: Option<Subscription>) -> WebhookEvent {
        WebhookEvent {
            id: id.into(),
            event_type,
            subscription,
            created_at: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn updated_event_syncs_current_state() {
        let h = Harness::new();
        let events = InMemoryWebhookEventRepository::new();
        let (_, customer) = h.member("reader").await;
        let sub = h.membership(&customer, 1000).await;
        h.provider.set_subscription_status(&sub.id, SubscriptionStatus::PastDue);
        h.provider.set_webhook_event(event(
            "evt_1",
            WebhookEventType::SubscriptionUpdated,
            Some(sub.clone()),
        ));

        let result = handler(&h, &events).handle(command()).await.unwrap();

        assert_eq!(
            result,
            HandleBillingWebhookResult::Synced { subscription_id: sub.id.to_string() }
        );
        let cached = h.cache.get(&sub.id).await.unwrap().unwrap();
        assert_eq!(cached.status, SubscriptionStatus::PastDue);
        let record = events.find_by_event_id("evt_1").await.unwrap().unwrap();
        assert_eq!(record.result, "success");
    }

    #[tokio::test]
    async fn redelivered_event_is_duplicate() {
        let h = Harness::new();
        let events = InMemoryWebhookEventRepository::new();
        let (_, customer) = h.member("reader").await;
        let sub = h.membership(&customer, 1000).await;
        let handler = handler(&h, &events);
        let delivery = event("evt_1", WebhookEventType::SubscriptionCreated, Some(sub));

        h.provider.set_webhook_event(delivery.clone());
        handler.handle(command()).await.unwrap();
        h.provider.clear_calls();
        h.provider.set_webhook_event(delivery);
        let second = handler.handle(command()).await.unwrap();

        assert_eq!(second, HandleBillingWebhookResult::Duplicate);
        assert!(!h.provider.was_called("retrieve_subscription"));
    }

    #[tokio::test]
    async fn deleted_giver_cancels_recipient() {
        let h = Harness::new();
        let events = InMemoryWebhookEventRepository::new();
        let (_, customer) = h.member("giver").await;
        let sub = h.membership(&customer, 1000).await;
        let (code, _) =
            GiftCodeIssuer::new(h.provider(), Arc::new(h.cache.clone()), GiftSettings::default())
                .configure_giver(&sub.id, ConfigureGiver::default())
                .await
                .unwrap();
        let (friend, _) = h.member("friend").await;
        let recipient = RedeemGiftHandler::new(
            h.provider(),
            Arc::new(h.cache.clone()),
            Arc::new(h.directory.clone()),
        )
        .handle(RedeemGiftCommand {
            gift: GiftReference::Code(code.code),
            recipient: friend,
            metadata: Metadata::new(),
        })
        .await
        .unwrap()
        .subscription;

        let canceled = h.provider.cancel_subscription(&sub.id).await.unwrap();
        h.provider.set_webhook_event(event(
            "evt_del",
            WebhookEventType::SubscriptionDeleted,
            Some(canceled),
        ));

        let result = handler(&h, &events).handle(command()).await.unwrap();

        match result {
            HandleBillingWebhookResult::Deleted { cascade, .. } => {
                assert_eq!(cascade.canceled, vec![recipient.id.clone()]);
            }
            other => panic!("expected Deleted, got {:?}", other),
        }
        assert!(h
            .provider
            .subscription(&recipient.id)
            .unwrap()
            .status
            .is_terminal());
    }

    #[tokio::test]
    async fn unknown_event_is_recorded_as_ignored() {
        let h = Harness::new();
        let events = InMemoryWebhookEventRepository::new();
        h.provider.set_webhook_event(event(
            "evt_inv",
            WebhookEventType::Unknown("invoice.paid".into()),
            None,
        ));

        let result = handler(&h, &events).handle(command()).await.unwrap();

        assert_eq!(result, HandleBillingWebhookResult::Ignored);
        let record = events.find_by_event_id("evt_inv").await.unwrap().unwrap();
        assert_eq!(record.result, "ignored");
        assert_eq!(record.event_type, "invoice.paid");
    }

    #[tokio::test]
    async fn failed_event_is_retried_on_redelivery() {
        let h = Harness::new();
        let events = InMemoryWebhookEventRepository::new();
        let (_, customer) = h.member("reader").await;
        let sub = h.membership(&customer, 1000).await;
        let handler = handler(&h, &events);
        let delivery = event("evt_1", WebhookEventType::SubscriptionUpdated, Some(sub));

        h.provider
            .set_method_error("retrieve_subscription", crate::ports::PaymentError::network("down"));
        h.provider.set_webhook_event(delivery.clone());
        assert!(handler.handle(command()).await.is_err());
        assert!(events.find_by_event_id("evt_1").await.unwrap().unwrap().is_failure());

        h.provider.clear_errors();
        h.provider.set_webhook_event(delivery);
        let retried = handler.handle(command()).await.unwrap();

        assert!(matches!(retried, HandleBillingWebhookResult::Synced { .. }));
    }

    #[tokio::test]
    async fn bad_signature_is_rejected_without_record() {
        let h = Harness::with_provider(crate::adapters::MockBillingProvider::rejecting_webhooks());
        let events = InMemoryWebhookEventRepository::new();

        let result = handler(&h, &events).handle(command()).await;

        assert!(matches!(result, Err(BillingError::Provider { retryable: false, .. })));
        assert_eq!(events.count().await, 0);
    }
}
