//! CascadeGiftCancellationHandler - cancels recipients of a canceled gift.
//!
//! Runs on giver cancellation webhooks, which may arrive more than once.
//! Recipients already canceled are counted and left alone.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::domain::errors::BillingError;
use crate::domain::foundation::SubscriptionId;
use crate::domain::subscription::SubscriptionKind;
use crate::ports::{BillingProvider, SubscriptionCache};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CascadeResult {
    pub canceled: Vec<SubscriptionId>,
    pub already_terminal: Vec<SubscriptionId>,
}

pub struct CascadeGiftCancellationHandler {
    provider: Arc<dyn BillingProvider>,
    cache: Arc<dyn SubscriptionCache>,
}

impl CascadeGiftCancellationHandler {
    pub fn new(provider: Arc<dyn BillingProvider>, cache: Arc<dyn SubscriptionCache>) -> Self {
        Self { provider, cache }
    }

    pub async fn handle(&self, giver_id: &SubscriptionId) -> Result<CascadeResult, BillingError> {
        let giver = self
            .provider
            .retrieve_subscription(giver_id)
            .await?
            .ok_or_else(|| BillingError::SubscriptionNotFound(giver_id.clone()))?;
        self.cache.sync(&giver).await?;

        if giver.kind() != SubscriptionKind::GiftGiver || !giver.status.is_terminal() {
            tracing::debug!(
                subscription_id = %giver.id,
                kind = %giver.kind(),
                status = %giver.status,
                "No gift cascade"
            );
            return Ok(CascadeResult::default());
        }

        let meta = giver.meta();
        let mut recipients: BTreeSet<SubscriptionId> =
            meta.gift_recipient_subscription.into_iter().collect();
        recipients.extend(
            self.cache
                .find_by_gift_giver(&giver.id)
                .await?
                .into_iter()
                .map(|s| s.id),
        );
        if let Some(code) = &meta.promo_code {
            recipients.extend(
                self.cache
                    .find_by_promo_code(code)
                    .await?
                    .into_iter()
                    .filter(|s| s.kind() == SubscriptionKind::GiftRecipient)
                    .map(|s| s.id),
            );
        }

        let mut result = CascadeResult::default();
        for id in recipients {
            let Some(recipient) = self.provider.retrieve_subscription(&id).await? else {
                tracing::warn!(
                    subscription_id = %id,
                    giver_subscription_id = %giver.id,
                    "Linked recipient no longer exists"
                );
                continue;
            };
            if recipient.status.is_terminal() {
                self.cache.sync(&recipient).await?;
                result.already_terminal.push(id);
                continue;
            }

            let canceled = self.provider.cancel_subscription(&id).await?;
            self.cache.sync(&canceled).await?;
            tracing::info!(
                subscription_id = %id,
                giver_subscription_id = %giver.id,
                "Gift recipient canceled with its giver"
            );
            result.canceled.push(id);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::gift::{
        ConfigureGiver, GiftCodeIssuer, GiftReference, GiftSettings, RedeemGiftCommand,
        RedeemGiftHandler,
    };
    use crate::application::handlers::test_support::Harness;
    use crate::domain::foundation::Metadata;
    use crate::domain::subscription::{Subscription, SubscriptionStatus};

    fn handler(h: &Harness) -> CascadeGiftCancellationHandler {
        CascadeGiftCancellationHandler::new(h.provider(), Arc::new(h.cache.clone()))
    }

    /// A redeemed gift: (giver, recipient).
    async fn redeemed(h: &Harness) -> (Subscription, Subscription) {
        let (_, customer) = h.member("giver").await;
        let sub = h.membership(&customer, 1000).await;
        let (code, giver) =
            GiftCodeIssuer::new(h.provider(), Arc::new(h.cache.clone()), GiftSettings::default())
                .configure_giver(&sub.id, ConfigureGiver::default())
                .await
                .unwrap();
        let (recipient, _) = h.member("friend").await;
        let redeemed = RedeemGiftHandler::new(
            h.provider(),
            Arc::new(h.cache.clone()),
            Arc::new(h.directory.clone()),
        )
        .handle(RedeemGiftCommand {
            gift: GiftReference::Code(code.code),
            recipient,
            metadata: Metadata::new(),
        })
        .await
        .unwrap();
        (giver, redeemed.subscription)
    }

    #[tokio::test]
    async fn canceling_giver_cancels_recipient_once() {
        let h = Harness::new();
        let (giver, recipient) = redeemed(&h).await;
        h.provider.set_subscription_status(&giver.id, SubscriptionStatus::Canceled);
        let handler = handler(&h);

        let first = handler.handle(&giver.id).await.unwrap();
        let second = handler.handle(&giver.id).await.unwrap();

        assert_eq!(first.canceled, vec![recipient.id.clone()]);
        assert_eq!(second.canceled, Vec::<SubscriptionId>::new());
        assert_eq!(second.already_terminal, vec![recipient.id.clone()]);
        assert_eq!(
            h.provider.subscription(&recipient.id).unwrap().status,
            SubscriptionStatus::Canceled
        );
        assert_eq!(h.provider.call_count("cancel_subscription"), 1);
    }

    #[tokio::test]
    async fn live_giver_cascades_nothing() {
        let h = Harness::new();
        let (giver, recipient) = redeemed(&h).await;

        let result = handler(&h).handle(&giver.id).await.unwrap();

        assert_eq!(result, CascadeResult::default());
        assert!(h.provider.subscription(&recipient.id).unwrap().status.is_live());
    }

    #[tokio::test]
    async fn ordinary_membership_cascades_nothing() {
        let h = Harness::new();
        let (_, customer) = h.member("reader").await;
        let sub = h.membership(&customer, 1000).await;
        h.provider.set_subscription_status(&sub.id, SubscriptionStatus::Canceled);

        let result = handler(&h).handle(&sub.id).await.unwrap();

        assert_eq!(result, CascadeResult::default());
        assert!(!h.provider.was_called("cancel_subscription"));
    }

    #[tokio::test]
    async fn recipient_found_through_back_link_without_forward_link() {
        let h = Harness::new();
        let (giver, recipient) = redeemed(&h).await;
        h.provider
            .update_subscription_metadata(&giver.id, {
                let mut patch = Metadata::new();
                patch.insert("gift_recipient_subscription".into(), String::new());
                patch
            })
            .await
            .unwrap();
        h.provider.set_subscription_status(&giver.id, SubscriptionStatus::Canceled);

        let result = handler(&h).handle(&giver.id).await.unwrap();

        assert_eq!(result.canceled, vec![recipient.id]);
    }
}
