//! RedeemGiftHandler - Command handler for gift redemption.
//!
//! The recipient subscription is rebuilt from the giver's items as they
//! are now, so a product migrated since purchase redeems as the new
//! product. Donations stay with the giver.

use std::sync::Arc;

use crate::domain::errors::{BillingError, UnredeemableReason};
use crate::domain::foundation::{Metadata, SubscriptionId, UserId};
use crate::domain::gift::PromotionCode;
use crate::domain::subscription::{ItemRole, LineItem, Subscription, SubscriptionMetadata};
use crate::ports::{
    BillingProvider, CreateSubscriptionRequest, CustomerDirectory, PaymentBehavior,
    SubscriptionCache, SubscriptionFilter,
};

use super::{ensure_customer, GiftLookup};

/// What the recipient presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GiftReference {
    /// Customer-facing code or `promo_` id.
    Code(String),
    /// The giver subscription itself, for admin redemptions.
    Giver(SubscriptionId),
}

#[derive(Debug, Clone)]
pub struct RedeemGiftCommand {
    pub gift: GiftReference,
    pub recipient: UserId,
    /// Extra keys for the recipient subscription.
    pub metadata: Metadata,
}

#[derive(Debug, Clone)]
pub struct RedeemGiftResult {
    pub subscription: Subscription,
    pub giver_subscription_id: SubscriptionId,
    pub promotion_code: PromotionCode,
}

pub struct RedeemGiftHandler {
    provider: Arc<dyn BillingProvider>,
    cache: Arc<dyn SubscriptionCache>,
    directory: Arc<dyn CustomerDirectory>,
    lookup: GiftLookup,
}

impl RedeemGiftHandler {
    pub fn new(
        provider: Arc<dyn BillingProvider>,
        cache: Arc<dyn SubscriptionCache>,
        directory: Arc<dyn CustomerDirectory>,
    ) -> Self {
        Self {
            lookup: GiftLookup::new(provider.clone(), cache.clone()),
            provider,
            cache,
            directory,
        }
    }

    pub async fn handle(&self, cmd: RedeemGiftCommand) -> Result<RedeemGiftResult, BillingError> {
        let (code, giver) = match &cmd.gift {
            GiftReference::Code(input) => self.lookup.redeemable_code(input).await?,
            GiftReference::Giver(id) => {
                let giver = self
                    .provider
                    .retrieve_subscription(id)
                    .await?
                    .ok_or_else(|| BillingError::SubscriptionNotFound(id.clone()))?;
                let promo = giver.meta().promo_code.ok_or_else(|| {
                    BillingError::unredeemable(id.as_str(), UnredeemableReason::NotFound)
                })?;
                self.lookup.redeemable_code(promo.as_str()).await?
            }
        };

        let customer = ensure_customer(
            self.directory.as_ref(),
            self.provider.as_ref(),
            &cmd.recipient,
        )
        .await?;
        let existing = self
            .provider
            .list_subscriptions(SubscriptionFilter {
                customer: Some(customer.clone()),
                ..SubscriptionFilter::default()
            })
            .await?;
        if existing.iter().any(Subscription::is_active_membership) {
            return Err(BillingError::AlreadyMember {
                user_id: cmd.recipient,
            });
        }

        let items: Vec<LineItem> = giver
            .items
            .iter()
            .filter(|item| item.role() != ItemRole::Donation)
            .map(LineItem::recreate)
            .collect();
        if items.iter().all(|line| line.role != ItemRole::Membership) {
            return Err(BillingError::invalid_state(&giver.id, "no membership item to gift"));
        }

        let mut metadata = cmd.metadata;
        metadata.extend(
            SubscriptionMetadata {
                promo_code: Some(code.id.clone()),
                gift_giver_subscription: Some(giver.id.clone()),
                ..SubscriptionMetadata::default()
            }
            .to_metadata(),
        );
        let subscription = self
            .provider
            .create_subscription(CreateSubscriptionRequest {
                metadata,
                promotion_code: Some(code.id.clone()),
                payment_behavior: PaymentBehavior::AllowIncomplete,
                off_session: true,
                idempotency_key: Some(format!("redeem-{}-{}", code.id, customer)),
                ..CreateSubscriptionRequest::new(customer.clone(), items)
            })
            .await?;
        self.cache.sync(&subscription).await?;

        match self
            .provider
            .update_subscription_metadata(
                &giver.id,
                SubscriptionMetadata::recipient_patch(&subscription.id),
            )
            .await
        {
            Ok(linked) => self.cache.sync(&linked).await?,
            Err(err) => tracing::error!(
                subscription_id = %giver.id,
                recipient_subscription_id = %subscription.id,
                error = %err,
                "Gift redeemed but giver not stamped with its recipient"
            ),
        }

        let promotion_code = self
            .provider
            .retrieve_promotion_code(&code.id)
            .await?
            .unwrap_or(code);

        tracing::info!(
            subscription_id = %subscription.id,
            giver_subscription_id = %giver.id,
            recipient = %cmd.recipient,
            promotion_code_id = %promotion_code.id,
            "Gift redeemed"
        );
        Ok(RedeemGiftResult {
            subscription,
            giver_subscription_id: giver.id,
            promotion_code,
        })
    }
}
