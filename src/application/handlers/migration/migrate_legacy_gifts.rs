//! MigrateLegacyGiftsJob - turns pre-redesign gift records into promotion codes.
//!
//! Each pending record names the subscription that paid for the gift and
//! the code printed on the card. The giver is configured with that exact
//! code. Gifts already redeemed in the old system get their recipient
//! subscription through the normal redemption path.

use std::sync::Arc;

use crate::application::handlers::gift::{
    ConfigureGiver, GiftCodeIssuer, GiftReference, RedeemGiftCommand, RedeemGiftHandler,
};
use crate::domain::errors::{BillingError, UnredeemableReason};
use crate::domain::foundation::Metadata;
use crate::ports::{BillingProvider, LegacyGift, LegacyGiftRepository, SubscriptionCache};

use super::{BatchReport, JobOptions, RecordOutcome};

pub const JOB_NAME: &str = "migrate_legacy_gifts";

pub struct MigrateLegacyGiftsJob {
    provider: Arc<dyn BillingProvider>,
    cache: Arc<dyn SubscriptionCache>,
    gifts: Arc<dyn LegacyGiftRepository>,
    issuer: Arc<GiftCodeIssuer>,
    redeem: Arc<RedeemGiftHandler>,
}

impl MigrateLegacyGiftsJob {
    pub fn new(
        provider: Arc<dyn BillingProvider>,
        cache: Arc<dyn SubscriptionCache>,
        gifts: Arc<dyn LegacyGiftRepository>,
        issuer: Arc<GiftCodeIssuer>,
        redeem: Arc<RedeemGiftHandler>,
    ) -> Self {
        Self {
            provider,
            cache,
            gifts,
            issuer,
            redeem,
        }
    }

    pub async fn run(&self, options: &JobOptions) -> Result<BatchReport, BillingError> {
        let mut report = BatchReport::new(JOB_NAME, options.dry_run);
        let pending: Vec<LegacyGift> = self
            .gifts
            .pending()
            .await?
            .into_iter()
            .filter(|g| options.selects(&g.giving_subscription))
            .take(options.limit())
            .collect();

        for gift in pending {
            let result = self.migrate_one(&gift, options.dry_run).await;
            report.record(format!("legacy_gift:{}", gift.id), result);
        }
        Ok(report.finish())
    }

    async fn migrate_one(
        &self,
        gift: &LegacyGift,
        dry_run: bool,
    ) -> Result<RecordOutcome, BillingError> {
        let Some(giver) = self
            .provider
            .retrieve_subscription(&gift.giving_subscription)
            .await?
        else {
            tracing::warn!(
                legacy_gift_id = gift.id,
                subscription_id = %gift.giving_subscription,
                "Legacy gift giver not found"
            );
            return Ok(RecordOutcome::skipped("giver not found"));
        };
        self.cache.sync(&giver).await?;
        if giver.status.is_terminal() {
            return Ok(RecordOutcome::skipped(format!("giver is {}", giver.status)));
        }
        if dry_run {
            return Ok(RecordOutcome::Migrated);
        }

        let mut breadcrumbs = Metadata::new();
        breadcrumbs.insert("legacy_gift_id".into(), gift.id.to_string());
        breadcrumbs.insert("legacy_gift_code".into(), gift.gift_code.clone());

        // A rerun after a partial failure finds the code already linked
        if giver.meta().promo_code.is_none() {
            self.issuer
                .configure_giver(
                    &giver.id,
                    ConfigureGiver {
                        related_user: gift.giving_user.clone(),
                        code: Some(gift.gift_code.clone()),
                        metadata: breadcrumbs.clone(),
                    },
                )
                .await?;
        }

        if let Some(recipient) = &gift.recipient {
            let redeemed = self
                .redeem
                .handle(RedeemGiftCommand {
                    gift: GiftReference::Giver(giver.id.clone()),
                    recipient: recipient.clone(),
                    metadata: breadcrumbs,
                })
                .await;
            match redeemed {
                Ok(result) => tracing::info!(
                    legacy_gift_id = gift.id,
                    subscription_id = %result.subscription.id,
                    "Legacy gift recipient subscribed"
                ),
                Err(BillingError::AlreadyMember { .. })
                | Err(BillingError::UnredeemableCode {
                    reason: UnredeemableReason::AlreadyRedeemed,
                    ..
                }) => tracing::info!(
                    legacy_gift_id = gift.id,
                    user_id = %recipient,
                    "Legacy gift recipient already subscribed"
                ),
                Err(err) => return Err(err),
            }
        }

        self.gifts.mark_migrated(gift.id).await?;
        Ok(RecordOutcome::Migrated)
    }
}
