//! MigrateGiftCardsJob - moves old gift recipients onto per-product coupons.
//!
//! Recipients redeemed under the old catalog still bill an item with the
//! pre-redesign product and a shared gift discount. For each one:
//!
//! 1. If the membership item is not on the giver's product, swap it for a
//!    copy of the giver's membership item.
//! 2. If the applied coupon is not the gift coupon of the (new) product,
//!    apply that coupon.
//!
//! A recipient already on the giver's product and coupon is skipped.

use std::sync::Arc;

use crate::application::handlers::gift::GiftCodeIssuer;
use crate::application::handlers::subscription::SubscriptionMutationEngine;
use crate::domain::errors::BillingError;
use crate::domain::foundation::ProductId;
use crate::domain::subscription::{ItemRole, LineItem, Subscription};
use crate::ports::{
    BillingProvider, NewSubscriptionItem, ProrationBehavior, SubscriptionCache,
    SubscriptionFilter,
};

use super::{BatchReport, JobOptions, RecordOutcome};

pub const JOB_NAME: &str = "migrate_gift_cards";

pub struct MigrateGiftCardsJob {
    provider: Arc<dyn BillingProvider>,
    cache: Arc<dyn SubscriptionCache>,
    engine: Arc<SubscriptionMutationEngine>,
    issuer: Arc<GiftCodeIssuer>,
}

impl MigrateGiftCardsJob {
    pub fn new(
        provider: Arc<dyn BillingProvider>,
        cache: Arc<dyn SubscriptionCache>,
        engine: Arc<SubscriptionMutationEngine>,
        issuer: Arc<GiftCodeIssuer>,
    ) -> Self {
        Self {
            provider,
            cache,
            engine,
            issuer,
        }
    }

    pub async fn run(&self, options: &JobOptions) -> Result<BatchReport, BillingError> {
        let mut report = BatchReport::new(JOB_NAME, options.dry_run);
        let marker = self.issuer.settings().coupon_name_prefix.trim_end().to_string();

        let candidates: Vec<Subscription> = self
            .provider
            .list_subscriptions(SubscriptionFilter {
                product: options.product.clone(),
                ..SubscriptionFilter::default()
            })
            .await?
            .into_iter()
            .filter(|s| options.selects(&s.id))
            .filter(|s| {
                s.discount
                    .as_ref()
                    .map_or(false, |d| d.coupon.name_contains(&marker))
            })
            .take(options.limit())
            .collect();

        for sub in candidates {
            let result = self.migrate_one(&sub, options.dry_run).await;
            report.record(sub.id.as_str(), result);
        }
        Ok(report.finish())
    }

    async fn migrate_one(
        &self,
        sub: &Subscription,
        dry_run: bool,
    ) -> Result<RecordOutcome, BillingError> {
        let current = self.engine.refresh(&sub.id).await?;
        if current.status.is_terminal() {
            return Ok(RecordOutcome::skipped(format!("subscription is {}", current.status)));
        }
        let Some(giver_id) = current.meta().gift_giver_subscription else {
            return Ok(RecordOutcome::skipped("no giver link"));
        };
        let Some(giver) = self.provider.retrieve_subscription(&giver_id).await? else {
            tracing::warn!(
                subscription_id = %current.id,
                giver_subscription_id = %giver_id,
                "Giver subscription not found"
            );
            return Ok(RecordOutcome::skipped("giver not found"));
        };
        let (Some(item), Some(giver_item)) = (
            current.item_for(ItemRole::Membership),
            giver.item_for(ItemRole::Membership),
        ) else {
            return Ok(RecordOutcome::skipped("no membership item"));
        };

        let target_product: ProductId = giver_item.product().clone();
        let swap_needed = item.product() != &target_product && item.price.nickname.is_none();
        let applied_coupon = current.discount.as_ref().map(|d| d.coupon.id.clone());
        let target_coupon = if dry_run {
            self.issuer.find_gift_coupon(&target_product).await?
        } else {
            Some(self.issuer.gift_coupon_for(&target_product).await?)
        };
        let coupon_needed = match &target_coupon {
            Some(coupon) => applied_coupon.as_ref() != Some(&coupon.id),
            None => true,
        };

        if !swap_needed && !coupon_needed {
            return Ok(RecordOutcome::skipped("already on giver product and coupon"));
        }
        if dry_run {
            return Ok(RecordOutcome::Migrated);
        }

        if swap_needed {
            let replacement = NewSubscriptionItem::inline(
                LineItem::recreate(giver_item),
                ProrationBehavior::None,
            );
            self.engine
                .swap_item(&current.id, &item.id, replacement)
                .await?;
        }
        if let Some(coupon) = target_coupon.filter(|_| coupon_needed) {
            let updated = self.provider.apply_coupon(&current.id, &coupon.id).await?;
            self.cache.sync(&updated).await?;
            tracing::info!(
                subscription_id = %current.id,
                coupon_id = %coupon.id,
                "Gift coupon replaced"
            );
        }
        Ok(RecordOutcome::Migrated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::gift::{ConfigureGiver, GiftSettings};
    use crate::application::handlers::test_support::{gbp, Harness, BOOKS};
    use crate::domain::catalog::{Product, Recurrence};
    use crate::domain::foundation::{CouponId, Metadata, SubscriptionId};
    use crate::domain::subscription::{Coupon, CouponDuration, SubscriptionMetadata};
    use crate::ports::CreateSubscriptionRequest;

    const OLD_PRODUCT: &str = "prod_old_both";

    fn job(h: &Harness) -> MigrateGiftCardsJob {
        let cache = Arc::new(h.cache.clone());
        MigrateGiftCardsJob::new(
            h.provider(),
            cache.clone(),
            h.engine(),
            Arc::new(GiftCodeIssuer::new(h.provider(), cache, GiftSettings::default())),
        )
    }

    /// An old-style recipient of `giver`: old product, shared gift coupon.
    async fn old_recipient(h: &Harness, giver: &Subscription) -> Subscription {
        h.provider.add_product(Product {
            id: ProductId::new(OLD_PRODUCT),
            name: "both_monthly".into(),
            active: false,
            metadata: Metadata::new(),
            prices: vec![],
        });
        h.provider.add_coupon(Coupon {
            id: CouponId::new("old_gift"),
            name: Some("Gift Card: 1 month".into()),
            percent_off: Some(100),
            duration: CouponDuration::Forever,
            applies_to: vec![],
            metadata: Metadata::new(),
        });
        let (_, customer) = h.member("friend").await;
        let mut request = CreateSubscriptionRequest::new(
            customer,
            vec![LineItem::membership(
                ProductId::new(OLD_PRODUCT),
                gbp(900),
                Recurrence::monthly(),
            )],
        );
        request.metadata = SubscriptionMetadata {
            gift_giver_subscription: Some(giver.id.clone()),
            ..SubscriptionMetadata::default()
        }
        .to_metadata();
        let sub = h.provider.create_subscription(request).await.unwrap();
        h.provider
            .apply_coupon(&sub.id, &CouponId::new("old_gift"))
            .await
            .unwrap()
    }

    async fn giver(h: &Harness) -> Subscription {
        let (_, customer) = h.member("giver").await;
        let sub = h.membership(&customer, 1000).await;
        GiftCodeIssuer::new(h.provider(), Arc::new(h.cache.clone()), GiftSettings::default())
            .configure_giver(&sub.id, ConfigureGiver::default())
            .await
            .unwrap()
            .1
    }

    #[tokio::test]
    async fn recipient_moves_to_giver_product_and_coupon() {
        let h = Harness::new();
        let giver = giver(&h).await;
        let recipient = old_recipient(&h, &giver).await;

        let report = job(&h).run(&JobOptions::default()).await.unwrap();

        assert_eq!(report.migrated, 1);
        assert!(report.is_clean());
        let migrated = h.provider.subscription(&recipient.id).unwrap();
        assert_eq!(migrated.primary_product(), Some(&ProductId::new(BOOKS)));
        assert_eq!(migrated.items.len(), 1);
        let coupon = &migrated.discount.unwrap().coupon;
        assert_eq!(coupon.name.as_deref(), Some("Gift Card: Books"));
    }

    #[tokio::test]
    async fn second_run_writes_nothing() {
        let h = Harness::new();
        let giver = giver(&h).await;
        old_recipient(&h, &giver).await;
        let job = job(&h);
        job.run(&JobOptions::default()).await.unwrap();
        h.provider.clear_calls();

        let report = job.run(&JobOptions::default()).await.unwrap();

        assert_eq!(report.migrated, 0);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(h.provider.write_count(), 0);
    }

    #[tokio::test]
    async fn dry_run_reports_without_writing() {
        let h = Harness::new();
        let giver = giver(&h).await;
        old_recipient(&h, &giver).await;
        h.provider.clear_calls();

        let report = job(&h).run(&JobOptions::dry_run()).await.unwrap();

        assert_eq!(report.migrated, 1);
        assert!(report.dry_run);
        assert_eq!(h.provider.write_count(), 0);
    }

    #[tokio::test]
    async fn missing_giver_is_skipped() {
        let h = Harness::new();
        let mut phantom = giver(&h).await;
        phantom.id = SubscriptionId::new("sub_gone");
        old_recipient(&h, &phantom).await;

        let report = job(&h).run(&JobOptions::default()).await.unwrap();

        assert_eq!(report.migrated, 0);
        assert_eq!(report.skipped[0].reason, "giver not found");
    }

    #[tokio::test]
    async fn ordinary_discounts_are_not_examined() {
        let h = Harness::new();
        let (_, customer) = h.member("reader").await;
        h.membership(&customer, 1000).await;

        let report = job(&h).run(&JobOptions::default()).await.unwrap();

        assert_eq!(report.examined, 0);
    }
}
