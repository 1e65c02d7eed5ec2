//! CreateGiftHandler - Command handler for gift purchases.

use std::sync::Arc;

use crate::application::handlers::pricing::{load_plan, load_zone_resolver, plan_price};
use crate::domain::errors::BillingError;
use crate::domain::foundation::{
    Metadata, PaymentMethodId, PlanId, PlanPriceId, ProductId, UserId, ValidationError,
};
use crate::domain::gift::PromotionCode;
use crate::domain::shipping::CountryAllowList;
use crate::domain::subscription::{
    ComposeRequest, LineItemComposer, Subscription, SubscriptionMetadata,
};
use crate::ports::{
    BillingProvider, CreateSubscriptionRequest, CustomerDirectory, PaymentBehavior, PlanCatalog,
    ShippingZoneRepository,
};

use super::{ensure_customer, ConfigureGiver, GiftCodeIssuer};

/// Command to buy a gift membership.
#[derive(Debug, Clone)]
pub struct CreateGiftCommand {
    pub plan_id: PlanId,
    /// Defaults to the plan's basic price.
    pub price_id: Option<PlanPriceId>,
    /// Required when the price covers several products.
    pub product: Option<ProductId>,
    pub giver: UserId,
    pub payment_method: PaymentMethodId,
    /// Customer-facing code to mint, e.g. a legacy gift code being carried over.
    pub code: Option<String>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone)]
pub struct CreateGiftResult {
    pub promotion_code: PromotionCode,
    pub subscription: Subscription,
}

/// Handler for gift purchases.
///
/// Gifts ship to the default zone; the recipient's address is unknown
/// until redemption.
pub struct CreateGiftHandler {
    provider: Arc<dyn BillingProvider>,
    directory: Arc<dyn CustomerDirectory>,
    catalog: Arc<dyn PlanCatalog>,
    zones: Arc<dyn ShippingZoneRepository>,
    composer: LineItemComposer,
    allow_list: CountryAllowList,
    issuer: Arc<GiftCodeIssuer>,
}

impl CreateGiftHandler {
    pub fn new(
        provider: Arc<dyn BillingProvider>,
        directory: Arc<dyn CustomerDirectory>,
        catalog: Arc<dyn PlanCatalog>,
        zones: Arc<dyn ShippingZoneRepository>,
        composer: LineItemComposer,
        allow_list: CountryAllowList,
        issuer: Arc<GiftCodeIssuer>,
    ) -> Self {
        Self {
            provider,
            directory,
            catalog,
            zones,
            composer,
            allow_list,
            issuer,
        }
    }

    pub async fn handle(&self, cmd: CreateGiftCommand) -> Result<CreateGiftResult, BillingError> {
        let plan = load_plan(self.catalog.as_ref(), &cmd.plan_id).await?;
        let price = match &cmd.price_id {
            Some(id) => plan_price(&plan, id)?,
            None => plan.basic_price().ok_or_else(|| {
                ValidationError::invalid_format(
                    "plan_id",
                    format!("plan {} has no prices", plan.id),
                )
            })?,
        };
        let resolver = load_zone_resolver(self.zones.as_ref(), &self.allow_list).await?;
        let items = self.composer.compose(&ComposeRequest {
            product: cmd.product.as_ref(),
            ..ComposeRequest::new(&plan, price, resolver.default_zone())
        })?;

        let customer =
            ensure_customer(self.directory.as_ref(), self.provider.as_ref(), &cmd.giver).await?;

        let mut metadata = cmd.metadata.clone();
        metadata.extend(
            SubscriptionMetadata {
                gift_mode: true,
                ..SubscriptionMetadata::default()
            }
            .to_metadata(),
        );
        let subscription = self
            .provider
            .create_subscription(CreateSubscriptionRequest {
                metadata,
                default_payment_method: Some(cmd.payment_method.clone()),
                payment_behavior: PaymentBehavior::AllowIncomplete,
                ..CreateSubscriptionRequest::new(customer, items)
            })
            .await?;
        tracing::info!(
            subscription_id = %subscription.id,
            giver = %cmd.giver,
            plan_id = %plan.id,
            price_id = %price.id,
            "Gift subscription created"
        );

        let (promotion_code, subscription) = self
            .issuer
            .configure_giver(
                &subscription.id,
                ConfigureGiver {
                    related_user: Some(cmd.giver),
                    code: cmd.code,
                    metadata: cmd.metadata,
                },
            )
            .await?;

        Ok(CreateGiftResult {
            promotion_code,
            subscription,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::gift::{GiftLookup, GiftSettings};
    use crate::application::handlers::test_support::{allow_list, card, composer, user, Harness};
    use crate::domain::subscription::{ItemRole, SubscriptionKind};
    use crate::ports::PaymentError;

    fn handler(h: &Harness) -> CreateGiftHandler {
        let cache = Arc::new(h.cache.clone());
        CreateGiftHandler::new(
            h.provider(),
            Arc::new(h.directory.clone()),
            Arc::new(h.catalog.clone()),
            Arc::new(h.catalog.clone()),
            composer(),
            allow_list(),
            Arc::new(GiftCodeIssuer::new(h.provider(), cache, GiftSettings::default())),
        )
    }

    fn command(giver: UserId) -> CreateGiftCommand {
        CreateGiftCommand {
            plan_id: PlanId::new("plan_books"),
            price_id: None,
            product: None,
            giver,
            payment_method: card(),
            code: None,
            metadata: Metadata::new(),
        }
    }

    #[tokio::test]
    async fn gift_is_created_in_gift_mode_with_linked_code() {
        let h = Harness::new();
        let (giver, _) = h.member("giver").await;

        let result = handler(&h).handle(command(giver)).await.unwrap();

        let sub = &result.subscription;
        assert_eq!(sub.kind(), SubscriptionKind::GiftGiver);
        assert!(!sub.is_active_membership());
        assert_eq!(sub.meta().promo_code, Some(result.promotion_code.id.clone()));
        assert_eq!(sub.membership_price().unwrap().unit_amount.amount(), 1000);
        // Default zone is the synthetic rest of world
        assert_eq!(sub.item_for(ItemRole::Shipping).unwrap().price.unit_amount.amount(), 0);

        let lookup = GiftLookup::new(h.provider(), Arc::new(h.cache.clone()));
        let found = lookup
            .gift_giver_subscription_from_code(&result.promotion_code.code)
            .await
            .unwrap();
        assert_eq!(found.map(|s| s.id), Some(sub.id.clone()));
        assert!(lookup.is_redeemable(&result.promotion_code.code).await.unwrap());
    }

    #[tokio::test]
    async fn explicit_code_is_kept() {
        let h = Harness::new();
        let (giver, _) = h.member("giver").await;

        let result = handler(&h)
            .handle(CreateGiftCommand {
                code: Some("LEGACY-42".into()),
                price_id: Some(PlanPriceId::new("pp_annual")),
                ..command(giver)
            })
            .await
            .unwrap();

        assert_eq!(result.promotion_code.code, "LEGACY-42");
        assert_eq!(
            result.subscription.membership_price().unwrap().unit_amount.amount(),
            10000
        );
    }

    #[tokio::test]
    async fn giver_without_customer_gets_one() {
        let h = Harness::new();
        let giver = user("newcomer");
        h.directory
            .insert(crate::ports::Member {
                user_id: giver.clone(),
                email: "newcomer@example.com".into(),
                name: None,
                customer_id: None,
                legacy_customer_id: None,
            })
            .await;

        let result = handler(&h).handle(command(giver.clone())).await.unwrap();

        let member = h.directory.find(&giver).await.unwrap().unwrap();
        assert_eq!(member.customer_id, Some(result.subscription.customer));
    }

    #[tokio::test]
    async fn declined_card_creates_nothing() {
        let h = Harness::new();
        let (giver, _) = h.member("giver").await;
        h.provider
            .set_method_error("create_subscription", PaymentError::provider("card declined"));

        let result = handler(&h).handle(command(giver)).await;

        assert!(matches!(result, Err(BillingError::Provider { retryable: false, .. })));
        assert!(!h.provider.was_called("create_promotion_code"));
        assert!(h.provider.subscriptions().is_empty());
    }
}
