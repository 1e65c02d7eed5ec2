//! UpdateSubscriptionHandler - Command handler for fee and shipping changes.

use std::sync::Arc;

use crate::application::handlers::pricing::{load_zone_resolver, matching_plan_price};
use crate::domain::errors::BillingError;
use crate::domain::foundation::SubscriptionId;
use crate::domain::shipping::{CountryAllowList, ShippingZone, ZoneCode};
use crate::domain::subscription::{
    ComposeRequest, ItemRole, LineItemComposer, Subscription, SubscriptionKind,
};
use crate::ports::{PlanCatalog, ProrationBehavior, ShippingZoneRepository};

use super::{MutationRequest, SubscriptionMutationEngine};

/// Command to re-price a subscription.
#[derive(Debug, Clone)]
pub struct UpdateSubscriptionCommand {
    pub subscription_id: SubscriptionId,
    pub proration: ProrationBehavior,
    /// Move the membership item to the plan's current price.
    pub update_membership_fee: bool,
    /// Replaces the plan amount when updating the fee (minor units).
    pub custom_membership_fee: Option<i64>,
    /// Add a shipping item, or re-price the existing one.
    pub add_or_update_shipping: bool,
    /// Replaces the zone fee when updating shipping (minor units).
    pub custom_shipping_fee: Option<i64>,
    /// New shipping country. Defaults to the zone already billed.
    pub country: Option<String>,
}

impl UpdateSubscriptionCommand {
    /// A command that changes nothing until flags are set.
    pub fn new(subscription_id: SubscriptionId) -> Self {
        Self {
            subscription_id,
            proration: ProrationBehavior::None,
            update_membership_fee: false,
            custom_membership_fee: None,
            add_or_update_shipping: false,
            custom_shipping_fee: None,
            country: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdateSubscriptionResult {
    pub subscription: Subscription,
    pub zone: ZoneCode,
    /// False when the subscription already matched and nothing was written.
    pub changed: bool,
}

/// Handler for membership fee and shipping updates.
///
/// Refuses canceled subscriptions and gift recipients, whose fee is covered
/// by the giver.
pub struct UpdateSubscriptionHandler {
    engine: Arc<SubscriptionMutationEngine>,
    catalog: Arc<dyn PlanCatalog>,
    zones: Arc<dyn ShippingZoneRepository>,
    composer: LineItemComposer,
    allow_list: CountryAllowList,
}

impl UpdateSubscriptionHandler {
    pub fn new(
        engine: Arc<SubscriptionMutationEngine>,
        catalog: Arc<dyn PlanCatalog>,
        zones: Arc<dyn ShippingZoneRepository>,
        composer: LineItemComposer,
        allow_list: CountryAllowList,
    ) -> Self {
        Self {
            engine,
            catalog,
            zones,
            composer,
            allow_list,
        }
    }

    pub async fn handle(
        &self,
        cmd: UpdateSubscriptionCommand,
    ) -> Result<UpdateSubscriptionResult, BillingError> {
        let current = self.engine.refresh(&cmd.subscription_id).await?;
        let kind = current.kind();
        if current.status.is_terminal() {
            return Err(BillingError::invalid_state(
                &current.id,
                format!("subscription is {}", current.status),
            ));
        }
        if kind == SubscriptionKind::GiftRecipient {
            return Err(BillingError::invalid_state(
                &current.id,
                "gift recipients cannot change their fee",
            ));
        }

        let membership = current
            .membership_price()
            .cloned()
            .ok_or_else(|| BillingError::invalid_state(&current.id, "no membership item"))?;
        let plan = self
            .catalog
            .plan_for_product(&membership.product)
            .await?
            .ok_or_else(|| {
                BillingError::invalid_state(
                    &current.id,
                    format!("no plan offers product {}", membership.product),
                )
            })?;
        let price = matching_plan_price(&plan, &membership).ok_or_else(|| {
            BillingError::invalid_state(
                &current.id,
                format!("plan {} has no {} price", plan.id, membership.recurrence),
            )
        })?;

        let resolver = load_zone_resolver(self.zones.as_ref(), &self.allow_list).await?;
        let zone: &ShippingZone = match cmd.country.as_deref() {
            Some(country) => resolver.resolve(Some(country)),
            None => current
                .item_for(ItemRole::Shipping)
                .and_then(|item| item.shipping_zone())
                .map(|code| resolver.by_code(&code))
                .unwrap_or_else(|| resolver.default_zone()),
        };

        let mut lines = Vec::new();
        if cmd.update_membership_fee {
            let composed = self.composer.compose(&ComposeRequest {
                product: Some(&membership.product),
                include_shipping: false,
                override_amount: cmd.custom_membership_fee,
                ..ComposeRequest::new(&plan, price, zone)
            })?;
            lines.extend(composed);
        }
        if cmd.add_or_update_shipping {
            let line = match cmd.custom_shipping_fee {
                Some(fee) => {
                    self.composer
                        .custom_shipping_line(price.amount.with_amount(fee), price, zone)?
                }
                None => self.composer.shipping_line(&plan, price, zone),
            };
            lines.push(line);
        }

        if lines.is_empty() {
            return Ok(UpdateSubscriptionResult {
                subscription: current,
                zone: zone.code.clone(),
                changed: false,
            });
        }

        let before = current.items.clone();
        let subscription = self
            .engine
            .apply(
                MutationRequest::new(current.id.clone(), kind)
                    .adding(lines)
                    .with_proration(cmd.proration),
            )
            .await?;

        Ok(UpdateSubscriptionResult {
            changed: subscription.items != before,
            zone: zone.code.clone(),
            subscription,
        })
    }
}
