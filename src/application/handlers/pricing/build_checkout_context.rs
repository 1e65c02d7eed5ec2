//! BuildCheckoutContextHandler - Query handler for the checkout line-item set.

use std::sync::Arc;

use crate::domain::errors::BillingError;
use crate::domain::foundation::{Metadata, PlanId, PlanPriceId, ProductId};
use crate::domain::shipping::{CountryAllowList, ShippingZone};
use crate::domain::subscription::{ComposeRequest, LineItem, LineItemComposer, SubscriptionMetadata};
use crate::ports::{PlanCatalog, ShippingZoneRepository};

use super::{load_plan, load_zone_resolver, plan_price};

/// Query for the items a checkout session should bill.
#[derive(Debug, Clone)]
pub struct BuildCheckoutContextQuery {
    pub plan_id: PlanId,
    pub price_id: PlanPriceId,
    /// Required when the price is offered for several products.
    pub product: Option<ProductId>,
    /// Shipping country as entered, any case.
    pub country: Option<String>,
    /// Buying for somebody else. Gifts ship at the default rate and carry
    /// no donation.
    pub gift_mode: bool,
    /// Recurring donation in minor units; zero for none.
    pub donation_amount: i64,
}

/// Everything the checkout surface needs to open a session.
#[derive(Debug, Clone)]
pub struct CheckoutContext {
    /// Membership, then shipping, then donation.
    pub line_items: Vec<LineItem>,
    pub zone: ShippingZone,
    /// Countries the address collector should accept.
    pub shipping_countries: Vec<String>,
    /// Subscription metadata to attach at creation.
    pub metadata: Metadata,
}

pub struct BuildCheckoutContextHandler {
    catalog: Arc<dyn PlanCatalog>,
    zones: Arc<dyn ShippingZoneRepository>,
    composer: LineItemComposer,
    allow_list: CountryAllowList,
}

impl BuildCheckoutContextHandler {
    pub fn new(
        catalog: Arc<dyn PlanCatalog>,
        zones: Arc<dyn ShippingZoneRepository>,
        composer: LineItemComposer,
        allow_list: CountryAllowList,
    ) -> Self {
        Self {
            catalog,
            zones,
            composer,
            allow_list,
        }
    }

    pub async fn handle(&self, query: BuildCheckoutContextQuery) -> Result<CheckoutContext, BillingError> {
        if query.donation_amount < 0 {
            return Err(BillingError::NegativeAmount {
                amount: query.donation_amount,
            });
        }

        let plan = load_plan(self.catalog.as_ref(), &query.plan_id).await?;
        let price = plan_price(&plan, &query.price_id)?;
        let resolver = load_zone_resolver(self.zones.as_ref(), &self.allow_list).await?;

        let zone = if query.gift_mode {
            resolver.default_zone()
        } else {
            resolver.resolve(query.country.as_deref())
        };

        let line_items = self.composer.compose(&ComposeRequest {
            product: query.product.as_ref(),
            include_donation: !query.gift_mode,
            donation_amount: query.donation_amount,
            ..ComposeRequest::new(&plan, price, zone)
        })?;

        let metadata = SubscriptionMetadata {
            gift_mode: query.gift_mode,
            ..SubscriptionMetadata::default()
        }
        .to_metadata();

        tracing::debug!(
            plan_id = %plan.id,
            price_id = %price.id,
            zone = %zone.code,
            gift_mode = query.gift_mode,
            items = line_items.len(),
            "Checkout context built"
        );

        Ok(CheckoutContext {
            line_items,
            shipping_countries: resolver.effective_countries(zone),
            zone: zone.clone(),
            metadata,
        })
    }
}
