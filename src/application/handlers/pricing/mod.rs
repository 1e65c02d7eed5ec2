//! Pricing handlers.
//!
//! Read-only queries that compose line items for the checkout surface and
//! list the fee changes open to a member.

mod build_checkout_context;
mod get_upgrade_options;

pub use build_checkout_context::{
    BuildCheckoutContextHandler, BuildCheckoutContextQuery, CheckoutContext,
};
pub use get_upgrade_options::{
    GetUpgradeOptionsHandler, GetUpgradeOptionsQuery, GetUpgradeOptionsResult, UpgradeOption,
};

use crate::domain::catalog::{MembershipPlan, PlanPrice, Price, PriceTier};
use crate::domain::errors::BillingError;
use crate::domain::foundation::{PlanId, PlanPriceId, ValidationError};
use crate::domain::shipping::{CountryAllowList, ShippingZoneResolver};
use crate::ports::{PlanCatalog, ShippingZoneRepository};

/// Builds a resolver over the zones currently persisted.
pub(crate) async fn load_zone_resolver(
    zones: &dyn ShippingZoneRepository,
    allow_list: &CountryAllowList,
) -> Result<ShippingZoneResolver, BillingError> {
    let zones = zones.all_zones().await?;
    Ok(ShippingZoneResolver::new(zones, allow_list.clone())?)
}

pub(crate) async fn load_plan(
    catalog: &dyn PlanCatalog,
    id: &PlanId,
) -> Result<MembershipPlan, BillingError> {
    catalog.find_plan(id).await?.ok_or_else(|| {
        ValidationError::invalid_format("plan_id", format!("unknown plan {}", id)).into()
    })
}

pub(crate) fn plan_price<'a>(
    plan: &'a MembershipPlan,
    id: &PlanPriceId,
) -> Result<&'a PlanPrice, BillingError> {
    plan.price(id).ok_or_else(|| {
        ValidationError::invalid_format(
            "price_id",
            format!("plan {} has no price {}", plan.id, id),
        )
        .into()
    })
}

/// Tier a member is currently paying.
///
/// Inline prices carry no nickname, so an amount at or above the plan's
/// solidarity price on the same cadence also counts as solidarity.
pub(crate) fn current_tier(plan: &MembershipPlan, price: &Price) -> PriceTier {
    if price.tier() == PriceTier::Solidarity {
        return PriceTier::Solidarity;
    }
    match plan.price_for(&price.recurrence, PriceTier::Solidarity) {
        Some(solidarity) if price.unit_amount.amount() >= solidarity.amount.amount() => {
            PriceTier::Solidarity
        }
        _ => PriceTier::Regular,
    }
}

/// The plan's current price for what `price` bills, falling back to the
/// regular tier when the plan has no matching tier.
pub(crate) fn matching_plan_price<'a>(
    plan: &'a MembershipPlan,
    price: &Price,
) -> Option<&'a PlanPrice> {
    plan.price_for(&price.recurrence, current_tier(plan, price))
        .or_else(|| plan.price_for(&price.recurrence, PriceTier::Regular))
}
