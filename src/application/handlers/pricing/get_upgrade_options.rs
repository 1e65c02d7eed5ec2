//! GetUpgradeOptionsHandler - Query handler for the fee changes open to a member.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::catalog::{PlanPrice, Price, PriceTier};
use crate::domain::errors::BillingError;
use crate::domain::foundation::{SubscriptionId, UserId, ValidationError};
use crate::domain::subscription::Subscription;
use crate::ports::{BillingProvider, CustomerDirectory, PlanCatalog, SubscriptionFilter};

use super::{current_tier, matching_plan_price};

#[derive(Debug, Clone)]
pub struct GetUpgradeOptionsQuery {
    pub user_id: UserId,
}

/// One fee change the member may pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UpgradeOption {
    /// Keep paying the current amount.
    StatusQuo,
    /// Move to the plan's current price for the same tier.
    UpdateToCurrentPrice { price: PlanPrice },
    /// Move to the plan's solidarity price.
    UpgradeToSolidarity { price: PlanPrice },
}

#[derive(Debug, Clone, Default)]
pub struct GetUpgradeOptionsResult {
    /// The membership the options apply to; `None` when the user has none.
    pub subscription_id: Option<SubscriptionId>,
    pub current_price: Option<Price>,
    pub options: Vec<UpgradeOption>,
}

pub struct GetUpgradeOptionsHandler {
    directory: Arc<dyn CustomerDirectory>,
    provider: Arc<dyn BillingProvider>,
    catalog: Arc<dyn PlanCatalog>,
}

impl GetUpgradeOptionsHandler {
    pub fn new(
        directory: Arc<dyn CustomerDirectory>,
        provider: Arc<dyn BillingProvider>,
        catalog: Arc<dyn PlanCatalog>,
    ) -> Self {
        Self {
            directory,
            provider,
            catalog,
        }
    }

    pub async fn handle(
        &self,
        query: GetUpgradeOptionsQuery,
    ) -> Result<GetUpgradeOptionsResult, BillingError> {
        let member = self.directory.find(&query.user_id).await?.ok_or_else(|| {
            ValidationError::invalid_format("user_id", format!("unknown user {}", query.user_id))
        })?;
        let Some(customer) = member.customer_id else {
            return Ok(GetUpgradeOptionsResult::default());
        };

        let subscriptions = self
            .provider
            .list_subscriptions(SubscriptionFilter {
                customer: Some(customer),
                ..SubscriptionFilter::default()
            })
            .await?;
        let Some(subscription) = current_membership(subscriptions) else {
            return Ok(GetUpgradeOptionsResult::default());
        };
        let Some(price) = subscription.membership_price().cloned() else {
            return Ok(GetUpgradeOptionsResult::default());
        };

        let mut result = GetUpgradeOptionsResult {
            subscription_id: Some(subscription.id.clone()),
            current_price: Some(price.clone()),
            options: vec![UpgradeOption::StatusQuo],
        };

        let Some(plan) = self.catalog.plan_for_product(&price.product).await? else {
            tracing::warn!(
                subscription_id = %subscription.id,
                product_id = %price.product,
                "No plan offers the subscribed product"
            );
            return Ok(result);
        };

        if let Some(current) = matching_plan_price(&plan, &price) {
            if current.amount != price.unit_amount {
                result.options.push(UpgradeOption::UpdateToCurrentPrice {
                    price: current.clone(),
                });
            }
        }

        if current_tier(&plan, &price) == PriceTier::Regular {
            if let Some(solidarity) = plan.price_for(&price.recurrence, PriceTier::Solidarity) {
                if solidarity.amount.amount() > price.unit_amount.amount() {
                    result.options.push(UpgradeOption::UpgradeToSolidarity {
                        price: solidarity.clone(),
                    });
                }
            }
        }

        Ok(result)
    }
}

/// The newest live, self-paid membership.
fn current_membership(subscriptions: Vec<Subscription>) -> Option<Subscription> {
    subscriptions
        .into_iter()
        .filter(|s| s.is_active_membership())
        .max_by_key(|s| s.created)
}
