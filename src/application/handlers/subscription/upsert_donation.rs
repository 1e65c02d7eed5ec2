//! UpsertDonationHandler - Command handler for the recurring donation item.

use std::sync::Arc;

use crate::domain::errors::BillingError;
use crate::domain::foundation::SubscriptionId;
use crate::domain::subscription::{ItemRole, LineItem, LineItemComposer, Subscription};

use super::{MutationRequest, SubscriptionMutationEngine};

/// Command to add, replace or remove a subscription's donation.
#[derive(Debug, Clone)]
pub struct UpsertDonationCommand {
    pub subscription_id: SubscriptionId,
    /// Minor units per billing period. Zero removes the donation.
    pub amount: i64,
}

/// Handler for donation upserts.
///
/// The donation bills on the membership item's cadence and currency.
pub struct UpsertDonationHandler {
    engine: Arc<SubscriptionMutationEngine>,
    composer: LineItemComposer,
}

impl UpsertDonationHandler {
    pub fn new(engine: Arc<SubscriptionMutationEngine>, composer: LineItemComposer) -> Self {
        Self { engine, composer }
    }

    pub async fn handle(&self, cmd: UpsertDonationCommand) -> Result<Subscription, BillingError> {
        if cmd.amount < 0 {
            return Err(BillingError::NegativeAmount { amount: cmd.amount });
        }

        let current = self.engine.refresh(&cmd.subscription_id).await?;
        let request = MutationRequest::new(current.id.clone(), current.kind());

        if cmd.amount == 0 {
            let existing: Vec<_> = current
                .items_with_role(ItemRole::Donation)
                .map(|i| i.id.clone())
                .collect();
            if existing.is_empty() {
                return Ok(current);
            }
            tracing::info!(subscription_id = %current.id, "Removing donation");
            let request = existing.into_iter().fold(request, |r, id| r.removing(id));
            return self.engine.apply(request).await;
        }

        let membership = current
            .membership_price()
            .ok_or_else(|| BillingError::invalid_state(&current.id, "no membership item"))?;
        let line = LineItem::donation(
            self.composer.carriers().donation.clone(),
            membership.unit_amount.with_amount(cmd.amount),
            membership.recurrence,
        );

        self.engine.apply(request.adding([line])).await
    }
}
