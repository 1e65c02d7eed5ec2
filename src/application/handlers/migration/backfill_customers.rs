//! BackfillCustomersJob - links users to the billing customers recorded by
//! the pre-redesign system.
//!
//! A legacy customer id that the provider no longer knows is skipped and
//! reported; a provider failure is a per-record failure.

use std::sync::Arc;

use crate::domain::errors::BillingError;
use crate::ports::{BillingProvider, CustomerDirectory, Member, SubscriptionCache, SubscriptionFilter};

use super::{BatchReport, JobOptions, RecordOutcome};

pub const JOB_NAME: &str = "backfill_customers";

pub struct BackfillCustomersJob {
    directory: Arc<dyn CustomerDirectory>,
    provider: Arc<dyn BillingProvider>,
    cache: Arc<dyn SubscriptionCache>,
}

impl BackfillCustomersJob {
    pub fn new(
        directory: Arc<dyn CustomerDirectory>,
        provider: Arc<dyn BillingProvider>,
        cache: Arc<dyn SubscriptionCache>,
    ) -> Self {
        Self {
            directory,
            provider,
            cache,
        }
    }

    pub async fn run(&self, options: &JobOptions) -> Result<BatchReport, BillingError> {
        let mut report = BatchReport::new(JOB_NAME, options.dry_run);
        let pending = self.directory.members_pending_customer_link().await?;

        for member in pending.into_iter().take(options.limit()) {
            let result = self.backfill_one(&member, options.dry_run).await;
            report.record(member.user_id.as_str(), result);
        }
        Ok(report.finish())
    }

    async fn backfill_one(
        &self,
        member: &Member,
        dry_run: bool,
    ) -> Result<RecordOutcome, BillingError> {
        let Some(legacy_id) = &member.legacy_customer_id else {
            return Ok(RecordOutcome::skipped("no legacy customer id"));
        };
        let Some(customer) = self.provider.retrieve_customer(legacy_id).await? else {
            tracing::warn!(
                user_id = %member.user_id,
                customer_id = %legacy_id,
                "Legacy customer not found"
            );
            return Ok(RecordOutcome::skipped("customer not found"));
        };
        if dry_run {
            return Ok(RecordOutcome::Migrated);
        }

        self.directory
            .link_customer(&member.user_id, &customer.id)
            .await?;

        let subscriptions = self
            .provider
            .list_subscriptions(SubscriptionFilter {
                customer: Some(customer.id.clone()),
                include_terminal: true,
                ..SubscriptionFilter::default()
            })
            .await?;
        for subscription in &subscriptions {
            self.cache.sync(subscription).await?;
        }

        tracing::info!(
            user_id = %member.user_id,
            customer_id = %customer.id,
            subscriptions = subscriptions.len(),
            "Legacy customer linked"
        );
        Ok(RecordOutcome::Migrated)
    }
}
