//! Migration jobs.
//!
//! Batch jobs that normalize pre-redesign billing data into the current
//! model. Each job is idempotent: a second run over the same data performs
//! no writes. All of them return a `BatchReport` and honour `JobOptions`.
//!
//! - `MigrateGiftCardsJob` - old gift recipients onto per-product coupons
//! - `MigrateLegacySubscriptionsJob` - legacy products onto modern products
//! - `MigrateLegacyGiftsJob` - locally stored gifts into promotion codes
//! - `BackfillCustomersJob` - legacy customer ids into customer links

mod backfill_customers;
mod migrate_gift_cards;
mod migrate_legacy_gifts;
mod migrate_legacy_subscriptions;
mod report;

pub use backfill_customers::BackfillCustomersJob;
pub use migrate_gift_cards::MigrateGiftCardsJob;
pub use migrate_legacy_gifts::MigrateLegacyGiftsJob;
pub use migrate_legacy_subscriptions::{LegacyProductMap, MigrateLegacySubscriptionsJob};
pub use report::{BatchReport, JobOptions, RecordFailure, RecordOutcome, SkippedRecord};

/// A job the `reconcile` binary can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    BackfillCustomers,
    MigrateLegacySubscriptions,
    MigrateLegacyGifts,
    MigrateGiftCards,
}

impl Job {
    /// Every job, in the order a full reconciliation runs them. Customers
    /// are linked first so gift recipients resolve to their customer.
    pub const ALL: [Job; 4] = [
        Job::BackfillCustomers,
        Job::MigrateLegacySubscriptions,
        Job::MigrateLegacyGifts,
        Job::MigrateGiftCards,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Job::BackfillCustomers => backfill_customers::JOB_NAME,
            Job::MigrateLegacySubscriptions => migrate_legacy_subscriptions::JOB_NAME,
            Job::MigrateLegacyGifts => migrate_legacy_gifts::JOB_NAME,
            Job::MigrateGiftCards => migrate_gift_cards::JOB_NAME,
        }
    }

    pub fn parse(name: &str) -> Option<Job> {
        Self::ALL.into_iter().find(|job| job.name() == name)
    }
}
