//! Batch report shared by the migration jobs.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::domain::errors::BillingError;
use crate::domain::foundation::{ProductId, SubscriptionId};

/// Narrows a job run.
#[derive(Debug, Clone, Default)]
pub struct JobOptions {
    /// Reads only; records are reported as they would be migrated.
    pub dry_run: bool,
    /// Only this subscription.
    pub subscription: Option<SubscriptionId>,
    /// Only subscriptions billing this product.
    pub product: Option<ProductId>,
    /// Never touched.
    pub excluded: BTreeSet<SubscriptionId>,
    /// Stop after examining this many records.
    pub batch_size: Option<usize>,
}

impl JobOptions {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }

    pub(crate) fn limit(&self) -> usize {
        self.batch_size.unwrap_or(usize::MAX)
    }

    pub(crate) fn selects(&self, id: &SubscriptionId) -> bool {
        self.subscription.as_ref().map_or(true, |only| only == id) && !self.excluded.contains(id)
    }
}

/// What happened to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Migrated,
    Skipped(String),
}

impl RecordOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        RecordOutcome::Skipped(reason.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    /// Identifies the record, e.g. a subscription id or legacy gift id.
    pub key: String,
    pub error: String,
    pub retryable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRecord {
    pub key: String,
    pub reason: String,
}

/// Counts for one job run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub job: String,
    pub dry_run: bool,
    pub examined: usize,
    pub migrated: usize,
    pub skipped: Vec<SkippedRecord>,
    pub failures: Vec<RecordFailure>,
}

impl BatchReport {
    pub fn new(job: impl Into<String>, dry_run: bool) -> Self {
        Self {
            job: job.into(),
            dry_run,
            examined: 0,
            migrated: 0,
            skipped: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Tallies one record. Failures are logged and kept; the batch goes on.
    pub fn record(&mut self, key: impl Into<String>, result: Result<RecordOutcome, BillingError>) {
        let key = key.into();
        self.examined += 1;
        match result {
            Ok(RecordOutcome::Migrated) => {
                tracing::info!(job = %self.job, key = %key, dry_run = self.dry_run, "Record migrated");
                self.migrated += 1;
            }
            Ok(RecordOutcome::Skipped(reason)) => {
                tracing::debug!(job = %self.job, key = %key, reason = %reason, "Record skipped");
                self.skipped.push(SkippedRecord { key, reason });
            }
            Err(err) => {
                tracing::error!(job = %self.job, key = %key, error = %err, "Record failed");
                self.failures.push(RecordFailure {
                    retryable: err.is_retryable(),
                    error: err.to_string(),
                    key,
                });
            }
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Logs the totals.
    pub fn finish(self) -> Self {
        tracing::info!(
            job = %self.job,
            dry_run = self.dry_run,
            examined = self.examined,
            migrated = self.migrated,
            skipped = self.skipped.len(),
            failed = self.failures.len(),
            "Batch finished"
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::UnredeemableReason;

    #[test]
    fn record_tallies_each_outcome() {
        let mut report = BatchReport::new("gift_cards", false);
        report.record("sub_1", Ok(RecordOutcome::Migrated));
        report.record("sub_2", Ok(RecordOutcome::skipped("already migrated")));
        report.record(
            "sub_3",
            Err(BillingError::unredeemable("X", UnredeemableReason::NotFound)),
        );

        assert_eq!(report.examined, 3);
        assert_eq!(report.migrated, 1);
        assert_eq!(report.skipped[0].reason, "already migrated");
        assert_eq!(report.failures[0].key, "sub_3");
        assert!(!report.failures[0].retryable);
        assert!(!report.is_clean());
    }

    #[test]
    fn options_select_and_exclude() {
        let mut options = JobOptions::default();
        options.excluded.insert(SubscriptionId::new("sub_skip"));
        assert!(options.selects(&SubscriptionId::new("sub_a")));
        assert!(!options.selects(&SubscriptionId::new("sub_skip")));

        options.subscription = Some(SubscriptionId::new("sub_only"));
        assert!(!options.selects(&SubscriptionId::new("sub_a")));
        assert!(options.selects(&SubscriptionId::new("sub_only")));
    }

    #[test]
    fn report_serializes_for_the_cli() {
        let report = BatchReport::new("backfill_customers", true);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["job"], "backfill_customers");
        assert_eq!(json["dry_run"], true);
    }
}
