//! WebhookEventRepository port - Interface for tracking processed webhooks.
//!
//! The provider may deliver the same event several times (timeouts, 5xx
//! responses, lost acknowledgements). Recording each event id lets the
//! webhook handler skip redeliveries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::BillingError;

/// Record of a processed webhook event.
#[derive(Debug, Clone)]
pub struct WebhookEventRecord {
    /// Provider event ID (evt_xxx format).
    pub event_id: String,

    /// Event type (e.g., "customer.subscription.deleted").
    pub event_type: String,

    pub processed_at: DateTime<Utc>,

    /// Result of processing: "success", "ignored", or "failed".
    pub result: String,

    /// Error message if processing failed or reason if ignored.
    pub error_message: Option<String>,
}

impl WebhookEventRecord {
    pub fn success(event_id: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self::with_result(event_id, event_type, "success", None)
    }

    pub fn ignored(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::with_result(event_id, event_type, "ignored", Some(reason.into()))
    }

    pub fn failed(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::with_result(event_id, event_type, "failed", Some(error.into()))
    }

    fn with_result(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        result: &str,
        error_message: Option<String>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            processed_at: Utc::now(),
            result: result.to_string(),
            error_message,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.result == "failed"
    }
}

/// Result of attempting to save a webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// First time seeing this event.
    Inserted,
    /// Another delivery already recorded it.
    AlreadyExists,
}

#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    /// Returns `None` if the event hasn't been processed yet.
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, BillingError>;

    /// Insert-if-absent. A failed record may be overwritten by a later retry.
    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, BillingError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // ══════════════════════════════════════════════════════════════
    // WebhookEventRecord Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn success_record_has_no_error() {
        let record = WebhookEventRecord::success("evt_123", "customer.subscription.updated");
        assert_eq!(record.result, "success");
        assert!(record.error_message.is_none());
        assert!(!record.is_failure());
    }

    #[test]
    fn ignored_record_keeps_reason() {
        let record = WebhookEventRecord::ignored("evt_1", "invoice.paid", "unhandled type");
        assert_eq!(record.result, "ignored");
        assert_eq!(record.error_message.as_deref(), Some("unhandled type"));
    }

    #[test]
    fn failed_record_is_failure() {
        let record = WebhookEventRecord::failed("evt_1", "customer.subscription.deleted", "boom");
        assert!(record.is_failure());
    }
}
