//! Billing provider port.
//!
//! Defines the contract for the recurring-billing processor (e.g. Stripe).
//! Every call is blocking network I/O from the caller's point of view.
//!
//! # Design
//!
//! - **Snapshots out, requests in**: reads return domain snapshots, writes
//!   take request structs built from domain values
//! - **Not found is a value**: lookups return `Ok(None)`, never an error
//!   collapsed into a default
//! - **Raw metadata only here**: the domain translates role and link keys

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{Money, Price, Product, Recurrence};
use crate::domain::errors::BillingError;
use crate::domain::foundation::{
    CouponId, CustomerId, Metadata, PaymentMethodId, PriceId, ProductId, PromotionCodeId,
    SubscriptionId, SubscriptionItemId,
};
use crate::domain::gift::PromotionCode;
use crate::domain::subscription::{Coupon, CouponDuration, LineItem, Subscription};

/// Port for the billing processor.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    // Subscriptions

    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<Subscription, PaymentError>;

    async fn retrieve_subscription(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<Subscription>, PaymentError>;

    /// Lists subscriptions matching `filter`, following pagination.
    async fn list_subscriptions(
        &self,
        filter: SubscriptionFilter,
    ) -> Result<Vec<Subscription>, PaymentError>;

    /// Applies item additions and deletions in one request.
    ///
    /// Only called when `supports_bundled_item_updates` is true.
    async fn update_subscription_items(
        &self,
        id: &SubscriptionId,
        update: SubscriptionUpdate,
    ) -> Result<Subscription, PaymentError>;

    /// Whether `update_subscription_items` applies adds and deletes atomically.
    fn supports_bundled_item_updates(&self) -> bool;

    /// Merges `metadata` into the subscription's metadata.
    async fn update_subscription_metadata(
        &self,
        id: &SubscriptionId,
        metadata: Metadata,
    ) -> Result<Subscription, PaymentError>;

    /// Replaces the coupon applied to the subscription.
    async fn apply_coupon(
        &self,
        id: &SubscriptionId,
        coupon: &CouponId,
    ) -> Result<Subscription, PaymentError>;

    /// Cancels immediately.
    async fn cancel_subscription(&self, id: &SubscriptionId) -> Result<Subscription, PaymentError>;

    // Subscription items

    async fn create_subscription_item(
        &self,
        subscription: &SubscriptionId,
        item: NewSubscriptionItem,
    ) -> Result<SubscriptionItemId, PaymentError>;

    async fn delete_subscription_item(
        &self,
        item: &SubscriptionItemId,
        proration: ProrationBehavior,
    ) -> Result<(), PaymentError>;

    // Catalog

    async fn create_price(&self, request: CreatePriceRequest) -> Result<Price, PaymentError>;

    async fn retrieve_price(&self, id: &PriceId) -> Result<Option<Price>, PaymentError>;

    async fn search_prices_by_metadata(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Vec<Price>, PaymentError>;

    async fn retrieve_product(&self, id: &ProductId) -> Result<Option<Product>, PaymentError>;

    async fn search_products_by_metadata(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Vec<Product>, PaymentError>;

    async fn create_product(&self, request: CreateProductRequest) -> Result<Product, PaymentError>;

    // Coupons and promotion codes

    async fn find_coupons_by_metadata(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Vec<Coupon>, PaymentError>;

    async fn create_coupon(&self, request: CreateCouponRequest) -> Result<Coupon, PaymentError>;

    async fn create_promotion_code(
        &self,
        request: CreatePromotionCodeRequest,
    ) -> Result<PromotionCode, PaymentError>;

    async fn retrieve_promotion_code(
        &self,
        id: &PromotionCodeId,
    ) -> Result<Option<PromotionCode>, PaymentError>;

    /// Promotion codes whose customer-facing code equals `code`
    /// (case-insensitive).
    async fn list_promotion_codes(&self, code: &str) -> Result<Vec<PromotionCode>, PaymentError>;

    // Customers

    async fn create_customer(&self, request: CreateCustomerRequest)
        -> Result<Customer, PaymentError>;

    async fn retrieve_customer(&self, id: &CustomerId) -> Result<Option<Customer>, PaymentError>;

    /// Creates a card payment method from a token and attaches it.
    async fn create_payment_method(
        &self,
        request: CreatePaymentMethodRequest,
    ) -> Result<PaymentMethodId, PaymentError>;

    // Webhooks

    /// Verifies a webhook signature and parses the event.
    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PaymentError>;
}

// ════════════════════════════════════════════════════════════════════════════════
// Requests
// ════════════════════════════════════════════════════════════════════════════════

/// Mid-cycle invoice adjustment when items change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProrationBehavior {
    /// New prices apply from the next billing cycle.
    #[default]
    None,
    CreateProrations,
    AlwaysInvoice,
}

impl ProrationBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProrationBehavior::None => "none",
            ProrationBehavior::CreateProrations => "create_prorations",
            ProrationBehavior::AlwaysInvoice => "always_invoice",
        }
    }
}

/// How a new subscription treats a first payment that needs action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentBehavior {
    #[default]
    DefaultIncomplete,
    AllowIncomplete,
    ErrorIfIncomplete,
}

impl PaymentBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentBehavior::DefaultIncomplete => "default_incomplete",
            PaymentBehavior::AllowIncomplete => "allow_incomplete",
            PaymentBehavior::ErrorIfIncomplete => "error_if_incomplete",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub customer: CustomerId,
    pub items: Vec<LineItem>,
    pub metadata: Metadata,
    pub promotion_code: Option<PromotionCodeId>,
    pub default_payment_method: Option<PaymentMethodId>,
    pub payment_behavior: PaymentBehavior,
    /// Charge without the customer present.
    pub off_session: bool,
    pub idempotency_key: Option<String>,
}

impl CreateSubscriptionRequest {
    pub fn new(customer: CustomerId, items: Vec<LineItem>) -> Self {
        Self {
            customer,
            items,
            metadata: Metadata::new(),
            promotion_code: None,
            default_payment_method: None,
            payment_behavior: PaymentBehavior::default(),
            off_session: false,
            idempotency_key: None,
        }
    }
}

/// Narrows `list_subscriptions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionFilter {
    pub customer: Option<CustomerId>,
    pub product: Option<ProductId>,
    /// Include canceled and expired subscriptions.
    pub include_terminal: bool,
}

/// One change inside a bundled item update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemChange {
    Add(LineItem),
    Delete(SubscriptionItemId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionUpdate {
    /// Adds first, deletes after; the provider applies them together.
    pub changes: Vec<ItemChange>,
    pub proration: ProrationBehavior,
}

/// Price of a standalone item creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemPrice {
    Existing(PriceId),
    Inline(LineItem),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubscriptionItem {
    pub price: ItemPrice,
    pub quantity: u64,
    pub metadata: Metadata,
    pub proration: ProrationBehavior,
}

impl NewSubscriptionItem {
    pub fn inline(line: LineItem, proration: ProrationBehavior) -> Self {
        Self {
            quantity: line.quantity,
            metadata: line.item_metadata(),
            price: ItemPrice::Inline(line),
            proration,
        }
    }

    pub fn existing(price: PriceId, metadata: Metadata) -> Self {
        Self {
            price: ItemPrice::Existing(price),
            quantity: 1,
            metadata,
            proration: ProrationBehavior::None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePriceRequest {
    pub product: ProductId,
    pub unit_amount: Money,
    pub recurrence: Recurrence,
    pub nickname: Option<String>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub unit_label: Option<String>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCouponRequest {
    pub name: String,
    pub percent_off: u32,
    pub duration: CouponDuration,
    pub applies_to: Vec<ProductId>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePromotionCodeRequest {
    pub coupon: CouponId,
    /// Customer-facing code; the provider generates one when absent.
    pub code: Option<String>,
    pub max_redemptions: u32,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCustomerRequest {
    pub email: String,
    pub name: Option<String>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub email: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentMethodRequest {
    pub customer: CustomerId,
    /// Card token from the checkout surface.
    pub card_token: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhooks
// ════════════════════════════════════════════════════════════════════════════════

/// Webhook event from the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    pub event_type: WebhookEventType,
    /// Subscription payload for subscription events.
    pub subscription: Option<Subscription>,
    /// Unix timestamp.
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionDeleted,
    Unknown(String),
}

impl WebhookEventType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "customer.subscription.created" => WebhookEventType::SubscriptionCreated,
            "customer.subscription.updated" => WebhookEventType::SubscriptionUpdated,
            "customer.subscription.deleted" => WebhookEventType::SubscriptionDeleted,
            other => WebhookEventType::Unknown(other.to_string()),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Errors
// ════════════════════════════════════════════════════════════════════════════════

/// Errors from billing provider operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentError {
    /// Error code for categorization.
    pub code: PaymentErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Provider's error code (if available).
    pub provider_code: Option<String>,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl PaymentError {
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::ProviderError, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(PaymentErrorCode::NotFound, format!("{} not found", resource))
    }

    pub fn invalid_webhook(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::InvalidWebhook, message)
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PaymentError {}

impl From<PaymentError> for BillingError {
    fn from(err: PaymentError) -> Self {
        BillingError::Provider {
            message: err.to_string(),
            retryable: err.retryable,
        }
    }
}

/// Payment error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    NetworkError,
    AuthenticationError,
    CardDeclined,
    InvalidRequest,
    NotFound,
    RateLimitExceeded,
    InvalidWebhook,
    ProviderError,
    Unknown,
}

impl PaymentErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::NetworkError | PaymentErrorCode::RateLimitExceeded
        )
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::AuthenticationError => "authentication_error",
            PaymentErrorCode::CardDeclined => "card_declined",
            PaymentErrorCode::InvalidRequest => "invalid_request",
            PaymentErrorCode::NotFound => "not_found",
            PaymentErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            PaymentErrorCode::InvalidWebhook => "invalid_webhook",
            PaymentErrorCode::ProviderError => "provider_error",
            PaymentErrorCode::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;

    #[test]
    fn billing_provider_is_object_safe() {
        fn _accepts_dyn(_provider: &dyn BillingProvider) {}
    }

    #[test]
    fn payment_error_retryable() {
        assert!(PaymentErrorCode::NetworkError.is_retryable());
        assert!(PaymentErrorCode::RateLimitExceeded.is_retryable());
        assert!(!PaymentErrorCode::CardDeclined.is_retryable());
        assert!(!PaymentErrorCode::NotFound.is_retryable());
    }

    #[test]
    fn payment_error_converts_to_billing_error() {
        let err: BillingError = PaymentError::network("connection reset").into();
        assert_eq!(err.code(), ErrorCode::ExternalServiceError);
        assert!(err.is_retryable());
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn proration_defaults_to_none() {
        assert_eq!(ProrationBehavior::default().as_str(), "none");
    }

    #[test]
    fn webhook_event_type_parse() {
        assert_eq!(
            WebhookEventType::parse("customer.subscription.deleted"),
            WebhookEventType::SubscriptionDeleted
        );
        assert_eq!(
            WebhookEventType::parse("invoice.paid"),
            WebhookEventType::Unknown("invoice.paid".to_string())
        );
    }
}
