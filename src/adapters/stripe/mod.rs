//! Stripe billing provider adapter.
//!
//! Implements the `BillingProvider` port for Stripe, including:
//! - Subscription and subscription item lifecycle
//! - Prices, products, coupons and promotion codes
//! - Customers and payment methods
//! - Webhook signature verification
//!
//! # Security
//!
//! - Webhook signatures use HMAC-SHA256 with constant-time comparison
//! - Timestamps are validated to prevent replay attacks (5-minute window)
//! - All secrets are handled via `secrecy::SecretString`
//!
//! # Configuration
//!
//! Required environment variables:
//! - `MEMBERSHIP_BILLING__PAYMENT__STRIPE_API_KEY`: Stripe secret API key
//! - `MEMBERSHIP_BILLING__PAYMENT__STRIPE_WEBHOOK_SECRET`: Webhook signing secret (whsec_...)

mod mock_billing_provider;
mod stripe_adapter;
mod webhook_types;

pub use mock_billing_provider::{MethodCall, MockBillingProvider};
pub use stripe_adapter::{StripeBillingAdapter, StripeConfig};
pub use webhook_types::{
    SignatureHeader, SignatureParseError, StripeCoupon, StripeCustomer, StripePrice,
    StripePromotionCode, StripeSubscription, StripeWebhookEvent,
};
