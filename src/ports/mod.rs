//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Billing Provider
//!
//! - `BillingProvider` - Subscriptions, prices, coupons, promotion codes, customers
//!
//! ## Local State
//!
//! - `SubscriptionCache` - Mirror of provider subscriptions, refreshed after writes
//! - `CustomerDirectory` - Users and their linked billing customers
//! - `PlanCatalog` / `ShippingZoneRepository` - Content-managed plans and zones
//! - `LegacyGiftRepository` - Gifts sold by the pre-redesign system
//! - `WebhookEventRepository` - Webhook idempotency tracking

mod billing_provider;
mod customer_directory;
mod legacy_gift_repository;
mod plan_catalog;
mod subscription_cache;
mod webhook_event_repository;

pub use billing_provider::{
    BillingProvider, CreateCouponRequest, CreateCustomerRequest, CreatePaymentMethodRequest,
    CreatePriceRequest, CreateProductRequest, CreatePromotionCodeRequest,
    CreateSubscriptionRequest, Customer, ItemChange, ItemPrice, NewSubscriptionItem,
    PaymentBehavior, PaymentError, PaymentErrorCode, ProrationBehavior, SubscriptionFilter,
    SubscriptionUpdate, WebhookEvent, WebhookEventType,
};
pub use customer_directory::{CustomerDirectory, Member};
pub use legacy_gift_repository::{LegacyGift, LegacyGiftRepository};
pub use plan_catalog::{PlanCatalog, ShippingZoneRepository};
pub use subscription_cache::SubscriptionCache;
pub use webhook_event_repository::{SaveResult, WebhookEventRecord, WebhookEventRepository};
