//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `stripe` - Billing provider (HTTP client and a stateful mock)
//! - `memory` - In-memory local state for tests and dry runs

pub mod memory;
pub mod stripe;

pub use memory::{
    InMemoryCustomerDirectory, InMemoryLegacyGiftRepository, InMemoryPlanCatalog,
    InMemorySubscriptionCache, InMemoryWebhookEventRepository,
};
pub use stripe::{MockBillingProvider, StripeBillingAdapter, StripeConfig};
