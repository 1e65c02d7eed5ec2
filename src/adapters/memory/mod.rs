//! In-memory adapters for the local-state ports.
//!
//! Used by the test suites and by `reconcile --dry-run` when no database is
//! configured. Not intended for production.

mod customer_directory;
mod legacy_gift_repository;
mod plan_catalog;
mod subscription_cache;
mod webhook_event_repository;

pub use customer_directory::InMemoryCustomerDirectory;
pub use legacy_gift_repository::InMemoryLegacyGiftRepository;
pub use plan_catalog::InMemoryPlanCatalog;
pub use subscription_cache::InMemorySubscriptionCache;
pub use webhook_event_repository::InMemoryWebhookEventRepository;
