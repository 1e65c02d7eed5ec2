//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Command handlers write through the billing provider and refresh the
//! subscription cache; query handlers only read.

pub mod handlers;

pub use handlers::gift::{
    CascadeGiftCancellationHandler, CreateGiftCommand, CreateGiftHandler, GiftCodeIssuer,
    GiftLookup, RedeemGiftCommand, RedeemGiftHandler,
};
pub use handlers::migration::{BatchReport, JobOptions};
pub use handlers::pricing::{BuildCheckoutContextHandler, GetUpgradeOptionsHandler};
pub use handlers::subscription::{
    SubscriptionMutationEngine, UpdateSubscriptionHandler, UpsertDonationHandler,
};
pub use handlers::webhook::HandleBillingWebhookHandler;
