//! Subscription handlers.
//!
//! ## Engine
//! - `SubscriptionMutationEngine` - role-replacing item mutations
//!
//! ## Commands
//! - Updating the membership fee and shipping
//! - Adding, replacing or removing the donation

mod mutation_engine;
mod update_subscription;
mod upsert_donation;

pub use mutation_engine::{MutationRequest, SubscriptionMutationEngine};
pub use update_subscription::{
    UpdateSubscriptionCommand, UpdateSubscriptionHandler, UpdateSubscriptionResult,
};
pub use upsert_donation::{UpsertDonationCommand, UpsertDonationHandler};
