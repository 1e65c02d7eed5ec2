//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, error types and the state machine trait
//! that form the vocabulary of the billing domain.

mod errors;
mod ids;
mod state_machine;

use std::collections::BTreeMap;

pub use errors::{ErrorCode, ValidationError};
pub use ids::{
    CouponId, CustomerId, PaymentMethodId, PlanId, PlanPriceId, PriceId, ProductId,
    PromotionCodeId, SubscriptionId, SubscriptionItemId, UserId,
};
pub use state_machine::StateMachine;

/// Free-form key/value map attached to remote billing objects.
///
/// Only the translation layers (`subscription::metadata`, `subscription::role`,
/// the Stripe adapter) read or write raw keys.
pub type Metadata = BTreeMap<String, String>;
