//! Gift handlers.
//!
//! ## Commands
//! - `CreateGiftHandler` - gift purchase: giver subscription plus code
//! - `RedeemGiftHandler` - recipient subscription from a code
//! - `CascadeGiftCancellationHandler` - cancels recipients of canceled gifts
//!
//! ## Queries
//! - `GiftLookup` - code and subscription resolution
//!
//! `GiftCodeIssuer` owns the coupons and the giver side of the link.

mod cascade_cancellation;
mod create_gift;
mod gift_lookup;
mod issuer;
mod redeem_gift;

pub use cascade_cancellation::{CascadeGiftCancellationHandler, CascadeResult};
pub use create_gift::{CreateGiftCommand, CreateGiftHandler, CreateGiftResult};
pub use gift_lookup::{GiftLookup, SubscriptionWithCode};
pub use issuer::{ConfigureGiver, GiftCodeIssuer, GiftSettings};
pub use redeem_gift::{GiftReference, RedeemGiftCommand, RedeemGiftHandler, RedeemGiftResult};

use crate::domain::errors::BillingError;
use crate::domain::foundation::{CustomerId, Metadata, UserId, ValidationError};
use crate::ports::{BillingProvider, CreateCustomerRequest, CustomerDirectory};

/// The user's billing customer, created and linked on first purchase.
pub(crate) async fn ensure_customer(
    directory: &dyn CustomerDirectory,
    provider: &dyn BillingProvider,
    user_id: &UserId,
) -> Result<CustomerId, BillingError> {
    let member = directory.find(user_id).await?.ok_or_else(|| {
        ValidationError::invalid_format("user_id", format!("unknown user {}", user_id))
    })?;
    if let Some(customer) = member.customer_id {
        return Ok(customer);
    }

    let mut metadata = Metadata::new();
    metadata.insert("user_id".into(), user_id.to_string());
    let customer = provider
        .create_customer(CreateCustomerRequest {
            email: member.email,
            name: member.name,
            metadata,
        })
        .await?;
    directory.link_customer(user_id, &customer.id).await?;
    tracing::info!(user_id = %user_id, customer_id = %customer.id, "Billing customer created");
    Ok(customer.id)
}
