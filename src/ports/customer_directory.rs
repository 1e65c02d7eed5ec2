//! Customer directory port.
//!
//! Supplies the authenticated actor's identity and the billing customer
//! linked to it. User management itself lives outside this crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::BillingError;
use crate::domain::foundation::{CustomerId, UserId};

/// A user as seen by billing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: UserId,
    pub email: String,
    pub name: Option<String>,
    /// Billing customer this user pays through.
    pub customer_id: Option<CustomerId>,
    /// Customer id recorded by the pre-redesign system, not yet linked.
    pub legacy_customer_id: Option<CustomerId>,
}

#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn find(&self, user_id: &UserId) -> Result<Option<Member>, BillingError>;

    /// Records `customer` as the user's billing customer.
    async fn link_customer(
        &self,
        user_id: &UserId,
        customer: &CustomerId,
    ) -> Result<(), BillingError>;

    /// Users that carry a legacy customer id but no linked customer.
    async fn members_pending_customer_link(&self) -> Result<Vec<Member>, BillingError>;
}
