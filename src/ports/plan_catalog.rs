//! Plan catalog port.
//!
//! Membership plans are authored in the content system and synced in from
//! outside; this crate only reads them.

use async_trait::async_trait;

use crate::domain::catalog::MembershipPlan;
use crate::domain::errors::BillingError;
use crate::domain::foundation::{PlanId, ProductId};
use crate::domain::shipping::ShippingZone;

#[async_trait]
pub trait PlanCatalog: Send + Sync {
    async fn find_plan(&self, id: &PlanId) -> Result<Option<MembershipPlan>, BillingError>;

    /// The plan offering `product`, if any.
    async fn plan_for_product(
        &self,
        product: &ProductId,
    ) -> Result<Option<MembershipPlan>, BillingError>;
}

/// Shipping zones as persisted by the admin.
///
/// Zones may be empty; the resolver then falls back to a synthetic
/// rest-of-world zone.
#[async_trait]
pub trait ShippingZoneRepository: Send + Sync {
    async fn all_zones(&self) -> Result<Vec<ShippingZone>, BillingError>;
}
