//! In-memory plan catalog and shipping zones.
//!
//! Plans and zones are loaded once, typically from configuration fixtures,
//! and then read concurrently.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::catalog::MembershipPlan;
use crate::domain::errors::BillingError;
use crate::domain::foundation::{PlanId, ProductId};
use crate::domain::shipping::ShippingZone;
use crate::ports::{PlanCatalog, ShippingZoneRepository};

#[derive(Debug, Clone, Default)]
pub struct InMemoryPlanCatalog {
    plans: Arc<RwLock<Vec<MembershipPlan>>>,
    zones: Arc<RwLock<Vec<ShippingZone>>>,
}

impl InMemoryPlanCatalog {
    pub fn new(plans: Vec<MembershipPlan>, zones: Vec<ShippingZone>) -> Self {
        Self {
            plans: Arc::new(RwLock::new(plans)),
            zones: Arc::new(RwLock::new(zones)),
        }
    }

    pub async fn add_plan(&self, plan: MembershipPlan) {
        self.plans.write().await.push(plan);
    }

    /// Replaces all zones, as an admin save would.
    pub async fn replace_zones(&self, zones: Vec<ShippingZone>) {
        *self.zones.write().await = zones;
    }
}

#[async_trait]
impl PlanCatalog for InMemoryPlanCatalog {
    async fn find_plan(&self, id: &PlanId) -> Result<Option<MembershipPlan>, BillingError> {
        Ok(self.plans.read().await.iter().find(|p| &p.id == id).cloned())
    }

    async fn plan_for_product(
        &self,
        product: &ProductId,
    ) -> Result<Option<MembershipPlan>, BillingError> {
        Ok(self
            .plans
            .read()
            .await
            .iter()
            .find(|plan| plan.prices.iter().any(|p| p.products.contains(product)))
            .cloned())
    }
}

#[async_trait]
impl ShippingZoneRepository for InMemoryPlanCatalog {
    async fn all_zones(&self) -> Result<Vec<ShippingZone>, BillingError> {
        Ok(self.zones.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{Currency, Money, PlanPrice, PriceTier, Recurrence};
    use crate::domain::foundation::PlanPriceId;

    fn plan() -> MembershipPlan {
        MembershipPlan {
            id: PlanId::new("plan_books"),
            title: "Books".into(),
            deliveries_per_year: 12,
            prices: vec![PlanPrice {
                id: PlanPriceId::new("pp_1"),
                amount: Money::new(1000, Currency::gbp()),
                recurrence: Recurrence::monthly(),
                products: vec![ProductId::new("prod_a"), ProductId::new("prod_b")],
                free_shipping_zones: vec![],
                tier: PriceTier::Regular,
            }],
        }
    }

    #[tokio::test]
    async fn plan_for_product_matches_any_listed_product() {
        let catalog = InMemoryPlanCatalog::new(vec![plan()], vec![]);

        let found = catalog
            .plan_for_product(&ProductId::new("prod_b"))
            .await
            .unwrap();
        assert_eq!(found.map(|p| p.id), Some(PlanId::new("plan_books")));
        assert!(catalog
            .plan_for_product(&ProductId::new("prod_x"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn zones_start_empty() {
        let catalog = InMemoryPlanCatalog::default();
        assert!(catalog.all_zones().await.unwrap().is_empty());
    }
}
