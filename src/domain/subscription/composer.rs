//! Builds the line items for a plan price, product and shipping zone.

use crate::domain::catalog::{MembershipPlan, Money, PlanPrice};
use crate::domain::errors::BillingError;
use crate::domain::foundation::ProductId;
use crate::domain::shipping::ShippingZone;

use super::LineItem;

/// Products that carry shipping and donation lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierProducts {
    pub shipping: ProductId,
    pub donation: ProductId,
}

/// Everything needed to price one subscription.
#[derive(Debug, Clone)]
pub struct ComposeRequest<'a> {
    pub plan: &'a MembershipPlan,
    pub price: &'a PlanPrice,
    /// Required when the price belongs to several products.
    pub product: Option<&'a ProductId>,
    pub zone: &'a ShippingZone,
    pub include_shipping: bool,
    pub include_donation: bool,
    /// Minor units.
    pub donation_amount: i64,
    /// Replaces the plan amount for the membership line (minor units).
    pub override_amount: Option<i64>,
}

impl<'a> ComposeRequest<'a> {
    /// Membership and shipping, no donation, plan amount.
    pub fn new(
        plan: &'a MembershipPlan,
        price: &'a PlanPrice,
        zone: &'a ShippingZone,
    ) -> Self {
        Self {
            plan,
            price,
            product: None,
            zone,
            include_shipping: true,
            include_donation: false,
            donation_amount: 0,
            override_amount: None,
        }
    }
}

/// Composes ordered line items: membership, then shipping, then donation.
#[derive(Debug, Clone)]
pub struct LineItemComposer {
    carriers: CarrierProducts,
}

impl LineItemComposer {
    pub fn new(carriers: CarrierProducts) -> Self {
        Self { carriers }
    }

    pub fn carriers(&self) -> &CarrierProducts {
        &self.carriers
    }

    pub fn compose(&self, request: &ComposeRequest<'_>) -> Result<Vec<LineItem>, BillingError> {
        let price = request.price;
        if let Some(amount) = request.override_amount.filter(|a| *a < 0) {
            return Err(BillingError::NegativeAmount { amount });
        }
        if request.include_donation && request.donation_amount < 0 {
            return Err(BillingError::NegativeAmount {
                amount: request.donation_amount,
            });
        }

        let product = price.resolve_product(request.product)?;
        let membership_amount = match request.override_amount {
            Some(amount) => price.amount.with_amount(amount),
            None => price.amount.clone(),
        };

        let mut items = vec![LineItem::membership(
            product,
            membership_amount,
            price.recurrence,
        )];

        if request.include_shipping {
            items.push(self.shipping_line(request.plan, price, request.zone));
        }

        if request.include_donation && request.donation_amount > 0 {
            items.push(self.donation_line(
                price.amount.with_amount(request.donation_amount),
                price,
            ));
        }

        Ok(items)
    }

    /// Shipping line for `zone`; zero when the price ships there for free.
    pub fn shipping_line(
        &self,
        plan: &MembershipPlan,
        price: &PlanPrice,
        zone: &ShippingZone,
    ) -> LineItem {
        LineItem::shipping(
            self.carriers.shipping.clone(),
            plan.shipping_fee(price, zone),
            price.recurrence,
            &zone.code,
        )
    }

    /// Shipping line with a caller-chosen fee.
    pub fn custom_shipping_line(
        &self,
        fee: Money,
        price: &PlanPrice,
        zone: &ShippingZone,
    ) -> Result<LineItem, BillingError> {
        if fee.is_negative() {
            return Err(BillingError::NegativeAmount {
                amount: fee.amount(),
            });
        }
        Ok(LineItem::shipping(
            self.carriers.shipping.clone(),
            fee,
            price.recurrence,
            &zone.code,
        ))
    }

    /// Donation billed on the same cadence as the membership.
    pub fn donation_line(&self, amount: Money, price: &PlanPrice) -> LineItem {
        LineItem::donation(self.carriers.donation.clone(), amount, price.recurrence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{Currency, PriceTier, Recurrence};
    use crate::domain::foundation::{PlanId, PlanPriceId};
    use crate::domain::shipping::ZoneCode;
    use crate::domain::subscription::ItemRole;

    fn composer() -> LineItemComposer {
        LineItemComposer::new(CarrierProducts {
            shipping: ProductId::new("prod_shipping"),
            donation: ProductId::new("prod_donation"),
        })
    }

    fn plan() -> MembershipPlan {
        MembershipPlan {
            id: PlanId::new("plan_reading"),
            title: "Reading".into(),
            deliveries_per_year: 6,
            prices: vec![PlanPrice {
                id: PlanPriceId::new("pp_monthly"),
                amount: Money::new(1000, Currency::gbp()),
                recurrence: Recurrence::monthly(),
                products: vec![ProductId::new("prod_books")],
                free_shipping_zones: vec![],
                tier: PriceTier::Regular,
            }],
        }
    }

    fn zone(code: &str) -> ShippingZone {
        ShippingZone {
            code: ZoneCode::new(code).unwrap(),
            nickname: code.into(),
            countries: vec!["GB".into()],
            rate: Money::new(300, Currency::gbp()),
            rest_of_world: false,
        }
    }

    #[test]
    fn orders_membership_shipping_donation() {
        let plan = plan();
        let zone = zone("UK");
        let request = ComposeRequest {
            include_donation: true,
            donation_amount: 250,
            ..ComposeRequest::new(&plan, &plan.prices[0], &zone)
        };

        let items = composer().compose(&request).unwrap();
        let roles: Vec<_> = items.iter().map(|i| i.role).collect();
        assert_eq!(
            roles,
            vec![ItemRole::Membership, ItemRole::Shipping, ItemRole::Donation]
        );
        assert_eq!(items[0].amount().amount(), 1000);
        assert_eq!(items[1].amount().amount(), 150);
        assert_eq!(items[2].amount().amount(), 250);
        assert_eq!(items[2].price_data.recurrence, Recurrence::monthly());
    }

    #[test]
    fn free_zone_keeps_zero_shipping_line() {
        let mut plan = plan();
        plan.prices[0].free_shipping_zones = vec![ZoneCode::new("UK").unwrap()];
        let zone = zone("UK");

        let items = composer()
            .compose(&ComposeRequest::new(&plan, &plan.prices[0], &zone))
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].role, ItemRole::Shipping);
        assert!(items[1].amount().is_zero());
    }

    #[test]
    fn zero_donation_is_omitted() {
        let plan = plan();
        let zone = zone("UK");
        let request = ComposeRequest {
            include_donation: true,
            include_shipping: false,
            ..ComposeRequest::new(&plan, &plan.prices[0], &zone)
        };
        assert_eq!(composer().compose(&request).unwrap().len(), 1);
    }

    #[test]
    fn override_amount_replaces_plan_amount() {
        let plan = plan();
        let zone = zone("UK");
        let request = ComposeRequest {
            override_amount: Some(1500),
            ..ComposeRequest::new(&plan, &plan.prices[0], &zone)
        };
        assert_eq!(composer().compose(&request).unwrap()[0].amount().amount(), 1500);

        let negative = ComposeRequest {
            override_amount: Some(-1),
            ..ComposeRequest::new(&plan, &plan.prices[0], &zone)
        };
        assert!(matches!(
            composer().compose(&negative),
            Err(BillingError::NegativeAmount { amount: -1 })
        ));
    }

    #[test]
    fn price_with_two_products_needs_a_choice() {
        let mut plan = plan();
        plan.prices[0].products.push(ProductId::new("prod_classics"));
        let zone = zone("UK");

        let err = composer()
            .compose(&ComposeRequest::new(&plan, &plan.prices[0], &zone))
            .unwrap_err();
        assert!(matches!(err, BillingError::AmbiguousProduct { ref candidates, .. } if candidates.len() == 2));

        let chosen = ProductId::new("prod_classics");
        let request = ComposeRequest {
            product: Some(&chosen),
            ..ComposeRequest::new(&plan, &plan.prices[0], &zone)
        };
        let items = composer().compose(&request).unwrap();
        assert_eq!(items[0].price_data.product, chosen);
    }
}
