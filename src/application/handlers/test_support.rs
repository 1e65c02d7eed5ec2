//! Fixtures shared by handler tests.

use std::sync::Arc;

use crate::adapters::{
    InMemoryCustomerDirectory, InMemoryPlanCatalog, InMemorySubscriptionCache,
    MockBillingProvider,
};
use crate::domain::catalog::{
    Currency, MembershipPlan, Money, PlanPrice, PriceTier, Product, Recurrence,
};
use crate::domain::foundation::{
    CustomerId, Metadata, PaymentMethodId, PlanId, PlanPriceId, ProductId, UserId,
};
use crate::domain::shipping::{CountryAllowList, ShippingZone, ZoneCode};
use crate::domain::subscription::{CarrierProducts, LineItemComposer, Subscription};
use crate::ports::{BillingProvider, CreateSubscriptionRequest, Customer, Member};

use super::subscription::SubscriptionMutationEngine;

pub const BOOKS: &str = "prod_books";
pub const SHIPPING: &str = "prod_shipping";
pub const DONATION: &str = "prod_donation";

pub fn gbp(amount: i64) -> Money {
    Money::new(amount, Currency::gbp())
}

fn plan_price(id: &str, amount: i64, recurrence: Recurrence, tier: PriceTier) -> PlanPrice {
    PlanPrice {
        id: PlanPriceId::new(id),
        amount: gbp(amount),
        recurrence,
        products: vec![ProductId::new(BOOKS)],
        free_shipping_zones: vec![],
        tier,
    }
}

/// Twelve deliveries a year, monthly and annual prices in both tiers.
pub fn plan() -> MembershipPlan {
    MembershipPlan {
        id: PlanId::new("plan_books"),
        title: "Books".into(),
        deliveries_per_year: 12,
        prices: vec![
            plan_price("pp_monthly", 1000, Recurrence::monthly(), PriceTier::Regular),
            plan_price("pp_monthly_solidarity", 1500, Recurrence::monthly(), PriceTier::Solidarity),
            plan_price("pp_annual", 10000, Recurrence::annual(), PriceTier::Regular),
        ],
    }
}

fn zone(code: &str, countries: &[&str], rate: i64) -> ShippingZone {
    ShippingZone {
        code: ZoneCode::new(code).unwrap(),
        nickname: code.to_string(),
        countries: countries.iter().map(|c| c.to_string()).collect(),
        rate: gbp(rate),
        rest_of_world: false,
    }
}

/// UK at £3 and EU at £5 per delivery; everything else falls to a free
/// synthetic rest-of-world zone.
pub fn zones() -> Vec<ShippingZone> {
    vec![zone("UK", &["GB"], 300), zone("EU", &["FR", "DE"], 500)]
}

pub fn carriers() -> CarrierProducts {
    CarrierProducts {
        shipping: ProductId::new(SHIPPING),
        donation: ProductId::new(DONATION),
    }
}

pub fn composer() -> LineItemComposer {
    LineItemComposer::new(carriers())
}

pub fn allow_list() -> CountryAllowList {
    CountryAllowList::processor_default()
}

fn product(id: &str, name: &str, flag: Option<&str>) -> Product {
    let mut metadata = Metadata::new();
    if let Some(flag) = flag {
        metadata.insert(flag.into(), "true".into());
    }
    Product {
        id: ProductId::new(id),
        name: name.into(),
        active: true,
        metadata,
        prices: vec![],
    }
}

pub fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

/// Every port a handler may need, backed by in-memory fakes.
#[derive(Clone)]
pub struct Harness {
    pub provider: MockBillingProvider,
    pub cache: InMemorySubscriptionCache,
    pub catalog: InMemoryPlanCatalog,
    pub directory: InMemoryCustomerDirectory,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_provider(MockBillingProvider::new())
    }

    pub fn with_provider(provider: MockBillingProvider) -> Self {
        provider.add_product(product(BOOKS, "Books", Some("pickable")));
        provider.add_product(product(SHIPPING, "Shipping", Some("shipping")));
        provider.add_product(product(DONATION, "Donation", Some("donation")));
        Self {
            provider,
            cache: InMemorySubscriptionCache::new(),
            catalog: InMemoryPlanCatalog::new(vec![plan()], zones()),
            directory: InMemoryCustomerDirectory::new(),
        }
    }

    pub fn provider(&self) -> Arc<dyn BillingProvider> {
        Arc::new(self.provider.clone())
    }

    pub fn engine(&self) -> Arc<SubscriptionMutationEngine> {
        Arc::new(SubscriptionMutationEngine::new(
            self.provider(),
            Arc::new(self.cache.clone()),
        ))
    }

    /// Registers a user with a linked customer and a saved card.
    pub async fn member(&self, user_id: &str) -> (UserId, CustomerId) {
        let customer = CustomerId::new(format!("cus_{}", user_id));
        self.provider.add_customer(Customer {
            id: customer.clone(),
            email: Some(format!("{}@example.com", user_id)),
            name: None,
            metadata: Metadata::new(),
        });
        let user_id = user(user_id);
        self.directory
            .insert(Member {
                user_id: user_id.clone(),
                email: format!("{}@example.com", user_id),
                name: None,
                customer_id: Some(customer.clone()),
                legacy_customer_id: None,
            })
            .await;
        (user_id, customer)
    }

    /// A monthly Books membership with UK shipping for `customer`.
    pub async fn membership(&self, customer: &CustomerId, amount: i64) -> Subscription {
        let plan = plan();
        let price = plan.price(&PlanPriceId::new("pp_monthly")).unwrap().clone();
        let resolver = crate::domain::shipping::ShippingZoneResolver::new(zones(), allow_list()).unwrap();
        let zone = resolver.resolve(Some("GB")).clone();
        let mut items = vec![crate::domain::subscription::LineItem::membership(
            ProductId::new(BOOKS),
            gbp(amount),
            price.recurrence,
        )];
        items.push(composer().shipping_line(&plan, &price, &zone));
        self.provider
            .create_subscription(CreateSubscriptionRequest::new(customer.clone(), items))
            .await
            .unwrap()
    }
}

pub fn card() -> PaymentMethodId {
    PaymentMethodId::new("pm_card_visa")
}
