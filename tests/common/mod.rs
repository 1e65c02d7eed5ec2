//! Shared setup for the integration tests.
//!
//! A `World` wires every handler against `MockBillingProvider` and the
//! in-memory adapters, with one Books plan priced monthly and annually.

#![allow(dead_code)]

use std::sync::Arc;

use membership_billing::adapters::{
    InMemoryCustomerDirectory, InMemoryPlanCatalog, InMemorySubscriptionCache,
    MockBillingProvider,
};
use membership_billing::application::handlers::gift::{
    GiftCodeIssuer, GiftSettings, RedeemGiftHandler,
};
use membership_billing::application::handlers::subscription::SubscriptionMutationEngine;
use membership_billing::domain::catalog::{
    Currency, MembershipPlan, Money, PlanPrice, PriceTier, Product, Recurrence,
};
use membership_billing::domain::foundation::{
    CustomerId, Metadata, PlanId, PlanPriceId, ProductId, UserId,
};
use membership_billing::domain::shipping::{CountryAllowList, ShippingZone, ZoneCode};
use membership_billing::domain::subscription::{CarrierProducts, LineItemComposer};
use membership_billing::ports::{BillingProvider, Customer, Member};

pub const BOOKS: &str = "prod_books";
pub const SHIPPING: &str = "prod_shipping";
pub const DONATION: &str = "prod_donation";
pub const PLAN: &str = "plan_books";

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

pub fn plan() -> MembershipPlan {
    MembershipPlan {
        id: PlanId::new(PLAN),
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

pub fn zones() -> Vec<ShippingZone> {
    vec![zone("UK", &["GB"], 300), zone("EU", &["FR", "DE", "IE"], 500)]
}

pub fn composer() -> LineItemComposer {
    LineItemComposer::new(CarrierProducts {
        shipping: ProductId::new(SHIPPING),
        donation: ProductId::new(DONATION),
    })
}

pub fn allow_list() -> CountryAllowList {
    CountryAllowList::processor_default()
}

fn product(id: &str, name: &str, flag: &str) -> Product {
    let mut metadata = Metadata::new();
    metadata.insert(flag.into(), "true".into());
    Product {
        id: ProductId::new(id),
        name: name.into(),
        active: true,
        metadata,
        prices: vec![],
    }
}

pub struct World {
    pub provider: MockBillingProvider,
    pub cache: InMemorySubscriptionCache,
    pub catalog: InMemoryPlanCatalog,
    pub directory: InMemoryCustomerDirectory,
}

impl World {
    pub fn new() -> Self {
        let provider = MockBillingProvider::new();
        provider.add_product(product(BOOKS, "Books", "pickable"));
        provider.add_product(product(SHIPPING, "Shipping", "shipping"));
        provider.add_product(product(DONATION, "Donation", "donation"));
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

    pub fn issuer(&self) -> Arc<GiftCodeIssuer> {
        Arc::new(GiftCodeIssuer::new(
            self.provider(),
            Arc::new(self.cache.clone()),
            GiftSettings::default(),
        ))
    }

    pub fn redeem_handler(&self) -> RedeemGiftHandler {
        RedeemGiftHandler::new(
            self.provider(),
            Arc::new(self.cache.clone()),
            Arc::new(self.directory.clone()),
        )
    }

    /// A user with a linked billing customer.
    pub async fn member(&self, id: &str) -> (UserId, CustomerId) {
        let customer = CustomerId::new(format!("cus_{}", id));
        self.provider.add_customer(Customer {
            id: customer.clone(),
            email: Some(format!("{}@example.com", id)),
            name: None,
            metadata: Metadata::new(),
        });
        let user_id = UserId::new(id).unwrap();
        self.directory
            .insert(Member {
                user_id: user_id.clone(),
                email: format!("{}@example.com", id),
                name: None,
                customer_id: Some(customer.clone()),
                legacy_customer_id: None,
            })
            .await;
        (user_id, customer)
    }
}
