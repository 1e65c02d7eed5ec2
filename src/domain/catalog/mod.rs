//! Catalog - money, prices, products and membership plans.

mod money;
mod plan;
mod product;
mod recurrence;

pub use money::{Currency, Money};
pub use plan::{MembershipPlan, PlanPrice, PriceTier};
pub use product::{Price, PriceLineage, Product};
pub use recurrence::{BillingInterval, Recurrence};
