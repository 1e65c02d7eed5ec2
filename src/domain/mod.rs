//! Domain layer containing billing rules and value types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, validation errors, state machine)
//! - `catalog` - Money, prices, products and membership plans
//! - `shipping` - Shipping zones and country resolution
//! - `subscription` - Subscription snapshots, item roles, line-item composition
//! - `gift` - Gift codes and the gift lifecycle
//! - `legacy` - Classification of pre-redesign products
//! - `errors` - The `BillingError` taxonomy

pub mod catalog;
pub mod errors;
pub mod foundation;
pub mod gift;
pub mod legacy;
pub mod shipping;
pub mod subscription;

pub use errors::{BillingError, UnredeemableReason};
