//! Shipping - zones, the country allow-list and zone resolution.

mod countries;
mod resolver;
mod zone;

pub use countries::CountryAllowList;
pub use resolver::ShippingZoneResolver;
pub use zone::{ShippingZone, ZoneCode};
