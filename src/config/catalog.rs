//! Catalog configuration
//!
//! Product ids the engine needs but does not own: the carrier products for
//! shipping and donation lines, and the modern membership products legacy
//! subscriptions are moved onto.

use std::collections::HashMap;

use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::foundation::ProductId;
use crate::domain::legacy::ModernProduct;
use crate::domain::subscription::CarrierProducts;

fn default_shipping_product_name() -> String {
    "Shipping".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Product carrying shipping fee lines
    pub shipping_product_id: String,

    /// Product carrying donation lines
    pub donation_product_id: String,

    /// Name searched for (and created with) when the gift coupon needs the
    /// shipping product
    #[serde(default = "default_shipping_product_name")]
    pub shipping_product_name: String,

    /// Pre-redesign catalog product whose prices carry the plan name
    pub historical_catalog_product_id: Option<String>,

    /// Modern membership products keyed by `<selection>_<cadence>`,
    /// e.g. `classics_annual`
    #[serde(default)]
    pub modern_products: HashMap<String, String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            shipping_product_id: String::new(),
            donation_product_id: String::new(),
            shipping_product_name: default_shipping_product_name(),
            historical_catalog_product_id: None,
            modern_products: HashMap::new(),
        }
    }
}

impl CatalogConfig {
    pub fn carriers(&self) -> CarrierProducts {
        CarrierProducts {
            shipping: ProductId::new(self.shipping_product_id.as_str()),
            donation: ProductId::new(self.donation_product_id.as_str()),
        }
    }

    pub fn modern_product_id(&self, product: &ModernProduct) -> Option<ProductId> {
        self.modern_products
            .get(&product.key())
            .map(|id| ProductId::new(id.as_str()))
    }

    /// Ids of every configured modern product.
    pub fn modern_product_ids(&self) -> Vec<ProductId> {
        ModernProduct::ALL
            .iter()
            .filter_map(|p| self.modern_product_id(p))
            .collect()
    }

    pub fn historical_catalog_product(&self) -> Option<ProductId> {
        self.historical_catalog_product_id
            .as_deref()
            .map(ProductId::new)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.shipping_product_id.is_empty() {
            return Err(ValidationError::MissingRequired("CATALOG__SHIPPING_PRODUCT_ID"));
        }
        if self.donation_product_id.is_empty() {
            return Err(ValidationError::MissingRequired("CATALOG__DONATION_PRODUCT_ID"));
        }
        for (key, id) in &self.modern_products {
            if !ModernProduct::ALL.iter().any(|p| &p.key() == key) {
                return Err(ValidationError::UnknownModernProduct(key.clone()));
            }
            if !ProductId::has_prefix(id) {
                return Err(ValidationError::InvalidProductId(key.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::legacy::Selection;

    fn valid() -> CatalogConfig {
        CatalogConfig {
            shipping_product_id: "prod_shipping".to_string(),
            donation_product_id: "prod_donation".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_carriers_from_ids() {
        let carriers = valid().carriers();
        assert_eq!(carriers.shipping.as_str(), "prod_shipping");
        assert_eq!(carriers.donation.as_str(), "prod_donation");
    }

    #[test]
    fn test_modern_product_lookup_by_key() {
        let mut config = valid();
        config
            .modern_products
            .insert("classics_annual".to_string(), "prod_ca".to_string());

        let classics = ModernProduct::new(Selection::Classics, true);
        assert_eq!(config.modern_product_id(&classics), Some(ProductId::new("prod_ca")));
        assert_eq!(config.modern_product_ids().len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_unknown_key() {
        let mut config = valid();
        config
            .modern_products
            .insert("poetry_monthly".to_string(), "prod_x".to_string());
        assert!(matches!(
            config.validate(),
            Err(ValidationError::UnknownModernProduct(_))
        ));
    }

    #[test]
    fn test_validation_requires_carriers() {
        assert!(CatalogConfig::default().validate().is_err());
    }
}
