//! GiftCodeIssuer - gift coupons and the giver side of the gift link.
//!
//! # Link protocol
//!
//! 1. Flag the giver subscription `gift_mode`.
//! 2. Get or create the 100%-off coupon for the giver's product.
//! 3. Mint a promotion code whose metadata names the giver.
//! 4. Write the code id back onto the giver as `promo_code`.
//!
//! Step 4 is logged at error level when it fails after step 3 succeeded,
//! leaving a code that resolves to a giver which does not point back.

use std::sync::Arc;

use crate::config::{CatalogConfig, GiftConfig};
use crate::domain::catalog::Product;
use crate::domain::errors::BillingError;
use crate::domain::foundation::{Metadata, ProductId, SubscriptionId, UserId, ValidationError};
use crate::domain::gift::{gift_code_metadata, gift_coupon_name, PromotionCode};
use crate::domain::subscription::{Coupon, CouponDuration, Subscription, SubscriptionMetadata};
use crate::ports::{
    BillingProvider, CreateCouponRequest, CreateProductRequest, CreatePromotionCodeRequest,
    SubscriptionCache,
};

const GIFT_PRODUCT_KEY: &str = "gift_product_id";
const RELATED_USER_KEY: &str = "related_user";
const SHIPPING_FLAG: &str = "shipping";

/// Gift settings, usually taken from `GiftConfig` and `CatalogConfig`.
#[derive(Debug, Clone)]
pub struct GiftSettings {
    pub coupon_name_prefix: String,
    pub max_redemptions: u32,
    pub shipping_product_name: String,
}

impl GiftSettings {
    pub fn from_config(gift: &GiftConfig, catalog: &CatalogConfig) -> Self {
        Self {
            coupon_name_prefix: gift.coupon_name_prefix.clone(),
            max_redemptions: gift.max_redemptions,
            shipping_product_name: catalog.shipping_product_name.clone(),
        }
    }
}

impl Default for GiftSettings {
    fn default() -> Self {
        Self {
            coupon_name_prefix: "Gift Card: ".to_string(),
            max_redemptions: 1,
            shipping_product_name: "Shipping".to_string(),
        }
    }
}

/// How to mint the code for one giver.
#[derive(Debug, Clone, Default)]
pub struct ConfigureGiver {
    /// User who bought the gift.
    pub related_user: Option<UserId>,
    /// Customer-facing code; the provider generates one when absent.
    pub code: Option<String>,
    /// Written on both the code and the giver subscription.
    pub metadata: Metadata,
}

pub struct GiftCodeIssuer {
    provider: Arc<dyn BillingProvider>,
    cache: Arc<dyn SubscriptionCache>,
    settings: GiftSettings,
}

impl GiftCodeIssuer {
    pub fn new(
        provider: Arc<dyn BillingProvider>,
        cache: Arc<dyn SubscriptionCache>,
        settings: GiftSettings,
    ) -> Self {
        Self {
            provider,
            cache,
            settings,
        }
    }

    pub fn settings(&self) -> &GiftSettings {
        &self.settings
    }

    /// The shipping product, created on first use.
    pub async fn shipping_product(&self) -> Result<Product, BillingError> {
        let name = &self.settings.shipping_product_name;
        let existing = self
            .provider
            .search_products_by_metadata(SHIPPING_FLAG, "true")
            .await?
            .into_iter()
            .find(|p| p.active && p.name.eq_ignore_ascii_case(name));
        if let Some(product) = existing {
            return Ok(product);
        }

        let mut metadata = Metadata::new();
        metadata.insert(SHIPPING_FLAG.into(), "true".into());
        let product = self
            .provider
            .create_product(CreateProductRequest {
                name: name.clone(),
                unit_label: Some("delivery".into()),
                metadata,
            })
            .await?;
        tracing::info!(product_id = %product.id, "Shipping product created");
        Ok(product)
    }

    /// The gift coupon for `product`, without creating one.
    pub async fn find_gift_coupon(&self, product: &ProductId) -> Result<Option<Coupon>, BillingError> {
        Ok(self
            .provider
            .find_coupons_by_metadata(GIFT_PRODUCT_KEY, product.as_str())
            .await?
            .into_iter()
            .next())
    }

    /// The gift coupon for `product`, created on first use.
    ///
    /// Covers the product and the shipping product in full, forever.
    pub async fn gift_coupon_for(&self, product: &ProductId) -> Result<Coupon, BillingError> {
        if let Some(coupon) = self.find_gift_coupon(product).await? {
            return Ok(coupon);
        }

        let membership = self.provider.retrieve_product(product).await?.ok_or_else(|| {
            ValidationError::invalid_format("product_id", format!("unknown product {}", product))
        })?;
        let shipping = self.shipping_product().await?;

        let mut metadata = Metadata::new();
        metadata.insert(GIFT_PRODUCT_KEY.into(), product.to_string());
        let coupon = self
            .provider
            .create_coupon(CreateCouponRequest {
                name: gift_coupon_name(&self.settings.coupon_name_prefix, &membership.name),
                percent_off: 100,
                duration: CouponDuration::Forever,
                applies_to: vec![product.clone(), shipping.id],
                metadata,
            })
            .await?;
        tracing::info!(coupon_id = %coupon.id, product_id = %product, "Gift coupon created");
        Ok(coupon)
    }

    /// Turns `giver` into a gift and mints its code.
    pub async fn configure_giver(
        &self,
        giver: &SubscriptionId,
        request: ConfigureGiver,
    ) -> Result<(PromotionCode, Subscription), BillingError> {
        let flagged = self
            .provider
            .update_subscription_metadata(
                giver,
                SubscriptionMetadata {
                    gift_mode: true,
                    ..SubscriptionMetadata::default()
                }
                .to_metadata(),
            )
            .await?;
        self.cache.sync(&flagged).await?;

        let product = flagged
            .primary_product()
            .cloned()
            .ok_or_else(|| BillingError::invalid_state(giver, "no giftable product"))?;
        let coupon = self.gift_coupon_for(&product).await?;

        let mut code_metadata = request.metadata.clone();
        if let Some(user) = &request.related_user {
            code_metadata.insert(RELATED_USER_KEY.into(), user.to_string());
        }
        let code = self
            .provider
            .create_promotion_code(CreatePromotionCodeRequest {
                coupon: coupon.id.clone(),
                code: request.code.clone(),
                max_redemptions: self.settings.max_redemptions,
                metadata: gift_code_metadata(giver, &code_metadata),
            })
            .await?;

        let mut patch = request.metadata;
        patch.extend(SubscriptionMetadata::promo_code_patch(&code.id));
        let linked = match self.provider.update_subscription_metadata(giver, patch).await {
            Ok(linked) => linked,
            Err(err) => {
                tracing::error!(
                    subscription_id = %giver,
                    promotion_code_id = %code.id,
                    error = %err,
                    "Gift code minted but not linked to its giver"
                );
                return Err(err.into());
            }
        };
        self.cache.sync(&linked).await?;

        tracing::info!(
            subscription_id = %giver,
            promotion_code_id = %code.id,
            code = %code.code,
            "Gift code minted"
        );
        Ok((code, linked))
    }
}
