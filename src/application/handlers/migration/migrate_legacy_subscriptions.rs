//! MigrateLegacySubscriptionsJob - moves pre-redesign memberships onto the
//! modern products.
//!
//! A subscription qualifies when its membership item bills a product outside
//! the modern catalog. The legacy product name (or, for the historical
//! catalog product, the price nickname) is classified into a modern product.
//! A price carrying the legacy provenance is found or created on that
//! product, the provenance is written to the subscription, and the item is
//! swapped create-then-delete.
//!
//! Unclassifiable names are logged and left alone.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::application::handlers::subscription::SubscriptionMutationEngine;
use crate::config::CatalogConfig;
use crate::domain::catalog::Price;
use crate::domain::errors::BillingError;
use crate::domain::foundation::{Metadata, ProductId};
use crate::domain::legacy::{classify, Classification, ModernProduct};
use crate::domain::subscription::{ItemRole, LegacyProvenance, Subscription, SubscriptionItem};
use crate::ports::{
    BillingProvider, CreatePriceRequest, NewSubscriptionItem, SubscriptionCache,
    SubscriptionFilter,
};

use super::{BatchReport, JobOptions, RecordOutcome};

pub const JOB_NAME: &str = "migrate_legacy_subscriptions";

const LEGACY_PLAN_ID_KEY: &str = "legacy_stripe_plan_id";

/// Modern membership products and the historical catalog product.
#[derive(Debug, Clone, Default)]
pub struct LegacyProductMap {
    targets: Vec<(ModernProduct, ProductId)>,
    historical: Option<ProductId>,
}

impl LegacyProductMap {
    pub fn from_config(catalog: &CatalogConfig) -> Self {
        Self {
            targets: ModernProduct::ALL
                .iter()
                .filter_map(|p| catalog.modern_product_id(p).map(|id| (*p, id)))
                .collect(),
            historical: catalog.historical_catalog_product(),
        }
    }

    pub fn target(&self, product: &ModernProduct) -> Option<&ProductId> {
        self.targets
            .iter()
            .find(|(p, _)| p == product)
            .map(|(_, id)| id)
    }

    pub fn is_modern(&self, product: &ProductId) -> bool {
        self.targets.iter().any(|(_, id)| id == product)
    }

    fn valid_products(&self) -> BTreeSet<&ProductId> {
        self.targets.iter().map(|(_, id)| id).collect()
    }

    /// Name the legacy item is classified by.
    fn legacy_name(&self, item: &SubscriptionItem) -> Option<String> {
        if self.historical.as_ref() == Some(item.product()) {
            item.price.nickname.clone()
        } else {
            item.product_name.clone()
        }
    }
}

pub struct MigrateLegacySubscriptionsJob {
    provider: Arc<dyn BillingProvider>,
    cache: Arc<dyn SubscriptionCache>,
    engine: Arc<SubscriptionMutationEngine>,
    products: LegacyProductMap,
}

impl MigrateLegacySubscriptionsJob {
    pub fn new(
        provider: Arc<dyn BillingProvider>,
        cache: Arc<dyn SubscriptionCache>,
        engine: Arc<SubscriptionMutationEngine>,
        products: LegacyProductMap,
    ) -> Self {
        Self {
            provider,
            cache,
            engine,
            products,
        }
    }

    pub async fn run(&self, options: &JobOptions) -> Result<BatchReport, BillingError> {
        let mut report = BatchReport::new(JOB_NAME, options.dry_run);
        let valid = self.products.valid_products();

        let candidates: Vec<Subscription> = self
            .provider
            .list_subscriptions(SubscriptionFilter {
                product: options.product.clone(),
                ..SubscriptionFilter::default()
            })
            .await?
            .into_iter()
            .filter(|s| options.selects(&s.id))
            .filter(|s| s.primary_product().map_or(false, |p| !valid.contains(p)))
            .take(options.limit())
            .collect();

        for sub in candidates {
            let result = self.migrate_one(&sub, options.dry_run).await;
            report.record(sub.id.as_str(), result);
        }
        Ok(report.finish())
    }

    async fn migrate_one(
        &self,
        sub: &Subscription,
        dry_run: bool,
    ) -> Result<RecordOutcome, BillingError> {
        let current = self.engine.refresh(&sub.id).await?;
        if current.status.is_terminal() {
            return Ok(RecordOutcome::skipped(format!("subscription is {}", current.status)));
        }
        let Some(item) = current.item_for(ItemRole::Membership) else {
            return Ok(RecordOutcome::skipped("no membership item"));
        };
        if self.products.is_modern(item.product()) {
            return Ok(RecordOutcome::skipped("already on a modern product"));
        }

        let Some(name) = self.products.legacy_name(item) else {
            tracing::warn!(
                subscription_id = %current.id,
                product_id = %item.product(),
                "Legacy item has no name to classify"
            );
            return Ok(RecordOutcome::skipped("legacy item has no name"));
        };
        let classification = match classify(&name, item.price.recurrence.interval) {
            Ok(classification) => classification,
            Err(err) => {
                tracing::warn!(
                    subscription_id = %current.id,
                    product_id = %item.product(),
                    legacy_name = %name,
                    "Legacy product could not be classified"
                );
                return Ok(RecordOutcome::skipped(err.to_string()));
            }
        };
        let Some(target) = self.products.target(&classification.product) else {
            return Ok(RecordOutcome::skipped(format!(
                "modern product {} not configured",
                classification.product
            )));
        };

        let provenance = LegacyProvenance {
            subscription_name: classification.legacy_name.clone(),
            product_id: item.product().to_string(),
            product_name: item.product_name.clone().unwrap_or_default(),
            plan_id: item.price.id.to_string(),
            plan_name: item.price.nickname.clone().unwrap_or_default(),
        };

        let existing = self.find_migrated_price(&provenance.plan_id, target).await?;
        if dry_run {
            return Ok(RecordOutcome::Migrated);
        }
        let price = match existing {
            Some(price) => price,
            None => {
                self.create_migrated_price(item, target, &classification, &provenance)
                    .await?
            }
        };

        let mut metadata = Metadata::new();
        provenance.write_into(&mut metadata);
        let updated = self
            .provider
            .update_subscription_metadata(&current.id, metadata)
            .await?;
        self.cache.sync(&updated).await?;

        let mut replacement =
            NewSubscriptionItem::existing(price.id.clone(), ItemRole::Membership.item_tags());
        replacement.quantity = item.quantity;
        self.engine
            .swap_item(&current.id, &item.id, replacement)
            .await?;

        tracing::info!(
            subscription_id = %current.id,
            legacy_product = %item.product(),
            modern_product = %target,
            price_id = %price.id,
            "Legacy subscription migrated"
        );
        Ok(RecordOutcome::Migrated)
    }

    /// A price already re-created for this legacy plan on `target`.
    async fn find_migrated_price(
        &self,
        plan_id: &str,
        target: &ProductId,
    ) -> Result<Option<Price>, BillingError> {
        Ok(self
            .provider
            .search_prices_by_metadata(LEGACY_PLAN_ID_KEY, plan_id)
            .await?
            .into_iter()
            .find(|p| &p.product == target && p.active))
    }

    async fn create_migrated_price(
        &self,
        item: &SubscriptionItem,
        target: &ProductId,
        classification: &Classification,
        provenance: &LegacyProvenance,
    ) -> Result<Price, BillingError> {
        let mut metadata = classification.flag_metadata();
        provenance.write_into(&mut metadata);
        let price = self
            .provider
            .create_price(CreatePriceRequest {
                product: target.clone(),
                unit_amount: item.price.unit_amount.clone(),
                recurrence: item.price.recurrence,
                nickname: Some(classification.nickname()),
                metadata,
            })
            .await?;
        tracing::info!(
            price_id = %price.id,
            product_id = %target,
            legacy_plan_id = %provenance.plan_id,
            "Legacy price re-created"
        );
        Ok(price)
    }
}
