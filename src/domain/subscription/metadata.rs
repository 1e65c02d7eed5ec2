//! Typed view over subscription metadata.
//!
//! The provider merges metadata writes key by key, so `to_metadata` only
//! emits the keys that are set. A patch built from a fresh
//! `SubscriptionMetadata` therefore never clears unrelated keys.

use crate::domain::foundation::{Metadata, PromotionCodeId, SubscriptionId};

const GIFT_MODE: &str = "gift_mode";
const PROMO_CODE: &str = "promo_code";
const GIFT_GIVER_SUBSCRIPTION: &str = "gift_giver_subscription";
const GIFT_RECIPIENT_SUBSCRIPTION: &str = "gift_recipient_subscription";
const PROCESSED: &str = "processed";

const LEGACY_SUBSCRIPTION_NAME: &str = "legacy_subscription_name";
const LEGACY_PRODUCT_ID: &str = "legacy_stripe_product_id";
const LEGACY_PRODUCT_NAME: &str = "legacy_stripe_product_name";
const LEGACY_PLAN_ID: &str = "legacy_stripe_plan_id";
const LEGACY_PLAN_NAME: &str = "legacy_stripe_plan_name";

const KNOWN_KEYS: [&str; 10] = [
    GIFT_MODE,
    PROMO_CODE,
    GIFT_GIVER_SUBSCRIPTION,
    GIFT_RECIPIENT_SUBSCRIPTION,
    PROCESSED,
    LEGACY_SUBSCRIPTION_NAME,
    LEGACY_PRODUCT_ID,
    LEGACY_PRODUCT_NAME,
    LEGACY_PLAN_ID,
    LEGACY_PLAN_NAME,
];

/// Where a migrated subscription came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyProvenance {
    pub subscription_name: String,
    pub product_id: String,
    pub product_name: String,
    pub plan_id: String,
    pub plan_name: String,
}

impl LegacyProvenance {
    /// Writes the provenance keys into `metadata`.
    pub fn write_into(&self, metadata: &mut Metadata) {
        metadata.insert(LEGACY_SUBSCRIPTION_NAME.into(), self.subscription_name.clone());
        metadata.insert(LEGACY_PRODUCT_ID.into(), self.product_id.clone());
        metadata.insert(LEGACY_PRODUCT_NAME.into(), self.product_name.clone());
        metadata.insert(LEGACY_PLAN_ID.into(), self.plan_id.clone());
        metadata.insert(LEGACY_PLAN_NAME.into(), self.plan_name.clone());
    }

    fn read(metadata: &Metadata) -> Option<Self> {
        let plan_id = metadata.get(LEGACY_PLAN_ID)?.clone();
        let get = |key: &str| metadata.get(key).cloned().unwrap_or_default();
        Some(Self {
            subscription_name: get(LEGACY_SUBSCRIPTION_NAME),
            product_id: get(LEGACY_PRODUCT_ID),
            product_name: get(LEGACY_PRODUCT_NAME),
            plan_id,
            plan_name: get(LEGACY_PLAN_NAME),
        })
    }
}

/// Role and linkage keys of a subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionMetadata {
    /// Purchased as a gift; never counts as the purchaser's membership.
    pub gift_mode: bool,
    /// Promotion code minted for this gift.
    pub promo_code: Option<PromotionCodeId>,
    /// On a recipient subscription: the giver it was redeemed from.
    pub gift_giver_subscription: Option<SubscriptionId>,
    /// On a giver subscription: the recipient created at redemption.
    pub gift_recipient_subscription: Option<SubscriptionId>,
    /// One-off side-effect jobs have run.
    pub processed: bool,
    pub legacy: Option<LegacyProvenance>,
    /// Keys this crate does not interpret, kept as-is.
    pub extra: Metadata,
}

impl SubscriptionMetadata {
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let id = |key: &str| metadata.get(key).filter(|v| !v.is_empty()).cloned();
        Self {
            gift_mode: is_truthy(metadata.get(GIFT_MODE)),
            promo_code: id(PROMO_CODE).map(PromotionCodeId::new),
            gift_giver_subscription: id(GIFT_GIVER_SUBSCRIPTION).map(SubscriptionId::new),
            gift_recipient_subscription: id(GIFT_RECIPIENT_SUBSCRIPTION).map(SubscriptionId::new),
            processed: is_truthy(metadata.get(PROCESSED)),
            legacy: LegacyProvenance::read(metadata),
            extra: metadata
                .iter()
                .filter(|(k, _)| !KNOWN_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    pub fn to_metadata(&self) -> Metadata {
        let mut metadata = self.extra.clone();
        if self.gift_mode {
            metadata.insert(GIFT_MODE.into(), "true".into());
        }
        if let Some(code) = &self.promo_code {
            metadata.insert(PROMO_CODE.into(), code.to_string());
        }
        if let Some(giver) = &self.gift_giver_subscription {
            metadata.insert(GIFT_GIVER_SUBSCRIPTION.into(), giver.to_string());
        }
        if let Some(recipient) = &self.gift_recipient_subscription {
            metadata.insert(GIFT_RECIPIENT_SUBSCRIPTION.into(), recipient.to_string());
        }
        if self.processed {
            metadata.insert(PROCESSED.into(), "true".into());
        }
        if let Some(legacy) = &self.legacy {
            legacy.write_into(&mut metadata);
        }
        metadata
    }

    /// Patch that only sets the promo code link.
    pub fn promo_code_patch(code: &PromotionCodeId) -> Metadata {
        Self {
            promo_code: Some(code.clone()),
            ..Self::default()
        }
        .to_metadata()
    }

    /// Patch that only sets the forward link to a recipient.
    pub fn recipient_patch(recipient: &SubscriptionId) -> Metadata {
        Self {
            gift_recipient_subscription: Some(recipient.clone()),
            ..Self::default()
        }
        .to_metadata()
    }
}

fn is_truthy(value: Option<&String>) -> bool {
    value.map_or(false, |v| {
        !matches!(v.trim().to_ascii_lowercase().as_str(), "" | "false" | "0" | "none")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_gift_giver_keys() {
        let mut raw = Metadata::new();
        raw.insert("gift_mode".into(), "True".into());
        raw.insert("promo_code".into(), "promo_123".into());
        raw.insert("campaign".into(), "winter".into());

        let meta = SubscriptionMetadata::from_metadata(&raw);
        assert!(meta.gift_mode);
        assert_eq!(meta.promo_code.unwrap().as_str(), "promo_123");
        assert_eq!(meta.extra.get("campaign").unwrap(), "winter");
        assert!(meta.legacy.is_none());
    }

    #[test]
    fn false_like_flags_are_not_set() {
        let mut raw = Metadata::new();
        raw.insert("gift_mode".into(), "False".into());
        raw.insert("processed".into(), "".into());
        let meta = SubscriptionMetadata::from_metadata(&raw);
        assert!(!meta.gift_mode);
        assert!(!meta.processed);
    }

    #[test]
    fn patches_only_carry_their_key() {
        let patch = SubscriptionMetadata::promo_code_patch(&PromotionCodeId::new("promo_1"));
        assert_eq!(patch.len(), 1);
        assert_eq!(patch.get("promo_code").unwrap(), "promo_1");
    }

    #[test]
    fn legacy_provenance_round_trips() {
        let legacy = LegacyProvenance {
            subscription_name: "classic_annual".into(),
            product_id: "prod_old".into(),
            product_name: "Classic".into(),
            plan_id: "plan_old".into(),
            plan_name: "Classic yearly".into(),
        };
        let meta = SubscriptionMetadata {
            legacy: Some(legacy.clone()),
            ..Default::default()
        };
        let parsed = SubscriptionMetadata::from_metadata(&meta.to_metadata());
        assert_eq!(parsed.legacy, Some(legacy));
        assert!(parsed.extra.is_empty());
    }
}
