//! Gift code value objects.
//!
//! A gift is identified to the recipient by a human-enterable code
//! (e.g. `GIFT-A7K9M3`). Internally the provider also assigns a
//! `promo_` id. Lookups accept either.
//!
//! # Validation Rules
//!
//! - 3-40 characters after trimming
//! - ASCII letters, digits, `-` and `_`
//! - Normalised to uppercase; the provider matches codes case-insensitively

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    Metadata, PromotionCodeId, SubscriptionId, ValidationError,
};
use crate::domain::subscription::Coupon;

const MIN_LEN: usize = 3;
const MAX_LEN: usize = 40;

/// Metadata key linking a promotion code to its giver subscription. Its
/// presence is also what marks the code as a gift code.
pub const GIFT_GIVER_SUBSCRIPTION_KEY: &str = "gift_giver_subscription";

/// A validated customer-facing code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GiftCode(String);

impl GiftCode {
    pub fn try_new(code: &str) -> Result<Self, ValidationError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ValidationError::empty_field("gift_code"));
        }
        if code.len() < MIN_LEN || code.len() > MAX_LEN {
            return Err(ValidationError::out_of_range(
                "gift_code_length",
                MIN_LEN as i64,
                MAX_LEN as i64,
                code.len() as i64,
            ));
        }
        if !code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::invalid_format(
                "gift_code",
                "letters, digits, '-' and '_' only",
            ));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GiftCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for GiftCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_new(&value)
    }
}

impl From<GiftCode> for String {
    fn from(code: GiftCode) -> Self {
        code.0
    }
}

/// What the user typed: a provider id or a customer-facing code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GiftCodeRef {
    Id(PromotionCodeId),
    Code(GiftCode),
}

impl GiftCodeRef {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let input = input.trim();
        if PromotionCodeId::has_prefix(input) {
            return Ok(GiftCodeRef::Id(PromotionCodeId::new(input)));
        }
        GiftCode::try_new(input).map(GiftCodeRef::Code)
    }
}

impl std::fmt::Display for GiftCodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GiftCodeRef::Id(id) => write!(f, "{}", id),
            GiftCodeRef::Code(code) => write!(f, "{}", code),
        }
    }
}

/// A promotion code as held by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionCode {
    pub id: PromotionCodeId,
    /// Customer-facing code.
    pub code: String,
    pub coupon: Coupon,
    pub active: bool,
    pub max_redemptions: Option<u32>,
    pub times_redeemed: u32,
    #[serde(default)]
    pub metadata: Metadata,
}

impl PromotionCode {
    /// True if this code was minted for a gift.
    pub fn is_gift_code(&self) -> bool {
        self.giver_subscription().is_some()
    }

    pub fn giver_subscription(&self) -> Option<SubscriptionId> {
        self.metadata
            .get(GIFT_GIVER_SUBSCRIPTION_KEY)
            .filter(|v| !v.is_empty())
            .map(|v| SubscriptionId::new(v.as_str()))
    }

    /// Redemptions remain only when a limit is set and not yet reached.
    pub fn has_redemptions_left(&self) -> bool {
        self.max_redemptions
            .map_or(false, |max| max > self.times_redeemed)
    }

    pub fn matches(&self, reference: &GiftCodeRef) -> bool {
        match reference {
            GiftCodeRef::Id(id) => &self.id == id,
            GiftCodeRef::Code(code) => self.code.eq_ignore_ascii_case(code.as_str()),
        }
    }
}

/// Metadata for a newly minted gift promotion code.
pub fn gift_code_metadata(giver: &SubscriptionId, extra: &Metadata) -> Metadata {
    let mut metadata = extra.clone();
    metadata.insert(GIFT_GIVER_SUBSCRIPTION_KEY.to_string(), giver.to_string());
    metadata
}
