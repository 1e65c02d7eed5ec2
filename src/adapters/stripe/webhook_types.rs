//! Stripe-specific wire types.
//!
//! These types represent Stripe API objects as they arrive in API responses
//! and webhook payloads. They are designed to:
//! - Parse actual Stripe JSON accurately
//! - Map to domain types at this edge only
//! - Support idempotency via event IDs

use serde::{Deserialize, Serialize};

use crate::domain::catalog::{BillingInterval, Currency, Money, Price, Product, Recurrence};
use crate::domain::foundation::{
    CouponId, CustomerId, Metadata, PriceId, ProductId, PromotionCodeId, SubscriptionId,
    SubscriptionItemId,
};
use crate::domain::gift::PromotionCode;
use crate::domain::subscription::{
    Coupon, CouponDuration, Discount, Subscription, SubscriptionItem, SubscriptionStatus,
};
use crate::ports::{Customer, PaymentError};

// ════════════════════════════════════════════════════════════════════════════════
// Signature Parsing
// ════════════════════════════════════════════════════════════════════════════════

/// Error parsing the Stripe-Signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureParseError {
    /// Header is empty or missing.
    MissingHeader,
    /// Missing timestamp component (t=...).
    MissingTimestamp,
    /// Missing v1 signature component.
    MissingV1Signature,
    /// Invalid timestamp format.
    InvalidTimestamp,
    /// Invalid signature format (not valid hex).
    InvalidSignatureFormat,
}

impl std::fmt::Display for SignatureParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingHeader => write!(f, "Missing Stripe-Signature header"),
            Self::MissingTimestamp => write!(f, "Missing timestamp (t=) in signature"),
            Self::MissingV1Signature => write!(f, "Missing v1 signature in header"),
            Self::InvalidTimestamp => write!(f, "Invalid timestamp format"),
            Self::InvalidSignatureFormat => write!(f, "Invalid signature format (not valid hex)"),
        }
    }
}

impl std::error::Error for SignatureParseError {}

/// Parsed Stripe-Signature header components.
///
/// The header format is: `t=timestamp,v1=signature[,v1=rotated_signature]`.
/// During secret rotation Stripe sends one `v1` per active secret.
#[derive(Debug, Clone)]
pub struct SignatureHeader {
    /// Unix timestamp when Stripe generated the event.
    pub timestamp: i64,

    /// v1 signatures (HMAC-SHA256, hex-decoded).
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, SignatureParseError> {
        if header.trim().is_empty() {
            return Err(SignatureParseError::MissingHeader);
        }

        let mut timestamp: Option<i64> = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .split_once('=')
                .ok_or(SignatureParseError::MissingTimestamp)?;

            match key.trim() {
                "t" => {
                    timestamp = Some(
                        value
                            .trim()
                            .parse()
                            .map_err(|_| SignatureParseError::InvalidTimestamp)?,
                    );
                }
                "v1" => {
                    v1_signatures.push(
                        hex_decode(value.trim()).ok_or(SignatureParseError::InvalidSignatureFormat)?,
                    );
                }
                // v0 and unknown schemes are ignored
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(SignatureParseError::MissingTimestamp)?;
        if v1_signatures.is_empty() {
            return Err(SignatureParseError::MissingV1Signature);
        }

        Ok(Self {
            timestamp,
            v1_signatures,
        })
    }
}

fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }

    let mut bytes = Vec::with_capacity(hex.len() / 2);
    for i in (0..hex.len()).step_by(2) {
        let byte = u8::from_str_radix(hex.get(i..i + 2)?, 16).ok()?;
        bytes.push(byte);
    }
    Some(bytes)
}

/// Encode bytes to hex string.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

// ════════════════════════════════════════════════════════════════════════════════
// Stripe Event Types
// ════════════════════════════════════════════════════════════════════════════════

/// Raw Stripe webhook event as received from the API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeWebhookEvent {
    /// Unique event identifier (evt_...).
    pub id: String,

    /// Event type (e.g., "customer.subscription.updated").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix timestamp when the event was created.
    pub created: i64,

    pub data: StripeEventData,

    pub livemode: bool,

    pub api_version: Option<String>,
}

/// Event data container.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    /// The object affected by this event.
    pub object: serde_json::Value,

    /// Previous values for updated fields (on update events).
    pub previous_attributes: Option<serde_json::Value>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Stripe Object Types
// ════════════════════════════════════════════════════════════════════════════════

/// Paginated list or search result.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,

    #[serde(default)]
    pub has_more: bool,

    /// Cursor for search endpoints.
    pub next_page: Option<String>,
}

/// Stripe Customer object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCustomer {
    /// Unique customer identifier (cus_...).
    pub id: String,

    pub email: Option<String>,

    pub name: Option<String>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Deleted customers are still returned by retrieve.
    #[serde(default)]
    pub deleted: bool,
}

/// Stripe Product object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeProduct {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default)]
    pub metadata: Metadata,
}

/// A product reference: an id, or the object when expanded.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StripeProductRef {
    Id(String),
    Expanded(StripeProduct),
}

impl StripeProductRef {
    pub fn id(&self) -> &str {
        match self {
            StripeProductRef::Id(id) => id,
            StripeProductRef::Expanded(product) => &product.id,
        }
    }

    fn expanded(&self) -> Option<&StripeProduct> {
        match self {
            StripeProductRef::Id(_) => None,
            StripeProductRef::Expanded(product) => Some(product),
        }
    }
}

/// Stripe Price object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePrice {
    pub id: String,

    pub product: StripeProductRef,

    /// Unit amount in minor units.
    pub unit_amount: Option<i64>,

    /// Currency (lowercase, e.g., "gbp").
    pub currency: String,

    pub recurring: Option<StripePriceRecurring>,

    pub nickname: Option<String>,

    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default)]
    pub metadata: Metadata,
}

/// Price recurring configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePriceRecurring {
    /// Billing interval (day, week, month, year).
    pub interval: String,

    pub interval_count: u32,
}

/// Stripe Subscription object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscription {
    /// Unique subscription identifier (sub_...).
    pub id: String,

    pub customer: String,

    pub status: String,

    #[serde(default)]
    pub created: i64,

    #[serde(default)]
    pub metadata: Metadata,

    #[serde(default)]
    pub items: StripeSubscriptionItems,

    pub discount: Option<StripeDiscount>,
}

/// Subscription items container.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StripeSubscriptionItems {
    #[serde(default)]
    pub data: Vec<StripeSubscriptionItem>,
}

/// Single subscription item.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscriptionItem {
    pub id: String,

    pub price: StripePrice,

    #[serde(default = "default_quantity")]
    pub quantity: u64,

    #[serde(default)]
    pub metadata: Metadata,
}

fn default_quantity() -> u64 {
    1
}

fn default_true() -> bool {
    true
}

/// Discount applied to a subscription.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeDiscount {
    pub coupon: StripeCoupon,

    pub promotion_code: Option<String>,
}

/// Stripe Coupon object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCoupon {
    pub id: String,

    pub name: Option<String>,

    pub percent_off: Option<f64>,

    /// once, repeating or forever.
    pub duration: String,

    pub duration_in_months: Option<u32>,

    pub applies_to: Option<StripeCouponAppliesTo>,

    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCouponAppliesTo {
    #[serde(default)]
    pub products: Vec<String>,
}

/// Stripe PromotionCode object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePromotionCode {
    /// Unique identifier (promo_...).
    pub id: String,

    /// Customer-facing code.
    pub code: String,

    pub coupon: StripeCoupon,

    pub active: bool,

    pub max_redemptions: Option<u32>,

    #[serde(default)]
    pub times_redeemed: u32,

    #[serde(default)]
    pub metadata: Metadata,
}

/// Any object that only needs its id read back.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeObjectRef {
    pub id: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Domain Conversion
// ════════════════════════════════════════════════════════════════════════════════

fn invalid_object(what: &str, detail: impl std::fmt::Display) -> PaymentError {
    PaymentError::provider(format!("Unexpected Stripe {}: {}", what, detail))
}

impl StripePrice {
    /// Converts a recurring price. One-time prices are not billable here.
    pub fn to_domain(&self) -> Result<Price, PaymentError> {
        let recurring = self
            .recurring
            .as_ref()
            .ok_or_else(|| invalid_object("price", format!("{} is not recurring", self.id)))?;
        let interval = BillingInterval::parse(&recurring.interval)
            .map_err(|e| invalid_object("price", e))?;
        let recurrence = Recurrence::new(interval, recurring.interval_count)
            .map_err(|e| invalid_object("price", e))?;
        let currency = Currency::new(&self.currency).map_err(|e| invalid_object("price", e))?;

        Ok(Price {
            id: PriceId::new(self.id.as_str()),
            product: ProductId::new(self.product.id()),
            unit_amount: Money::new(self.unit_amount.unwrap_or(0), currency),
            recurrence,
            nickname: self.nickname.clone(),
            active: self.active,
            metadata: self.metadata.clone(),
        })
    }
}

impl StripeProduct {
    pub fn to_domain(&self, prices: Vec<Price>) -> Product {
        Product {
            id: ProductId::new(self.id.as_str()),
            name: self.name.clone(),
            active: self.active,
            metadata: self.metadata.clone(),
            prices,
        }
    }
}

impl StripeCoupon {
    pub fn to_domain(&self) -> Coupon {
        let duration = match (self.duration.as_str(), self.duration_in_months) {
            ("repeating", Some(months)) => CouponDuration::Repeating { months },
            ("forever", _) => CouponDuration::Forever,
            _ => CouponDuration::Once,
        };
        Coupon {
            id: CouponId::new(self.id.as_str()),
            name: self.name.clone(),
            percent_off: self.percent_off.map(|p| p.round() as u32),
            duration,
            applies_to: self
                .applies_to
                .iter()
                .flat_map(|a| a.products.iter())
                .map(|p| ProductId::new(p.as_str()))
                .collect(),
            metadata: self.metadata.clone(),
        }
    }
}

impl StripePromotionCode {
    pub fn to_domain(&self) -> PromotionCode {
        PromotionCode {
            id: PromotionCodeId::new(self.id.as_str()),
            code: self.code.clone(),
            coupon: self.coupon.to_domain(),
            active: self.active,
            max_redemptions: self.max_redemptions,
            times_redeemed: self.times_redeemed,
            metadata: self.metadata.clone(),
        }
    }
}

impl StripeSubscription {
    /// Converts with item products expanded when Stripe returned them so.
    pub fn to_domain(&self) -> Result<Subscription, PaymentError> {
        let items = self
            .items
            .data
            .iter()
            .map(|item| {
                let product = item.price.product.expanded();
                Ok(SubscriptionItem {
                    id: SubscriptionItemId::new(item.id.as_str()),
                    price: item.price.to_domain()?,
                    quantity: item.quantity,
                    metadata: item.metadata.clone(),
                    product_name: product.map(|p| p.name.clone()),
                    product_metadata: product.map(|p| p.metadata.clone()).unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>, PaymentError>>()?;

        Ok(Subscription {
            id: SubscriptionId::new(self.id.as_str()),
            customer: CustomerId::new(self.customer.as_str()),
            status: SubscriptionStatus::parse(&self.status),
            items,
            metadata: self.metadata.clone(),
            discount: self.discount.as_ref().map(|d| Discount {
                coupon: d.coupon.to_domain(),
                promotion_code: d
                    .promotion_code
                    .as_deref()
                    .map(PromotionCodeId::new),
            }),
            created: self.created,
        })
    }
}

impl StripeCustomer {
    pub fn to_domain(&self) -> Customer {
        Customer {
            id: CustomerId::new(self.id.as_str()),
            email: self.email.clone(),
            name: self.name.clone(),
            metadata: self.metadata.clone(),
        }
    }
}
