//! Stripe billing provider adapter.
//!
//! Implements the `BillingProvider` trait over the Stripe REST API.
//! Requests are form-encoded with Stripe's bracketed nesting
//! (`items[0][price_data][unit_amount]`).
//!
//! # Security
//!
//! - HMAC-SHA256 signature verification with constant-time comparison
//! - Timestamp validation (5-minute window) for replay attack prevention
//! - Secrets handled via `secrecy::SecretString`
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(api_key, webhook_secret);
//! let adapter = StripeBillingAdapter::new(config);
//! ```

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::catalog::{Price, Product};
use crate::domain::foundation::{
    CouponId, CustomerId, Metadata, PaymentMethodId, PriceId, ProductId, PromotionCodeId,
    SubscriptionId, SubscriptionItemId,
};
use crate::domain::gift::PromotionCode;
use crate::domain::subscription::{Coupon, CouponDuration, LineItem, Subscription};
use crate::ports::{
    BillingProvider, CreateCouponRequest, CreateCustomerRequest, CreatePaymentMethodRequest,
    CreatePriceRequest, CreateProductRequest, CreatePromotionCodeRequest,
    CreateSubscriptionRequest, Customer, ItemChange, ItemPrice, NewSubscriptionItem,
    PaymentError, PaymentErrorCode, ProrationBehavior, SubscriptionFilter, SubscriptionUpdate,
    WebhookEvent, WebhookEventType,
};

use super::webhook_types::{
    hex_encode, SignatureHeader, StripeCoupon, StripeCustomer, StripeList, StripeObjectRef,
    StripePrice, StripeProduct, StripePromotionCode, StripeSubscription, StripeWebhookEvent,
};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age for webhook events (5 minutes).
const MAX_TIMESTAMP_AGE_SECS: i64 = 300;

/// Clock skew tolerance for future timestamps (60 seconds).
const MAX_FUTURE_TOLERANCE_SECS: i64 = 60;

/// Page size for list endpoints.
const PAGE_LIMIT: &str = "100";

/// Expansion that lets item roles fall back to product tags.
const EXPAND_ITEM_PRODUCT: &str = "items.data.price.product";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Webhook signing secret (whsec_...).
    webhook_secret: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    /// Whether to require livemode events in production.
    require_livemode: bool,
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            webhook_secret: SecretString::new(webhook_secret.into()),
            api_base_url: "https://api.stripe.com".to_string(),
            require_livemode: false,
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Require livemode events in production.
    pub fn with_require_livemode(mut self, require: bool) -> Self {
        self.require_livemode = require;
        self
    }
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("api_base_url", &self.api_base_url)
            .field("require_livemode", &self.require_livemode)
            .finish_non_exhaustive()
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Form Encoding
// ════════════════════════════════════════════════════════════════════════════════

/// Ordered form parameters with Stripe's bracket nesting.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct FormParams(Vec<(String, String)>);

impl FormParams {
    fn push(&mut self, key: impl Into<String>, value: impl ToString) -> &mut Self {
        self.0.push((key.into(), value.to_string()));
        self
    }

    fn push_opt(&mut self, key: &str, value: Option<impl ToString>) -> &mut Self {
        if let Some(value) = value {
            self.push(key, value);
        }
        self
    }

    fn push_metadata(&mut self, prefix: &str, metadata: &Metadata) -> &mut Self {
        for (key, value) in metadata {
            self.push(format!("{}[{}]", prefix, key), value);
        }
        self
    }

    /// Inline price data and quantity for one line item under `prefix`.
    ///
    /// Inline prices cannot hold metadata, so role and zone tags go on the
    /// item.
    fn push_line_item(&mut self, prefix: &str, line: &LineItem) -> &mut Self {
        let price = &line.price_data;
        self.push(
            format!("{}[price_data][currency]", prefix),
            price.unit_amount.currency().as_str(),
        )
        .push(format!("{}[price_data][product]", prefix), &price.product)
        .push(
            format!("{}[price_data][unit_amount]", prefix),
            price.unit_amount.amount(),
        )
        .push(
            format!("{}[price_data][recurring][interval]", prefix),
            price.recurrence.interval.as_str(),
        )
        .push(
            format!("{}[price_data][recurring][interval_count]", prefix),
            price.recurrence.interval_count,
        )
        .push(format!("{}[quantity]", prefix), line.quantity)
        .push_metadata(&format!("{}[metadata]", prefix), &line.item_metadata())
    }

    pub(crate) fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    #[cfg(test)]
    fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

pub(crate) fn subscription_params(request: &CreateSubscriptionRequest) -> FormParams {
    let mut params = FormParams::default();
    params.push("customer", &request.customer);
    for (i, line) in request.items.iter().enumerate() {
        params.push_line_item(&format!("items[{}]", i), line);
    }
    params
        .push_metadata("metadata", &request.metadata)
        .push_opt("promotion_code", request.promotion_code.as_ref())
        .push_opt(
            "default_payment_method",
            request.default_payment_method.as_ref(),
        )
        .push("payment_behavior", request.payment_behavior.as_str())
        .push("expand[]", EXPAND_ITEM_PRODUCT);
    if request.off_session {
        params.push("off_session", "true");
    }
    params
}

pub(crate) fn update_params(update: &SubscriptionUpdate) -> FormParams {
    let mut params = FormParams::default();
    for (i, change) in update.changes.iter().enumerate() {
        let prefix = format!("items[{}]", i);
        match change {
            ItemChange::Add(line) => {
                params.push_line_item(&prefix, line);
            }
            ItemChange::Delete(id) => {
                params
                    .push(format!("{}[id]", prefix), id)
                    .push(format!("{}[deleted]", prefix), "true");
            }
        }
    }
    params
        .push("proration_behavior", update.proration.as_str())
        .push("expand[]", EXPAND_ITEM_PRODUCT);
    params
}

pub(crate) fn item_params(subscription: &SubscriptionId, item: &NewSubscriptionItem) -> FormParams {
    let mut params = FormParams::default();
    params.push("subscription", subscription);
    match &item.price {
        ItemPrice::Existing(price) => {
            params
                .push("price", price)
                .push("quantity", item.quantity)
                .push_metadata("metadata", &item.metadata);
        }
        ItemPrice::Inline(line) => {
            let mut inline = FormParams::default();
            inline.push_line_item("item", line);
            for (key, value) in inline.0 {
                // "item[price_data][x]" -> "price_data[x]"
                let key = key.trim_start_matches("item[").replacen(']', "", 1);
                if !key.starts_with("metadata") {
                    params.push(key, value);
                }
            }
            params.push_metadata("metadata", &item.metadata);
        }
    }
    params.push("proration_behavior", item.proration.as_str());
    params
}

fn coupon_params(request: &CreateCouponRequest) -> FormParams {
    let mut params = FormParams::default();
    params
        .push("name", &request.name)
        .push("percent_off", request.percent_off)
        .push("duration", request.duration.as_str());
    if let CouponDuration::Repeating { months } = request.duration {
        params.push("duration_in_months", months);
    }
    for (i, product) in request.applies_to.iter().enumerate() {
        params.push(format!("applies_to[products][{}]", i), product);
    }
    params.push_metadata("metadata", &request.metadata);
    params
}

// ════════════════════════════════════════════════════════════════════════════════
// Adapter
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe billing provider adapter.
pub struct StripeBillingAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripeBillingAdapter {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.api_base_url, path)
    }

    /// GET; a 404 is `Ok(None)`.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, PaymentError> {
        let response = self
            .http_client
            .get(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .query(query)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        read_json(response, path).await.map(Some)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &FormParams,
        idempotency_key: Option<&str>,
    ) -> Result<T, PaymentError> {
        let mut request = self
            .http_client
            .post(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(params.pairs());
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;
        read_json(response, path).await
    }

    async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, PaymentError> {
        let response = self
            .http_client
            .delete(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .query(query)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;
        read_json(response, path).await
    }

    /// Follows `starting_after` pagination of a list endpoint.
    async fn list_all<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<T>, PaymentError>
    where
        T: DeserializeOwned + HasId,
    {
        let mut out = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut page_query: Vec<(&str, &str)> = query.to_vec();
            page_query.push(("limit", PAGE_LIMIT));
            if let Some(after) = cursor.as_deref() {
                page_query.push(("starting_after", after));
            }
            let page: StripeList<T> = self
                .get(path, &page_query)
                .await?
                .ok_or_else(|| PaymentError::not_found(path))?;
            let has_more = page.has_more;
            cursor = page.data.last().map(|item| item.id().to_string());
            out.extend(page.data);
            if !has_more || cursor.is_none() {
                return Ok(out);
            }
        }
    }

    /// Follows `next_page` pagination of a search endpoint.
    async fn search_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &str,
    ) -> Result<Vec<T>, PaymentError> {
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut page_query = vec![("query", query), ("limit", PAGE_LIMIT)];
            if let Some(token) = page_token.as_deref() {
                page_query.push(("page", token));
            }
            let page: StripeList<T> = self
                .get(path, &page_query)
                .await?
                .ok_or_else(|| PaymentError::not_found(path))?;
            out.extend(page.data);
            match (page.has_more, page.next_page) {
                (true, Some(next)) => page_token = Some(next),
                _ => return Ok(out),
            }
        }
    }

    async fn product_with_prices(&self, product: StripeProduct) -> Result<Product, PaymentError> {
        let prices: Vec<StripePrice> = self
            .list_all("prices", &[("product", product.id.as_str()), ("active", "true")])
            .await?;
        Ok(product.to_domain(recurring_prices(&prices)))
    }

    /// Verify webhook signature using HMAC-SHA256.
    ///
    /// Any of the header's v1 signatures may match (secret rotation).
    fn verify_signature(&self, payload: &[u8], header: &SignatureHeader) -> Result<(), PaymentError> {
        let now = chrono::Utc::now().timestamp();
        let age = now - header.timestamp;

        if age > MAX_TIMESTAMP_AGE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                age_secs = age,
                "Webhook event too old - possible replay attack"
            );
            return Err(PaymentError::invalid_webhook(format!(
                "Event too old ({} seconds)",
                age
            )));
        }

        if age < -MAX_FUTURE_TOLERANCE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                "Webhook event from future - clock skew or manipulation"
            );
            return Err(PaymentError::invalid_webhook("Event timestamp in future"));
        }

        let mut mac = HmacSha256::new_from_slice(
            self.config.webhook_secret.expose_secret().as_bytes(),
        )
        .map_err(|e| PaymentError::invalid_webhook(format!("Unusable webhook secret: {}", e)))?;
        mac.update(header.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = mac.finalize().into_bytes();
        let expected_bytes: &[u8] = expected.as_slice();

        let matched = header
            .v1_signatures
            .iter()
            .any(|provided| expected_bytes.ct_eq(provided.as_slice()).unwrap_u8() == 1);

        if !matched {
            tracing::warn!(
                expected_signature = hex_encode(expected_bytes),
                "Invalid webhook signature"
            );
            return Err(PaymentError::invalid_webhook("Invalid signature"));
        }

        Ok(())
    }

    /// Parse a Stripe event and convert to domain types.
    fn parse_event(&self, payload: &[u8]) -> Result<WebhookEvent, PaymentError> {
        let stripe_event: StripeWebhookEvent = serde_json::from_slice(payload).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse webhook payload");
            PaymentError::invalid_webhook(format!("Invalid JSON: {}", e))
        })?;

        if self.config.require_livemode && !stripe_event.livemode {
            tracing::warn!(
                event_id = %stripe_event.id,
                "Rejected test mode event in production"
            );
            return Err(PaymentError::invalid_webhook(
                "Test mode events not allowed in production",
            ));
        }

        let event_type = WebhookEventType::parse(&stripe_event.event_type);
        let subscription = if stripe_event.event_type.starts_with("customer.subscription.") {
            let raw: StripeSubscription = serde_json::from_value(stripe_event.data.object.clone())
                .map_err(|e| {
                    PaymentError::invalid_webhook(format!("Invalid subscription: {}", e))
                })?;
            Some(raw.to_domain()?)
        } else {
            None
        };

        Ok(WebhookEvent {
            id: stripe_event.id,
            event_type,
            subscription,
            created_at: stripe_event.created,
        })
    }
}

trait HasId {
    fn id(&self) -> &str;
}

impl HasId for StripeSubscription {
    fn id(&self) -> &str {
        &self.id
    }
}

impl HasId for StripePrice {
    fn id(&self) -> &str {
        &self.id
    }
}

impl HasId for StripeCoupon {
    fn id(&self) -> &str {
        &self.id
    }
}

impl HasId for StripePromotionCode {
    fn id(&self) -> &str {
        &self.id
    }
}

fn recurring_prices(prices: &[StripePrice]) -> Vec<Price> {
    prices
        .iter()
        .filter(|p| p.recurring.is_some())
        .filter_map(|p| match p.to_domain() {
            Ok(price) => Some(price),
            Err(e) => {
                tracing::warn!(price_id = %p.id, error = %e, "Skipping unreadable price");
                None
            }
        })
        .collect()
}

async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    path: &str,
) -> Result<T, PaymentError> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        tracing::error!(path, status = status.as_u16(), error = %error_text, "Stripe request failed");
        let code = match status.as_u16() {
            400 => PaymentErrorCode::InvalidRequest,
            401 | 403 => PaymentErrorCode::AuthenticationError,
            402 => PaymentErrorCode::CardDeclined,
            404 => PaymentErrorCode::NotFound,
            429 => PaymentErrorCode::RateLimitExceeded,
            s if s >= 500 => PaymentErrorCode::NetworkError,
            _ => PaymentErrorCode::ProviderError,
        };
        return Err(PaymentError::new(code, format!("Stripe API error: {}", error_text)));
    }

    response.json().await.map_err(|e| {
        PaymentError::new(
            PaymentErrorCode::ProviderError,
            format!("Failed to parse Stripe response: {}", e),
        )
    })
}

fn search_query(key: &str, value: &str) -> String {
    format!("metadata['{}']:'{}'", key, value.replace('\'', "\\'"))
}

#[async_trait]
impl BillingProvider for StripeBillingAdapter {
    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<Subscription, PaymentError> {
        let params = subscription_params(&request);
        let raw: StripeSubscription = self
            .post("subscriptions", &params, request.idempotency_key.as_deref())
            .await?;
        tracing::info!(subscription_id = %raw.id, customer_id = %raw.customer, "Created subscription");
        raw.to_domain()
    }

    async fn retrieve_subscription(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<Subscription>, PaymentError> {
        let raw: Option<StripeSubscription> = self
            .get(
                &format!("subscriptions/{}", id),
                &[("expand[]", EXPAND_ITEM_PRODUCT)],
            )
            .await?;
        raw.map(|s| s.to_domain()).transpose()
    }

    async fn list_subscriptions(
        &self,
        filter: SubscriptionFilter,
    ) -> Result<Vec<Subscription>, PaymentError> {
        // Products cannot be expanded this deep on a list, and Stripe filters
        // by price only, so the product filter runs here.
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(customer) = &filter.customer {
            query.push(("customer", customer.as_str()));
        }
        if filter.include_terminal {
            query.push(("status", "all"));
        }
        let raw: Vec<StripeSubscription> = self.list_all("subscriptions", &query).await?;
        let mut subscriptions = Vec::with_capacity(raw.len());
        for sub in &raw {
            let sub = sub.to_domain()?;
            if let Some(product) = &filter.product {
                if !sub.items.iter().any(|i| i.product() == product) {
                    continue;
                }
            }
            subscriptions.push(sub);
        }
        Ok(subscriptions)
    }

    async fn update_subscription_items(
        &self,
        id: &SubscriptionId,
        update: SubscriptionUpdate,
    ) -> Result<Subscription, PaymentError> {
        let params = update_params(&update);
        let raw: StripeSubscription = self
            .post(&format!("subscriptions/{}", id), &params, None)
            .await?;
        raw.to_domain()
    }

    fn supports_bundled_item_updates(&self) -> bool {
        true
    }

    async fn update_subscription_metadata(
        &self,
        id: &SubscriptionId,
        metadata: Metadata,
    ) -> Result<Subscription, PaymentError> {
        let mut params = FormParams::default();
        params
            .push_metadata("metadata", &metadata)
            .push("expand[]", EXPAND_ITEM_PRODUCT);
        let raw: StripeSubscription = self
            .post(&format!("subscriptions/{}", id), &params, None)
            .await?;
        raw.to_domain()
    }

    async fn apply_coupon(
        &self,
        id: &SubscriptionId,
        coupon: &CouponId,
    ) -> Result<Subscription, PaymentError> {
        let mut params = FormParams::default();
        params
            .push("coupon", coupon)
            .push("proration_behavior", ProrationBehavior::None.as_str())
            .push("expand[]", EXPAND_ITEM_PRODUCT);
        let raw: StripeSubscription = self
            .post(&format!("subscriptions/{}", id), &params, None)
            .await?;
        raw.to_domain()
    }

    async fn cancel_subscription(&self, id: &SubscriptionId) -> Result<Subscription, PaymentError> {
        let raw: StripeSubscription = self
            .delete(&format!("subscriptions/{}", id), &[])
            .await?;
        raw.to_domain()
    }

    async fn create_subscription_item(
        &self,
        subscription: &SubscriptionId,
        item: NewSubscriptionItem,
    ) -> Result<SubscriptionItemId, PaymentError> {
        let params = item_params(subscription, &item);
        let created: StripeObjectRef = self.post("subscription_items", &params, None).await?;
        Ok(SubscriptionItemId::new(created.id))
    }

    async fn delete_subscription_item(
        &self,
        item: &SubscriptionItemId,
        proration: ProrationBehavior,
    ) -> Result<(), PaymentError> {
        let _: StripeObjectRef = self
            .delete(
                &format!("subscription_items/{}", item),
                &[("proration_behavior", proration.as_str())],
            )
            .await?;
        Ok(())
    }

    async fn create_price(&self, request: CreatePriceRequest) -> Result<Price, PaymentError> {
        let mut params = FormParams::default();
        params
            .push("product", &request.product)
            .push("unit_amount", request.unit_amount.amount())
            .push("currency", request.unit_amount.currency().as_str())
            .push("recurring[interval]", request.recurrence.interval.as_str())
            .push("recurring[interval_count]", request.recurrence.interval_count)
            .push_opt("nickname", request.nickname.as_ref())
            .push_metadata("metadata", &request.metadata);
        let raw: StripePrice = self.post("prices", &params, None).await?;
        raw.to_domain()
    }

    async fn retrieve_price(&self, id: &PriceId) -> Result<Option<Price>, PaymentError> {
        let raw: Option<StripePrice> = self.get(&format!("prices/{}", id), &[]).await?;
        raw.map(|p| p.to_domain()).transpose()
    }

    async fn search_prices_by_metadata(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Vec<Price>, PaymentError> {
        let raw: Vec<StripePrice> = self
            .search_all("prices/search", &search_query(key, value))
            .await?;
        Ok(recurring_prices(&raw))
    }

    async fn retrieve_product(&self, id: &ProductId) -> Result<Option<Product>, PaymentError> {
        let raw: Option<StripeProduct> = self.get(&format!("products/{}", id), &[]).await?;
        match raw {
            Some(product) => self.product_with_prices(product).await.map(Some),
            None => Ok(None),
        }
    }

    async fn search_products_by_metadata(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Vec<Product>, PaymentError> {
        let raw: Vec<StripeProduct> = self
            .search_all("products/search", &search_query(key, value))
            .await?;
        let mut products = Vec::with_capacity(raw.len());
        for product in raw {
            products.push(self.product_with_prices(product).await?);
        }
        Ok(products)
    }

    async fn create_product(&self, request: CreateProductRequest) -> Result<Product, PaymentError> {
        let mut params = FormParams::default();
        params
            .push("name", &request.name)
            .push_opt("unit_label", request.unit_label.as_ref())
            .push_metadata("metadata", &request.metadata);
        let raw: StripeProduct = self.post("products", &params, None).await?;
        Ok(raw.to_domain(Vec::new()))
    }

    async fn find_coupons_by_metadata(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Vec<Coupon>, PaymentError> {
        // Coupons have no search endpoint.
        let raw: Vec<StripeCoupon> = self.list_all("coupons", &[]).await?;
        Ok(raw
            .iter()
            .filter(|c| c.metadata.get(key).map(String::as_str) == Some(value))
            .map(StripeCoupon::to_domain)
            .collect())
    }

    async fn create_coupon(&self, request: CreateCouponRequest) -> Result<Coupon, PaymentError> {
        let raw: StripeCoupon = self.post("coupons", &coupon_params(&request), None).await?;
        Ok(raw.to_domain())
    }

    async fn create_promotion_code(
        &self,
        request: CreatePromotionCodeRequest,
    ) -> Result<PromotionCode, PaymentError> {
        let mut params = FormParams::default();
        params
            .push("coupon", &request.coupon)
            .push_opt("code", request.code.as_ref())
            .push("max_redemptions", request.max_redemptions)
            .push_metadata("metadata", &request.metadata);
        let raw: StripePromotionCode = self.post("promotion_codes", &params, None).await?;
        Ok(raw.to_domain())
    }

    async fn retrieve_promotion_code(
        &self,
        id: &PromotionCodeId,
    ) -> Result<Option<PromotionCode>, PaymentError> {
        let raw: Option<StripePromotionCode> =
            self.get(&format!("promotion_codes/{}", id), &[]).await?;
        Ok(raw.map(|p| p.to_domain()))
    }

    async fn list_promotion_codes(&self, code: &str) -> Result<Vec<PromotionCode>, PaymentError> {
        let raw: Vec<StripePromotionCode> = self
            .list_all("promotion_codes", &[("code", code)])
            .await?;
        Ok(raw.iter().map(StripePromotionCode::to_domain).collect())
    }

    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError> {
        let mut params = FormParams::default();
        params
            .push("email", &request.email)
            .push_opt("name", request.name.as_ref())
            .push_metadata("metadata", &request.metadata);
        let raw: StripeCustomer = self.post("customers", &params, None).await?;
        Ok(raw.to_domain())
    }

    async fn retrieve_customer(&self, id: &CustomerId) -> Result<Option<Customer>, PaymentError> {
        let raw: Option<StripeCustomer> = self.get(&format!("customers/{}", id), &[]).await?;
        Ok(raw.filter(|c| !c.deleted).map(|c| c.to_domain()))
    }

    async fn create_payment_method(
        &self,
        request: CreatePaymentMethodRequest,
    ) -> Result<PaymentMethodId, PaymentError> {
        let mut params = FormParams::default();
        params
            .push("type", "card")
            .push("card[token]", &request.card_token);
        let created: StripeObjectRef = self.post("payment_methods", &params, None).await?;

        let mut attach = FormParams::default();
        attach.push("customer", &request.customer);
        let _: StripeObjectRef = self
            .post(&format!("payment_methods/{}/attach", created.id), &attach, None)
            .await?;
        Ok(PaymentMethodId::new(created.id))
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PaymentError> {
        let header = SignatureHeader::parse(signature).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse Stripe-Signature header");
            PaymentError::invalid_webhook(e.to_string())
        })?;

        self.verify_signature(payload, &header)?;

        let webhook_event = self.parse_event(payload)?;

        tracing::info!(
            event_id = %webhook_event.id,
            event_type = ?webhook_event.event_type,
            "Webhook signature verified"
        );

        Ok(webhook_event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{Currency, Money, Recurrence};
    use crate::domain::shipping::ZoneCode;
    use crate::domain::subscription::SubscriptionStatus;
    use crate::ports::PaymentBehavior;

    fn test_config() -> StripeConfig {
        StripeConfig::new("sk_test_key", "whsec_test_secret")
    }

    fn create_test_signature(secret: &str, timestamp: i64, payload: &str) -> String {
        let signed_payload = format!("{}.{}", timestamp, payload);
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(signed_payload.as_bytes());
        let result = mac.finalize().into_bytes();

        format!("t={},v1={}", timestamp, hex_encode(&result))
    }

    fn membership_line() -> LineItem {
        LineItem::membership(
            ProductId::new("prod_books"),
            Money::new(1000, Currency::gbp()),
            Recurrence::monthly(),
        )
    }

    fn shipping_line() -> LineItem {
        LineItem::shipping(
            ProductId::new("prod_shipping"),
            Money::new(150, Currency::gbp()),
            Recurrence::monthly(),
            &ZoneCode::new("UK").unwrap(),
        )
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn config_new_sets_defaults() {
        let config = StripeConfig::new("api_key", "webhook_secret");
        assert_eq!(config.api_base_url, "https://api.stripe.com");
        assert!(!config.require_livemode);
    }

    #[test]
    fn config_debug_hides_secrets() {
        let config = StripeConfig::new("sk_live_secret", "whsec_secret").with_base_url("http://x");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk_live_secret"));
        assert!(debug.contains("http://x"));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Form Encoding Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn subscription_params_nest_line_items() {
        let mut request = CreateSubscriptionRequest::new(
            CustomerId::new("cus_1"),
            vec![membership_line(), shipping_line()],
        );
        request.promotion_code = Some(PromotionCodeId::new("promo_1"));
        request.payment_behavior = PaymentBehavior::AllowIncomplete;
        request.off_session = true;
        request.metadata.insert("gift_giver_subscription".into(), "sub_giver".into());

        let params = subscription_params(&request);
        assert_eq!(params.get("customer"), Some("cus_1"));
        assert_eq!(params.get("items[0][price_data][unit_amount]"), Some("1000"));
        assert_eq!(params.get("items[0][price_data][currency]"), Some("gbp"));
        assert_eq!(params.get("items[0][metadata][role]"), Some("membership"));
        assert_eq!(params.get("items[1][price_data][product]"), Some("prod_shipping"));
        assert_eq!(params.get("items[1][metadata][shipping_zone]"), Some("UK"));
        assert_eq!(params.get("metadata[gift_giver_subscription]"), Some("sub_giver"));
        assert_eq!(params.get("promotion_code"), Some("promo_1"));
        assert_eq!(params.get("payment_behavior"), Some("allow_incomplete"));
        assert_eq!(params.get("off_session"), Some("true"));
    }

    #[test]
    fn update_params_bundle_add_and_delete() {
        let update = SubscriptionUpdate {
            changes: vec![
                ItemChange::Add(membership_line()),
                ItemChange::Delete(SubscriptionItemId::new("si_old")),
            ],
            proration: ProrationBehavior::None,
        };
        let params = update_params(&update);
        assert_eq!(
            params.get("items[0][price_data][recurring][interval]"),
            Some("month")
        );
        assert_eq!(params.get("items[1][id]"), Some("si_old"));
        assert_eq!(params.get("items[1][deleted]"), Some("true"));
        assert_eq!(params.get("proration_behavior"), Some("none"));
    }

    #[test]
    fn item_params_flatten_inline_price() {
        let item = NewSubscriptionItem::inline(shipping_line(), ProrationBehavior::None);
        let params = item_params(&SubscriptionId::new("sub_1"), &item);
        assert_eq!(params.get("subscription"), Some("sub_1"));
        assert_eq!(params.get("price_data[unit_amount]"), Some("150"));
        assert_eq!(params.get("price_data[recurring][interval_count]"), Some("1"));
        assert_eq!(params.get("quantity"), Some("1"));
        assert_eq!(params.get("metadata[role]"), Some("shipping"));
    }

    #[test]
    fn coupon_params_list_products() {
        let params = coupon_params(&CreateCouponRequest {
            name: "Gift Card: Classics".into(),
            percent_off: 100,
            duration: CouponDuration::Forever,
            applies_to: vec![ProductId::new("prod_a"), ProductId::new("prod_ship")],
            metadata: Metadata::new(),
        });
        assert_eq!(params.get("applies_to[products][1]"), Some("prod_ship"));
        assert_eq!(params.get("duration"), Some("forever"));
        assert!(params.get("duration_in_months").is_none());
    }

    #[test]
    fn search_query_escapes_quotes() {
        assert_eq!(
            search_query("legacy_stripe_plan_id", "it's"),
            "metadata['legacy_stripe_plan_id']:'it\\'s'"
        );
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Signature Verification Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn verify_signature_valid() {
        let adapter = StripeBillingAdapter::new(test_config());
        let payload = r#"{"id":"evt_test"}"#;
        let timestamp = chrono::Utc::now().timestamp();
        let signature = create_test_signature("whsec_test_secret", timestamp, payload);

        let header = SignatureHeader::parse(&signature).unwrap();
        assert!(adapter.verify_signature(payload.as_bytes(), &header).is_ok());
    }

    #[test]
    fn verify_signature_accepts_any_rotated_secret() {
        let adapter = StripeBillingAdapter::new(test_config());
        let payload = r#"{"id":"evt_test"}"#;
        let timestamp = chrono::Utc::now().timestamp();
        let stale = create_test_signature("whsec_old", timestamp, payload);
        let current = create_test_signature("whsec_test_secret", timestamp, payload);
        let combined = format!("{},{}", stale, current.split_once(',').unwrap().1);

        let header = SignatureHeader::parse(&combined).unwrap();
        assert!(adapter.verify_signature(payload.as_bytes(), &header).is_ok());
    }

    #[test]
    fn verify_signature_invalid() {
        let adapter = StripeBillingAdapter::new(test_config());
        let payload = r#"{"id":"evt_test"}"#;
        let timestamp = chrono::Utc::now().timestamp();
        let signature = create_test_signature("wrong_secret", timestamp, payload);

        let header = SignatureHeader::parse(&signature).unwrap();
        let err = adapter
            .verify_signature(payload.as_bytes(), &header)
            .unwrap_err();
        assert_eq!(err.code, PaymentErrorCode::InvalidWebhook);
    }

    #[test]
    fn verify_signature_expired_timestamp() {
        let adapter = StripeBillingAdapter::new(test_config());
        let payload = r#"{"id":"evt_test"}"#;
        let old_timestamp = chrono::Utc::now().timestamp() - 600;
        let signature = create_test_signature("whsec_test_secret", old_timestamp, payload);

        let header = SignatureHeader::parse(&signature).unwrap();
        let err = adapter
            .verify_signature(payload.as_bytes(), &header)
            .unwrap_err();
        assert!(err.message.contains("too old"));
    }

    #[test]
    fn verify_signature_future_timestamp() {
        let adapter = StripeBillingAdapter::new(test_config());
        let payload = r#"{"id":"evt_test"}"#;
        let future_timestamp = chrono::Utc::now().timestamp() + 120;
        let signature = create_test_signature("whsec_test_secret", future_timestamp, payload);

        let header = SignatureHeader::parse(&signature).unwrap();
        let err = adapter
            .verify_signature(payload.as_bytes(), &header)
            .unwrap_err();
        assert!(err.message.contains("future"));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Event Parsing Tests
    // ════════════════════════════════════════════════════════════════════════════

    const DELETED_EVENT: &str = r#"{
        "id": "evt_sub",
        "type": "customer.subscription.deleted",
        "created": 1704067200,
        "data": {
            "object": {
                "id": "sub_giver",
                "object": "subscription",
                "customer": "cus_test",
                "status": "canceled",
                "metadata": {"gift_mode": "True", "promo_code": "promo_1"},
                "items": {"data": []}
            }
        },
        "livemode": false
    }"#;

    #[test]
    fn parse_subscription_deleted() {
        let adapter = StripeBillingAdapter::new(test_config());
        let event = adapter.parse_event(DELETED_EVENT.as_bytes()).unwrap();

        assert_eq!(event.event_type, WebhookEventType::SubscriptionDeleted);
        let sub = event.subscription.unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Canceled);
        assert!(sub.is_gift_mode());
    }

    #[test]
    fn parse_unknown_event_type() {
        let adapter = StripeBillingAdapter::new(test_config());
        let payload = r#"{
            "id": "evt_unknown",
            "type": "invoice.paid",
            "created": 1704067200,
            "data": {"object": {"foo": "bar"}},
            "livemode": false
        }"#;

        let event = adapter.parse_event(payload.as_bytes()).unwrap();
        assert_eq!(
            event.event_type,
            WebhookEventType::Unknown("invoice.paid".to_string())
        );
        assert!(event.subscription.is_none());
    }

    #[test]
    fn parse_rejects_test_mode_in_production() {
        let config = StripeConfig::new("key", "secret").with_require_livemode(true);
        let adapter = StripeBillingAdapter::new(config);

        let err = adapter.parse_event(DELETED_EVENT.as_bytes()).unwrap_err();
        assert!(err.message.contains("Test mode"));
    }

    #[tokio::test]
    async fn verify_webhook_full_flow() {
        let adapter = StripeBillingAdapter::new(test_config());
        let timestamp = chrono::Utc::now().timestamp();
        let signature = create_test_signature("whsec_test_secret", timestamp, DELETED_EVENT);

        let event = adapter
            .verify_webhook(DELETED_EVENT.as_bytes(), &signature)
            .await
            .unwrap();
        assert_eq!(event.id, "evt_sub");
    }

    #[tokio::test]
    async fn verify_webhook_rejects_malformed_header() {
        let adapter = StripeBillingAdapter::new(test_config());
        let result = adapter
            .verify_webhook(DELETED_EVENT.as_bytes(), "malformed_header")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn verify_webhook_rejects_invalid_json() {
        let adapter = StripeBillingAdapter::new(test_config());
        let payload = "not valid json";
        let timestamp = chrono::Utc::now().timestamp();
        let signature = create_test_signature("whsec_test_secret", timestamp, payload);

        let err = adapter
            .verify_webhook(payload.as_bytes(), &signature)
            .await
            .unwrap_err();
        assert!(err.message.contains("Invalid JSON"));
    }
}
