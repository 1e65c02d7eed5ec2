//! Mock billing provider for testing.
//!
//! A stateful in-memory fake of `BillingProvider` for unit and integration
//! tests. Supports:
//! - Seeded catalog, customers and subscriptions
//! - Provider-side effects (code redemption counters, discounts, status)
//! - Error injection
//! - Call tracking, including a count of remote writes
//! - Webhook event simulation
//!
//! Inline prices lose their metadata, as they do at Stripe, so tags only
//! survive on the subscription item.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::catalog::{Price, Product};
use crate::domain::foundation::{
    CouponId, CustomerId, Metadata, PaymentMethodId, PriceId, ProductId, PromotionCodeId,
    SubscriptionId, SubscriptionItemId,
};
use crate::domain::gift::PromotionCode;
use crate::domain::subscription::{
    Coupon, Discount, LineItem, Subscription, SubscriptionItem, SubscriptionStatus,
};
use crate::ports::{
    BillingProvider, CreateCouponRequest, CreateCustomerRequest, CreatePaymentMethodRequest,
    CreatePriceRequest, CreateProductRequest, CreatePromotionCodeRequest,
    CreateSubscriptionRequest, Customer, ItemChange, ItemPrice, NewSubscriptionItem,
    PaymentError, PaymentErrorCode, ProrationBehavior, SubscriptionFilter, SubscriptionUpdate,
    WebhookEvent,
};

/// Methods that change remote state.
const WRITE_METHODS: [&str; 14] = [
    "create_subscription",
    "update_subscription_items",
    "update_subscription_metadata",
    "apply_coupon",
    "cancel_subscription",
    "create_subscription_item",
    "delete_subscription_item",
    "create_price",
    "create_product",
    "create_coupon",
    "create_promotion_code",
    "create_customer",
    "create_payment_method",
    "update_promotion_code",
];

/// Mock billing provider for testing.
///
/// # Example
///
/// ```ignore
/// let mock = MockBillingProvider::new();
/// mock.add_product(product);
/// mock.add_subscription(subscription);
///
/// // Inject errors
/// mock.set_method_error("create_promotion_code", PaymentError::network("down"));
///
/// // Assert on remote writes
/// assert_eq!(mock.write_count(), 0);
/// ```
#[derive(Default)]
pub struct MockBillingProvider {
    /// Inner state (thread-safe for async tests).
    inner: Arc<Mutex<MockState>>,
}

/// Internal mutable state.
#[derive(Default)]
struct MockState {
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    prices: BTreeMap<PriceId, Price>,
    products: BTreeMap<ProductId, Product>,
    coupons: BTreeMap<CouponId, Coupon>,
    promotion_codes: BTreeMap<PromotionCodeId, PromotionCode>,
    customers: BTreeMap<CustomerId, Customer>,
    payment_methods: Vec<(PaymentMethodId, CustomerId)>,

    /// Next webhook event to return.
    next_webhook_event: Option<WebhookEvent>,

    /// Always fail webhook verification.
    reject_webhooks: bool,

    /// Report that adds and deletes cannot be bundled.
    unbundled_updates: bool,

    /// Error to return on next call.
    next_error: Option<PaymentError>,

    /// Specific errors by method name.
    method_errors: HashMap<String, PaymentError>,

    /// Track method calls for assertions.
    call_log: Vec<MethodCall>,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

impl MethodCall {
    pub fn is_write(&self) -> bool {
        WRITE_METHODS.contains(&self.method.as_str())
    }
}

fn mock_id(prefix: &str) -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("{}mock_{}", prefix, &uuid[..12])
}

fn invalid_request(message: impl Into<String>) -> PaymentError {
    PaymentError::new(PaymentErrorCode::InvalidRequest, message)
}

impl MockState {
    /// Mints a price for an inline line item. Inline prices keep no metadata.
    fn mint_inline_price(&mut self, line: &LineItem) -> Price {
        let price = Price {
            id: PriceId::new(mock_id(PriceId::PREFIX)),
            product: line.price_data.product.clone(),
            unit_amount: line.price_data.unit_amount.clone(),
            recurrence: line.price_data.recurrence,
            nickname: None,
            active: false,
            metadata: Metadata::new(),
        };
        self.prices.insert(price.id.clone(), price.clone());
        price
    }

    /// Builds an item, attaching product name and tags as an expanded
    /// product would.
    fn item(&self, price: Price, quantity: u64, metadata: Metadata) -> SubscriptionItem {
        let product = self.products.get(&price.product);
        SubscriptionItem {
            id: SubscriptionItemId::new(mock_id(SubscriptionItemId::PREFIX)),
            product_name: product.map(|p| p.name.clone()),
            product_metadata: product.map(|p| p.metadata.clone()).unwrap_or_default(),
            price,
            quantity,
            metadata,
        }
    }

    fn inline_item(&mut self, line: &LineItem) -> SubscriptionItem {
        let price = self.mint_inline_price(line);
        self.item(price, line.quantity, line.item_metadata())
    }

    fn subscription_mut(&mut self, id: &SubscriptionId) -> Result<&mut Subscription, PaymentError> {
        self.subscriptions
            .get_mut(id)
            .ok_or_else(|| PaymentError::not_found(&format!("Subscription {}", id)))
    }

    /// Consumes one redemption, deactivating the code when exhausted.
    fn redeem(&mut self, id: &PromotionCodeId) -> Result<Coupon, PaymentError> {
        let code = self
            .promotion_codes
            .get_mut(id)
            .ok_or_else(|| invalid_request(format!("No such promotion code: {}", id)))?;
        if !code.active || !code.max_redemptions.map_or(true, |max| code.times_redeemed < max) {
            return Err(invalid_request(format!(
                "Promotion code {} is no longer active",
                code.code
            )));
        }
        code.times_redeemed += 1;
        if code.max_redemptions.map_or(false, |max| code.times_redeemed >= max) {
            code.active = false;
        }
        Ok(code.coupon.clone())
    }

    fn product_with_prices(&self, product: &Product) -> Product {
        let mut product = product.clone();
        product.prices = self
            .prices
            .values()
            .filter(|p| p.product == product.id && p.active)
            .cloned()
            .collect();
        product
    }
}

impl MockBillingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that fails all webhook verifications.
    pub fn rejecting_webhooks() -> Self {
        let mock = Self::new();
        mock.inner.lock().unwrap().reject_webhooks = true;
        mock
    }

    /// Create a mock whose transport cannot bundle item adds and deletes.
    pub fn without_bundled_updates() -> Self {
        let mock = Self::new();
        mock.inner.lock().unwrap().unbundled_updates = true;
        mock
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Add a product to the "database". Its prices are stored separately.
    pub fn add_product(&self, product: Product) {
        let mut state = self.inner.lock().unwrap();
        for price in &product.prices {
            state.prices.insert(price.id.clone(), price.clone());
        }
        let mut stored = product;
        stored.prices.clear();
        state.products.insert(stored.id.clone(), stored);
    }

    pub fn add_price(&self, price: Price) {
        self.inner
            .lock()
            .unwrap()
            .prices
            .insert(price.id.clone(), price);
    }

    pub fn add_customer(&self, customer: Customer) {
        self.inner
            .lock()
            .unwrap()
            .customers
            .insert(customer.id.clone(), customer);
    }

    pub fn add_subscription(&self, subscription: Subscription) {
        let mut state = self.inner.lock().unwrap();
        for item in &subscription.items {
            state
                .prices
                .entry(item.price.id.clone())
                .or_insert_with(|| item.price.clone());
        }
        state
            .subscriptions
            .insert(subscription.id.clone(), subscription);
    }

    pub fn add_coupon(&self, coupon: Coupon) {
        self.inner
            .lock()
            .unwrap()
            .coupons
            .insert(coupon.id.clone(), coupon);
    }

    pub fn add_promotion_code(&self, code: PromotionCode) {
        self.inner
            .lock()
            .unwrap()
            .promotion_codes
            .insert(code.id.clone(), code);
    }

    /// Changes a subscription's status as an external event would.
    pub fn set_subscription_status(&self, id: &SubscriptionId, status: SubscriptionStatus) {
        if let Some(sub) = self.inner.lock().unwrap().subscriptions.get_mut(id) {
            sub.status = status;
        }
    }

    /// Set the webhook event to return on verification.
    pub fn set_webhook_event(&self, event: WebhookEvent) {
        self.inner.lock().unwrap().next_webhook_event = Some(event);
    }

    /// Set an error to return on the next call to any method.
    pub fn set_error(&self, error: PaymentError) {
        self.inner.lock().unwrap().next_error = Some(error);
    }

    /// Set an error for a specific method.
    pub fn set_method_error(&self, method: &str, error: PaymentError) {
        self.inner
            .lock()
            .unwrap()
            .method_errors
            .insert(method.to_string(), error);
    }

    /// Clear all configured errors.
    pub fn clear_errors(&self) {
        let mut state = self.inner.lock().unwrap();
        state.next_error = None;
        state.method_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // State Inspection
    // ════════════════════════════════════════════════════════════════════════════

    pub fn subscription(&self, id: &SubscriptionId) -> Option<Subscription> {
        self.inner.lock().unwrap().subscriptions.get(id).cloned()
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.inner
            .lock()
            .unwrap()
            .subscriptions
            .values()
            .cloned()
            .collect()
    }

    pub fn promotion_code(&self, id: &PromotionCodeId) -> Option<PromotionCode> {
        self.inner.lock().unwrap().promotion_codes.get(id).cloned()
    }

    pub fn coupons(&self) -> Vec<Coupon> {
        self.inner
            .lock()
            .unwrap()
            .coupons
            .values()
            .cloned()
            .collect()
    }

    pub fn prices(&self) -> Vec<Price> {
        self.inner
            .lock()
            .unwrap()
            .prices
            .values()
            .cloned()
            .collect()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    /// Get all recorded method calls.
    pub fn calls(&self) -> Vec<MethodCall> {
        self.inner.lock().unwrap().call_log.clone()
    }

    /// Check if a method was called.
    pub fn was_called(&self, method: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .call_log
            .iter()
            .any(|c| c.method == method)
    }

    /// Get count of calls to a method.
    pub fn call_count(&self, method: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Number of calls that change remote state.
    pub fn write_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .call_log
            .iter()
            .filter(|c| c.is_write())
            .count()
    }

    /// Clear the call log.
    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().call_log.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn record_call(&self, method: &str, args: Vec<String>) {
        self.inner.lock().unwrap().call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
    }

    fn check_error(&self, method: &str) -> Result<(), PaymentError> {
        let mut state = self.inner.lock().unwrap();

        // Check method-specific error first
        if let Some(error) = state.method_errors.get(method) {
            return Err(error.clone());
        }

        // Check global error (consumes it)
        if let Some(error) = state.next_error.take() {
            return Err(error);
        }

        Ok(())
    }

    fn begin(&self, method: &str, args: Vec<String>) -> Result<(), PaymentError> {
        self.record_call(method, args);
        self.check_error(method)
    }
}

impl Clone for MockBillingProvider {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl BillingProvider for MockBillingProvider {
    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<Subscription, PaymentError> {
        self.begin(
            "create_subscription",
            vec![request.customer.to_string(), request.items.len().to_string()],
        )?;

        let mut state = self.inner.lock().unwrap();
        let discount = match &request.promotion_code {
            Some(code) => Some(Discount {
                coupon: state.redeem(code)?,
                promotion_code: Some(code.clone()),
            }),
            None => None,
        };
        let items = request
            .items
            .iter()
            .map(|line| state.inline_item(line))
            .collect();

        let subscription = Subscription {
            id: SubscriptionId::new(mock_id(SubscriptionId::PREFIX)),
            customer: request.customer,
            status: SubscriptionStatus::Active,
            items,
            metadata: request.metadata,
            discount,
            created: chrono::Utc::now().timestamp(),
        };
        state
            .subscriptions
            .insert(subscription.id.clone(), subscription.clone());

        Ok(subscription)
    }

    async fn retrieve_subscription(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<Subscription>, PaymentError> {
        self.begin("retrieve_subscription", vec![id.to_string()])?;
        Ok(self.inner.lock().unwrap().subscriptions.get(id).cloned())
    }

    async fn list_subscriptions(
        &self,
        filter: SubscriptionFilter,
    ) -> Result<Vec<Subscription>, PaymentError> {
        self.begin("list_subscriptions", vec![format!("{:?}", filter)])?;
        let state = self.inner.lock().unwrap();
        Ok(state
            .subscriptions
            .values()
            .filter(|s| filter.customer.as_ref().map_or(true, |c| &s.customer == c))
            .filter(|s| {
                filter
                    .product
                    .as_ref()
                    .map_or(true, |p| s.items.iter().any(|i| i.product() == p))
            })
            .filter(|s| filter.include_terminal || !s.status.is_terminal())
            .cloned()
            .collect())
    }

    async fn update_subscription_items(
        &self,
        id: &SubscriptionId,
        update: SubscriptionUpdate,
    ) -> Result<Subscription, PaymentError> {
        self.begin(
            "update_subscription_items",
            vec![id.to_string(), update.changes.len().to_string()],
        )?;

        let mut state = self.inner.lock().unwrap();
        let existing = state.subscription_mut(id)?.items.clone();
        for change in &update.changes {
            if let ItemChange::Delete(item) = change {
                if !existing.iter().any(|i| &i.id == item) {
                    return Err(invalid_request(format!("No such subscription item: {}", item)));
                }
            }
        }

        let mut items = existing;
        for change in &update.changes {
            match change {
                ItemChange::Add(line) => {
                    let item = state.inline_item(line);
                    items.push(item);
                }
                ItemChange::Delete(item) => items.retain(|i| &i.id != item),
            }
        }

        let sub = state.subscription_mut(id)?;
        sub.items = items;
        Ok(sub.clone())
    }

    fn supports_bundled_item_updates(&self) -> bool {
        !self.inner.lock().unwrap().unbundled_updates
    }

    async fn update_subscription_metadata(
        &self,
        id: &SubscriptionId,
        metadata: Metadata,
    ) -> Result<Subscription, PaymentError> {
        self.begin(
            "update_subscription_metadata",
            vec![id.to_string(), format!("{:?}", metadata)],
        )?;

        let mut state = self.inner.lock().unwrap();
        let sub = state.subscription_mut(id)?;
        for (key, value) in metadata {
            // Stripe deletes a key written with an empty value.
            if value.is_empty() {
                sub.metadata.remove(&key);
            } else {
                sub.metadata.insert(key, value);
            }
        }
        Ok(sub.clone())
    }

    async fn apply_coupon(
        &self,
        id: &SubscriptionId,
        coupon: &CouponId,
    ) -> Result<Subscription, PaymentError> {
        self.begin("apply_coupon", vec![id.to_string(), coupon.to_string()])?;

        let mut state = self.inner.lock().unwrap();
        let coupon = state
            .coupons
            .get(coupon)
            .cloned()
            .ok_or_else(|| invalid_request(format!("No such coupon: {}", coupon)))?;
        let sub = state.subscription_mut(id)?;
        sub.discount = Some(Discount {
            coupon,
            promotion_code: None,
        });
        Ok(sub.clone())
    }

    async fn cancel_subscription(&self, id: &SubscriptionId) -> Result<Subscription, PaymentError> {
        self.begin("cancel_subscription", vec![id.to_string()])?;

        let mut state = self.inner.lock().unwrap();
        let sub = state.subscription_mut(id)?;
        if sub.status == SubscriptionStatus::Canceled {
            return Err(invalid_request(format!("Subscription {} is already canceled", id)));
        }
        sub.status = SubscriptionStatus::Canceled;
        Ok(sub.clone())
    }

    async fn create_subscription_item(
        &self,
        subscription: &SubscriptionId,
        item: NewSubscriptionItem,
    ) -> Result<SubscriptionItemId, PaymentError> {
        self.begin(
            "create_subscription_item",
            vec![subscription.to_string(), format!("{:?}", item.price)],
        )?;

        let mut state = self.inner.lock().unwrap();
        state.subscription_mut(subscription)?;
        let price = match &item.price {
            ItemPrice::Existing(id) => state
                .prices
                .get(id)
                .cloned()
                .ok_or_else(|| invalid_request(format!("No such price: {}", id)))?,
            ItemPrice::Inline(line) => state.mint_inline_price(line),
        };
        let new_item = state.item(price, item.quantity, item.metadata);
        let id = new_item.id.clone();
        state.subscription_mut(subscription)?.items.push(new_item);
        Ok(id)
    }

    async fn delete_subscription_item(
        &self,
        item: &SubscriptionItemId,
        proration: ProrationBehavior,
    ) -> Result<(), PaymentError> {
        self.begin(
            "delete_subscription_item",
            vec![item.to_string(), proration.as_str().to_string()],
        )?;

        let mut state = self.inner.lock().unwrap();
        let owner = state
            .subscriptions
            .values_mut()
            .find(|s| s.items.iter().any(|i| &i.id == item))
            .ok_or_else(|| PaymentError::not_found(&format!("Subscription item {}", item)))?;
        owner.items.retain(|i| &i.id != item);
        Ok(())
    }

    async fn create_price(&self, request: CreatePriceRequest) -> Result<Price, PaymentError> {
        self.begin(
            "create_price",
            vec![request.product.to_string(), request.unit_amount.to_string()],
        )?;

        let price = Price {
            id: PriceId::new(mock_id(PriceId::PREFIX)),
            product: request.product,
            unit_amount: request.unit_amount,
            recurrence: request.recurrence,
            nickname: request.nickname,
            active: true,
            metadata: request.metadata,
        };
        self.inner
            .lock()
            .unwrap()
            .prices
            .insert(price.id.clone(), price.clone());
        Ok(price)
    }

    async fn retrieve_price(&self, id: &PriceId) -> Result<Option<Price>, PaymentError> {
        self.begin("retrieve_price", vec![id.to_string()])?;
        Ok(self.inner.lock().unwrap().prices.get(id).cloned())
    }

    async fn search_prices_by_metadata(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Vec<Price>, PaymentError> {
        self.begin("search_prices_by_metadata", vec![key.into(), value.into()])?;
        Ok(self
            .inner
            .lock()
            .unwrap()
            .prices
            .values()
            .filter(|p| p.metadata.get(key).map(String::as_str) == Some(value))
            .cloned()
            .collect())
    }

    async fn retrieve_product(&self, id: &ProductId) -> Result<Option<Product>, PaymentError> {
        self.begin("retrieve_product", vec![id.to_string()])?;
        let state = self.inner.lock().unwrap();
        Ok(state.products.get(id).map(|p| state.product_with_prices(p)))
    }

    async fn search_products_by_metadata(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Vec<Product>, PaymentError> {
        self.begin("search_products_by_metadata", vec![key.into(), value.into()])?;
        let state = self.inner.lock().unwrap();
        Ok(state
            .products
            .values()
            .filter(|p| p.metadata.get(key).map(String::as_str) == Some(value))
            .map(|p| state.product_with_prices(p))
            .collect())
    }

    async fn create_product(&self, request: CreateProductRequest) -> Result<Product, PaymentError> {
        self.begin("create_product", vec![request.name.clone()])?;

        let product = Product {
            id: ProductId::new(mock_id(ProductId::PREFIX)),
            name: request.name,
            active: true,
            metadata: request.metadata,
            prices: Vec::new(),
        };
        self.inner
            .lock()
            .unwrap()
            .products
            .insert(product.id.clone(), product.clone());
        Ok(product)
    }

    async fn find_coupons_by_metadata(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Vec<Coupon>, PaymentError> {
        self.begin("find_coupons_by_metadata", vec![key.into(), value.into()])?;
        Ok(self
            .inner
            .lock()
            .unwrap()
            .coupons
            .values()
            .filter(|c| c.metadata.get(key).map(String::as_str) == Some(value))
            .cloned()
            .collect())
    }

    async fn create_coupon(&self, request: CreateCouponRequest) -> Result<Coupon, PaymentError> {
        self.begin("create_coupon", vec![request.name.clone()])?;

        let coupon = Coupon {
            id: CouponId::new(mock_id("coupon_")),
            name: Some(request.name),
            percent_off: Some(request.percent_off),
            duration: request.duration,
            applies_to: request.applies_to,
            metadata: request.metadata,
        };
        self.inner
            .lock()
            .unwrap()
            .coupons
            .insert(coupon.id.clone(), coupon.clone());
        Ok(coupon)
    }

    async fn create_promotion_code(
        &self,
        request: CreatePromotionCodeRequest,
    ) -> Result<PromotionCode, PaymentError> {
        self.begin(
            "create_promotion_code",
            vec![request.coupon.to_string(), request.code.clone().unwrap_or_default()],
        )?;

        let mut state = self.inner.lock().unwrap();
        let coupon = state
            .coupons
            .get(&request.coupon)
            .cloned()
            .ok_or_else(|| invalid_request(format!("No such coupon: {}", request.coupon)))?;
        let code = request.code.unwrap_or_else(|| {
            let uuid = uuid::Uuid::new_v4().simple().to_string();
            uuid[..8].to_ascii_uppercase()
        });
        if state
            .promotion_codes
            .values()
            .any(|p| p.active && p.code.eq_ignore_ascii_case(&code))
        {
            return Err(invalid_request(format!(
                "An active promotion code with code: {} already exists",
                code
            )));
        }

        let promotion_code = PromotionCode {
            id: PromotionCodeId::new(mock_id(PromotionCodeId::PREFIX)),
            code,
            coupon,
            active: true,
            max_redemptions: Some(request.max_redemptions),
            times_redeemed: 0,
            metadata: request.metadata,
        };
        state
            .promotion_codes
            .insert(promotion_code.id.clone(), promotion_code.clone());
        Ok(promotion_code)
    }

    async fn retrieve_promotion_code(
        &self,
        id: &PromotionCodeId,
    ) -> Result<Option<PromotionCode>, PaymentError> {
        self.begin("retrieve_promotion_code", vec![id.to_string()])?;
        Ok(self.inner.lock().unwrap().promotion_codes.get(id).cloned())
    }

    async fn list_promotion_codes(&self, code: &str) -> Result<Vec<PromotionCode>, PaymentError> {
        self.begin("list_promotion_codes", vec![code.to_string()])?;
        Ok(self
            .inner
            .lock()
            .unwrap()
            .promotion_codes
            .values()
            .filter(|p| p.code.eq_ignore_ascii_case(code))
            .cloned()
            .collect())
    }

    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError> {
        self.begin("create_customer", vec![request.email.clone()])?;

        let customer = Customer {
            id: CustomerId::new(mock_id(CustomerId::PREFIX)),
            email: Some(request.email),
            name: request.name,
            metadata: request.metadata,
        };
        self.inner
            .lock()
            .unwrap()
            .customers
            .insert(customer.id.clone(), customer.clone());
        Ok(customer)
    }

    async fn retrieve_customer(&self, id: &CustomerId) -> Result<Option<Customer>, PaymentError> {
        self.begin("retrieve_customer", vec![id.to_string()])?;
        Ok(self.inner.lock().unwrap().customers.get(id).cloned())
    }

    async fn create_payment_method(
        &self,
        request: CreatePaymentMethodRequest,
    ) -> Result<PaymentMethodId, PaymentError> {
        self.begin("create_payment_method", vec![request.customer.to_string()])?;

        let id = PaymentMethodId::new(mock_id(PaymentMethodId::PREFIX));
        self.inner
            .lock()
            .unwrap()
            .payment_methods
            .push((id.clone(), request.customer));
        Ok(id)
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PaymentError> {
        self.begin(
            "verify_webhook",
            vec![payload.len().to_string(), signature.to_string()],
        )?;

        let mut state = self.inner.lock().unwrap();
        if state.reject_webhooks {
            return Err(PaymentError::invalid_webhook("Invalid signature"));
        }
        state
            .next_webhook_event
            .take()
            .ok_or_else(|| PaymentError::invalid_webhook("No webhook event configured"))
    }
}
