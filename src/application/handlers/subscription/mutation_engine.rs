//! SubscriptionMutationEngine - applies composed line items to a live subscription.
//!
//! # Protocol
//!
//! 1. Re-fetch the subscription from the provider and sync the cache.
//! 2. Refuse terminal subscriptions and kind mismatches before any write.
//! 3. Replace every existing item of each added role in the same request.
//! 4. Re-fetch and sync again so callers never read a stale item set.
//!
//! When the provider cannot bundle adds and deletes, items are created
//! before the old ones are deleted, so a subscription is never observed
//! without its membership item.
//!
//! No lock is held across the sequence. A concurrent webhook write loses to
//! the later mutation; role replacement makes repeated applies converge.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::domain::errors::BillingError;
use crate::domain::foundation::{SubscriptionId, SubscriptionItemId};
use crate::domain::subscription::{ItemRole, LineItem, Subscription, SubscriptionKind};
use crate::ports::{
    BillingProvider, ItemChange, NewSubscriptionItem, ProrationBehavior, SubscriptionCache,
    SubscriptionUpdate,
};

/// Items to add and remove on one subscription.
#[derive(Debug, Clone)]
pub struct MutationRequest {
    pub subscription_id: SubscriptionId,
    /// The kind the caller means to mutate.
    pub expected_kind: SubscriptionKind,
    pub add: Vec<LineItem>,
    pub remove: Vec<SubscriptionItemId>,
    pub proration: ProrationBehavior,
}

impl MutationRequest {
    pub fn new(subscription_id: SubscriptionId, expected_kind: SubscriptionKind) -> Self {
        Self {
            subscription_id,
            expected_kind,
            add: Vec::new(),
            remove: Vec::new(),
            proration: ProrationBehavior::None,
        }
    }

    pub fn adding(mut self, items: impl IntoIterator<Item = LineItem>) -> Self {
        self.add.extend(items);
        self
    }

    pub fn removing(mut self, item: SubscriptionItemId) -> Self {
        self.remove.push(item);
        self
    }

    pub fn with_proration(mut self, proration: ProrationBehavior) -> Self {
        self.proration = proration;
        self
    }
}

/// Item changes computed against a fresh snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ItemPlan {
    pub add: Vec<LineItem>,
    pub delete: Vec<SubscriptionItemId>,
}

impl ItemPlan {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.delete.is_empty()
    }
}

/// Plans the changes for `request` against `current`.
///
/// A line already billed by the role's single existing item is dropped, so
/// re-applying an unchanged set writes nothing. Explicit removals of items
/// that no longer exist are dropped with a warning.
pub(crate) fn plan_changes(current: &Subscription, request: &MutationRequest) -> ItemPlan {
    let mut delete: Vec<SubscriptionItemId> = Vec::new();
    for id in &request.remove {
        if current.items.iter().any(|i| &i.id == id) {
            if !delete.contains(id) {
                delete.push(id.clone());
            }
        } else {
            tracing::warn!(
                subscription_id = %current.id,
                item_id = %id,
                "Item to remove no longer exists, skipping"
            );
        }
    }

    let mut add = Vec::new();
    for line in &request.add {
        let existing: Vec<_> = current
            .items_with_role(line.role)
            .filter(|i| !delete.contains(&i.id))
            .collect();

        if let [only] = existing.as_slice() {
            if line.is_satisfied_by(only) {
                continue;
            }
        }
        for item in existing {
            delete.push(item.id.clone());
        }
        add.push(line.clone());
    }

    ItemPlan { add, delete }
}

fn ensure_mutable(current: &Subscription, expected: SubscriptionKind) -> Result<(), BillingError> {
    if current.status.is_terminal() {
        return Err(BillingError::invalid_state(
            &current.id,
            format!("subscription is {}", current.status),
        ));
    }
    let kind = current.kind();
    if kind != expected {
        return Err(BillingError::invalid_state(
            &current.id,
            format!("expected a {} subscription, found a {}", expected, kind),
        ));
    }
    Ok(())
}

fn ensure_single_role(items: &[LineItem]) -> Result<(), BillingError> {
    let mut seen = BTreeSet::new();
    for item in items {
        if !seen.insert(item.role) {
            return Err(BillingError::RoleInvariantViolation { role: item.role });
        }
    }
    Ok(())
}

/// Applies item mutations to provider subscriptions.
pub struct SubscriptionMutationEngine {
    provider: Arc<dyn BillingProvider>,
    cache: Arc<dyn SubscriptionCache>,
}

impl SubscriptionMutationEngine {
    pub fn new(provider: Arc<dyn BillingProvider>, cache: Arc<dyn SubscriptionCache>) -> Self {
        Self { provider, cache }
    }

    /// Retrieves `id` from the provider and syncs it into the cache.
    pub async fn refresh(&self, id: &SubscriptionId) -> Result<Subscription, BillingError> {
        self.fetch(id)
            .await?
            .ok_or_else(|| BillingError::SubscriptionNotFound(id.clone()))
    }

    async fn fetch(&self, id: &SubscriptionId) -> Result<Option<Subscription>, BillingError> {
        let Some(subscription) = self.provider.retrieve_subscription(id).await? else {
            return Ok(None);
        };
        self.cache.sync(&subscription).await?;
        Ok(Some(subscription))
    }

    /// Fails with `InvalidSubscriptionState` when `id` does not resolve.
    pub async fn apply(&self, request: MutationRequest) -> Result<Subscription, BillingError> {
        let id = request.subscription_id.clone();

        let current = self
            .fetch(&id)
            .await?
            .ok_or_else(|| BillingError::invalid_state(&id, "subscription not found"))?;
        ensure_mutable(&current, request.expected_kind)?;
        ensure_single_role(&request.add)?;

        let plan = plan_changes(&current, &request);
        if plan.is_empty() {
            tracing::debug!(subscription_id = %id, "Subscription already matches, nothing to apply");
            return Ok(current);
        }

        let touched: BTreeSet<ItemRole> = plan.add.iter().map(|l| l.role).collect();
        let (added, deleted) = (plan.add.len(), plan.delete.len());
        self.write(&id, plan, request.proration).await?;

        let updated = self.refresh(&id).await?;
        for role in touched {
            if updated.items_with_role(role).count() > 1 {
                tracing::error!(
                    subscription_id = %id,
                    role = %role,
                    "Subscription holds more than one item for a role after mutation"
                );
                return Err(BillingError::RoleInvariantViolation { role });
            }
        }

        tracing::info!(
            subscription_id = %id,
            added,
            deleted,
            proration = request.proration.as_str(),
            "Subscription items updated"
        );
        Ok(updated)
    }

    /// Replaces one item with a persisted price, creating before deleting.
    ///
    /// Used by migrations, which move items onto catalog prices rather than
    /// inline price data.
    pub async fn swap_item(
        &self,
        subscription_id: &SubscriptionId,
        old: &SubscriptionItemId,
        new: NewSubscriptionItem,
    ) -> Result<Subscription, BillingError> {
        let current = self.refresh(subscription_id).await?;
        if current.status.is_terminal() {
            return Err(BillingError::invalid_state(
                subscription_id,
                format!("subscription is {}", current.status),
            ));
        }

        let new_item = self
            .provider
            .create_subscription_item(subscription_id, new)
            .await?;
        if let Err(err) = self
            .provider
            .delete_subscription_item(old, ProrationBehavior::None)
            .await
        {
            tracing::error!(
                subscription_id = %subscription_id,
                old_item = %old,
                new_item = %new_item,
                error = %err,
                "Replacement item created but old item not deleted"
            );
            return Err(err.into());
        }

        tracing::info!(
            subscription_id = %subscription_id,
            old_item = %old,
            new_item = %new_item,
            "Subscription item swapped"
        );
        self.refresh(subscription_id).await
    }

    async fn write(
        &self,
        id: &SubscriptionId,
        plan: ItemPlan,
        proration: ProrationBehavior,
    ) -> Result<(), BillingError> {
        if self.provider.supports_bundled_item_updates() {
            let changes = plan
                .add
                .into_iter()
                .map(ItemChange::Add)
                .chain(plan.delete.into_iter().map(ItemChange::Delete))
                .collect();
            self.provider
                .update_subscription_items(id, SubscriptionUpdate { changes, proration })
                .await?;
            return Ok(());
        }

        for line in plan.add {
            self.provider
                .create_subscription_item(id, NewSubscriptionItem::inline(line, proration))
                .await?;
        }
        for item in plan.delete {
            self.provider.delete_subscription_item(&item, proration).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemorySubscriptionCache, MockBillingProvider};
    use crate::domain::catalog::{Currency, Money, Recurrence};
    use crate::domain::foundation::{CustomerId, ProductId};
    use crate::domain::shipping::ZoneCode;
    use crate::domain::subscription::fixtures::{item, subscription};
    use crate::domain::subscription::SubscriptionStatus;
    use crate::ports::CreateSubscriptionRequest;

    fn membership(amount: i64) -> LineItem {
        LineItem::membership(
            ProductId::new("prod_books"),
            Money::new(amount, Currency::gbp()),
            Recurrence::monthly(),
        )
    }

    fn shipping(amount: i64) -> LineItem {
        LineItem::shipping(
            ProductId::new("prod_shipping"),
            Money::new(amount, Currency::gbp()),
            Recurrence::monthly(),
            &ZoneCode::new("UK").unwrap(),
        )
    }

    fn engine(mock: &MockBillingProvider) -> (SubscriptionMutationEngine, InMemorySubscriptionCache) {
        let cache = InMemorySubscriptionCache::new();
        let engine = SubscriptionMutationEngine::new(Arc::new(mock.clone()), Arc::new(cache.clone()));
        (engine, cache)
    }

    async fn live_subscription(mock: &MockBillingProvider, items: Vec<LineItem>) -> Subscription {
        mock.create_subscription(CreateSubscriptionRequest::new(CustomerId::new("cus_1"), items))
            .await
            .unwrap()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Planning
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn plan_replaces_items_of_added_roles() {
        let current = subscription(
            "sub_1",
            vec![
                item("si_m", "prod_books", 1000, ItemRole::Membership),
                item("si_s", "prod_shipping", 300, ItemRole::Shipping),
            ],
        );
        let request = MutationRequest::new(current.id.clone(), SubscriptionKind::Membership)
            .adding([membership(1200)]);

        let plan = plan_changes(&current, &request);
        assert_eq!(plan.add.len(), 1);
        assert_eq!(plan.delete, vec![SubscriptionItemId::new("si_m")]);
    }

    #[test]
    fn plan_skips_vanished_removals() {
        let current = subscription("sub_1", vec![item("si_m", "prod_books", 1000, ItemRole::Membership)]);
        let request = MutationRequest::new(current.id.clone(), SubscriptionKind::Membership)
            .removing(SubscriptionItemId::new("si_gone"));

        assert!(plan_changes(&current, &request).is_empty());
    }

    #[test]
    fn plan_deletes_every_duplicate_of_a_role() {
        let current = subscription(
            "sub_1",
            vec![
                item("si_a", "prod_books", 1000, ItemRole::Membership),
                item("si_b", "prod_books", 1000, ItemRole::Membership),
            ],
        );
        let request = MutationRequest::new(current.id.clone(), SubscriptionKind::Membership)
            .adding([membership(1000)]);

        let plan = plan_changes(&current, &request);
        assert_eq!(plan.add.len(), 1);
        assert_eq!(plan.delete.len(), 2);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Apply
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn apply_replaces_membership_and_keeps_shipping() {
        let mock = MockBillingProvider::new();
        let sub = live_subscription(&mock, vec![membership(1000), shipping(300)]).await;
        let (engine, cache) = engine(&mock);

        let updated = engine
            .apply(MutationRequest::new(sub.id.clone(), SubscriptionKind::Membership).adding([membership(1500)]))
            .await
            .unwrap();

        assert_eq!(updated.items.len(), 2);
        assert_eq!(updated.membership_price().unwrap().unit_amount.amount(), 1500);
        assert_eq!(cache.get(&sub.id).await.unwrap(), Some(updated));
        assert_eq!(mock.call_count("update_subscription_items"), 1);
    }

    #[tokio::test]
    async fn apply_twice_is_idempotent() {
        let mock = MockBillingProvider::new();
        let sub = live_subscription(&mock, vec![membership(1000)]).await;
        let (engine, _) = engine(&mock);
        let request = MutationRequest::new(sub.id.clone(), SubscriptionKind::Membership)
            .adding([membership(1200), shipping(300)]);

        let first = engine.apply(request.clone()).await.unwrap();
        mock.clear_calls();
        let second = engine.apply(request).await.unwrap();

        assert_eq!(first.items.len(), 2);
        assert_eq!(second.items, first.items);
        assert_eq!(mock.write_count(), 0);
    }

    #[tokio::test]
    async fn unbundled_provider_creates_before_deleting() {
        let mock = MockBillingProvider::without_bundled_updates();
        let sub = live_subscription(&mock, vec![membership(1000)]).await;
        let (engine, _) = engine(&mock);

        engine
            .apply(MutationRequest::new(sub.id.clone(), SubscriptionKind::Membership).adding([membership(1200)]))
            .await
            .unwrap();

        let writes: Vec<String> = mock
            .calls()
            .into_iter()
            .filter(|c| c.is_write() && c.method != "create_subscription")
            .map(|c| c.method)
            .collect();
        assert_eq!(writes, vec!["create_subscription_item", "delete_subscription_item"]);
    }

    #[tokio::test]
    async fn gift_giver_cannot_be_mutated_as_membership() {
        let mock = MockBillingProvider::new();
        let mut request = CreateSubscriptionRequest::new(CustomerId::new("cus_1"), vec![membership(1000)]);
        request.metadata.insert("gift_mode".into(), "true".into());
        let sub = mock.create_subscription(request).await.unwrap();
        let (engine, _) = engine(&mock);
        mock.clear_calls();

        let result = engine
            .apply(MutationRequest::new(sub.id.clone(), SubscriptionKind::Membership).adding([membership(1200)]))
            .await;

        assert!(matches!(result, Err(BillingError::InvalidSubscriptionState { .. })));
        assert_eq!(mock.write_count(), 0);
    }

    #[tokio::test]
    async fn canceled_subscription_is_refused() {
        let mock = MockBillingProvider::new();
        let sub = live_subscription(&mock, vec![membership(1000)]).await;
        mock.set_subscription_status(&sub.id, SubscriptionStatus::Canceled);
        let (engine, _) = engine(&mock);

        let result = engine
            .apply(MutationRequest::new(sub.id.clone(), SubscriptionKind::Membership).adding([membership(1200)]))
            .await;
        assert!(matches!(result, Err(BillingError::InvalidSubscriptionState { .. })));
    }

    #[tokio::test]
    async fn missing_subscription_is_an_invalid_state() {
        let mock = MockBillingProvider::new();
        let (engine, _) = engine(&mock);

        let result = engine
            .apply(
                MutationRequest::new(SubscriptionId::new("sub_missing"), SubscriptionKind::Membership)
                    .adding([membership(1200)]),
            )
            .await;
        assert!(matches!(
            result,
            Err(BillingError::InvalidSubscriptionState { ref subscription_id, .. })
                if subscription_id.as_str() == "sub_missing"
        ));
        assert_eq!(mock.write_count(), 0);
    }

    #[tokio::test]
    async fn refreshing_missing_subscription_is_not_found() {
        let mock = MockBillingProvider::new();
        let (engine, _) = engine(&mock);

        let result = engine.refresh(&SubscriptionId::new("sub_missing")).await;
        assert!(matches!(result, Err(BillingError::SubscriptionNotFound(_))));
    }

    #[tokio::test]
    async fn duplicate_roles_are_rejected_before_writing() {
        let mock = MockBillingProvider::new();
        let sub = live_subscription(&mock, vec![membership(1000)]).await;
        let (engine, _) = engine(&mock);
        mock.clear_calls();

        let result = engine
            .apply(
                MutationRequest::new(sub.id.clone(), SubscriptionKind::Membership)
                    .adding([membership(1200), membership(1300)]),
            )
            .await;

        assert!(matches!(
            result,
            Err(BillingError::RoleInvariantViolation { role: ItemRole::Membership })
        ));
        assert_eq!(mock.write_count(), 0);
    }
}
