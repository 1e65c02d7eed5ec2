//! GiftLookup - resolves user-entered gift codes to codes and subscriptions.
//!
//! Input may be the customer-facing code (any case) or a `promo_` id.
//! Malformed input is treated as "no such code", never as an error.

use std::sync::Arc;

use crate::domain::errors::{BillingError, UnredeemableReason};
use crate::domain::gift::{check_redeemable, GiftCodeRef, PromotionCode};
use crate::domain::subscription::{Subscription, SubscriptionKind};
use crate::ports::{BillingProvider, SubscriptionCache};

/// A subscription together with the code its `promo_code` link names.
#[derive(Debug, Clone)]
pub struct SubscriptionWithCode {
    pub subscription: Subscription,
    pub promotion_code: Option<PromotionCode>,
}

pub struct GiftLookup {
    provider: Arc<dyn BillingProvider>,
    cache: Arc<dyn SubscriptionCache>,
}

impl GiftLookup {
    pub fn new(provider: Arc<dyn BillingProvider>, cache: Arc<dyn SubscriptionCache>) -> Self {
        Self { provider, cache }
    }

    /// The promotion code `input` refers to.
    pub async fn find_code(&self, input: &str) -> Result<Option<PromotionCode>, BillingError> {
        let Ok(reference) = GiftCodeRef::parse(input) else {
            return Ok(None);
        };
        match &reference {
            GiftCodeRef::Id(id) => Ok(self.provider.retrieve_promotion_code(id).await?),
            GiftCodeRef::Code(code) => Ok(self
                .provider
                .list_promotion_codes(code.as_str())
                .await?
                .into_iter()
                .find(|c| c.matches(&reference))),
        }
    }

    /// True for a limited-use code minted for a gift, redeemed or not.
    pub async fn is_real_gift_code(&self, input: &str) -> Result<bool, BillingError> {
        Ok(self
            .find_code(input)
            .await?
            .map_or(false, |c| c.max_redemptions.is_some() && c.is_gift_code()))
    }

    /// Resolves `input` to a code that can be redeemed right now.
    ///
    /// Fails with `UnredeemableCode` naming why not.
    pub async fn redeemable_code(
        &self,
        input: &str,
    ) -> Result<(PromotionCode, Subscription), BillingError> {
        let code = self
            .find_code(input)
            .await?
            .ok_or_else(|| BillingError::unredeemable(input.trim(), UnredeemableReason::NotFound))?;
        let giver = match code.giver_subscription() {
            Some(id) => self.fresh(&id).await?,
            None => return Err(BillingError::unredeemable(&code.code, UnredeemableReason::NotGiftCode)),
        };

        check_redeemable(&code, giver.as_ref())
            .map_err(|reason| BillingError::unredeemable(&code.code, reason))?;
        match giver {
            Some(giver) => Ok((code, giver)),
            None => Err(BillingError::unredeemable(&code.code, UnredeemableReason::GiverInactive)),
        }
    }

    pub async fn is_redeemable(&self, input: &str) -> Result<bool, BillingError> {
        match self.redeemable_code(input).await {
            Ok(_) => Ok(true),
            Err(BillingError::UnredeemableCode { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// The giver subscription a code was minted for, fresh from the provider.
    pub async fn gift_giver_subscription_from_code(
        &self,
        input: &str,
    ) -> Result<Option<Subscription>, BillingError> {
        match self.find_code(input).await?.and_then(|c| c.giver_subscription()) {
            Some(id) => self.fresh(&id).await,
            None => Ok(None),
        }
    }

    /// The recipient subscription created from a code, from the local cache.
    pub async fn gift_recipient_subscription_from_code(
        &self,
        input: &str,
    ) -> Result<Option<Subscription>, BillingError> {
        let Some(code) = self.find_code(input).await? else {
            return Ok(None);
        };
        Ok(self
            .cache
            .find_by_promo_code(&code.id)
            .await?
            .into_iter()
            .find(|s| s.kind() == SubscriptionKind::GiftRecipient))
    }

    /// Attaches the code named by the subscription's `promo_code` link.
    pub async fn subscription_with_promo_code(
        &self,
        subscription: Subscription,
    ) -> Result<SubscriptionWithCode, BillingError> {
        let promotion_code = match subscription.meta().promo_code {
            Some(id) => self.provider.retrieve_promotion_code(&id).await?,
            None => None,
        };
        Ok(SubscriptionWithCode {
            subscription,
            promotion_code,
        })
    }

    async fn fresh(
        &self,
        id: &crate::domain::foundation::SubscriptionId,
    ) -> Result<Option<Subscription>, BillingError> {
        let subscription = self.provider.retrieve_subscription(id).await?;
        if let Some(sub) = &subscription {
            self.cache.sync(sub).await?;
        }
        Ok(subscription)
    }
}
