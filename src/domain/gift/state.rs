//! Gift lifecycle state machine and redeemability rules.

use serde::{Deserialize, Serialize};

use crate::domain::errors::UnredeemableReason;
use crate::domain::foundation::StateMachine;
use crate::domain::subscription::{Subscription, SubscriptionStatus};

use super::PromotionCode;

/// Lifecycle of one gift, as seen from the giver's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GiftState {
    /// Nothing created yet.
    None,
    /// Giver subscription exists in gift mode.
    GiverConfigured,
    /// Promotion code minted and linked both ways.
    CodeMinted,
    /// A recipient subscription was created from the code.
    Redeemed,
    /// The giver subscription failed its first payment.
    Expired,
    /// The giver subscription was canceled before redemption.
    Canceled,
}

impl GiftState {
    /// Derives the state from the giver subscription and its code.
    pub fn observe(giver: &Subscription, code: Option<&PromotionCode>) -> Self {
        if !giver.is_gift_mode() {
            return GiftState::None;
        }
        let meta = giver.meta();
        if meta.gift_recipient_subscription.is_some()
            || code.map_or(false, |c| c.times_redeemed > 0)
        {
            return GiftState::Redeemed;
        }
        match giver.status {
            SubscriptionStatus::IncompleteExpired => return GiftState::Expired,
            SubscriptionStatus::Canceled => return GiftState::Canceled,
            _ => {}
        }
        if meta.promo_code.is_some() && code.is_some() {
            GiftState::CodeMinted
        } else {
            GiftState::GiverConfigured
        }
    }
}

impl StateMachine for GiftState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use GiftState::*;
        matches!(
            (self, target),
            (None, GiverConfigured)
                | (GiverConfigured, CodeMinted)
                | (GiverConfigured, Canceled)
                | (GiverConfigured, Expired)
                | (CodeMinted, Redeemed)
                | (CodeMinted, Expired)
                | (CodeMinted, Canceled)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use GiftState::*;
        match self {
            None => vec![GiverConfigured],
            GiverConfigured => vec![CodeMinted, Canceled, Expired],
            CodeMinted => vec![Redeemed, Expired, Canceled],
            Redeemed | Expired | Canceled => vec![],
        }
    }
}

/// Checks whether `code` can be redeemed against `giver`.
///
/// `giver` is `None` when the linked subscription could not be found.
pub fn check_redeemable(
    code: &PromotionCode,
    giver: Option<&Subscription>,
) -> Result<(), UnredeemableReason> {
    if !code.is_gift_code() {
        return Err(UnredeemableReason::NotGiftCode);
    }
    if !code.active || !code.has_redemptions_left() {
        return Err(UnredeemableReason::AlreadyRedeemed);
    }
    match giver {
        Some(sub) if !sub.status.is_terminal() => Ok(()),
        _ => Err(UnredeemableReason::GiverInactive),
    }
}
