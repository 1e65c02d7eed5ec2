//! Billing error taxonomy.
//!
//! Every handler surfaces `BillingError`. Component errors propagate to the
//! caller unchanged; only batch jobs catch them, per record.
//!
//! | Error | Meaning for the caller |
//! |-------|------------------------|
//! | AmbiguousProduct | ask the user which product they meant |
//! | InvalidSubscriptionState | mutation refused, nothing was written |
//! | AlreadyMember | recipient already holds a membership |
//! | UnredeemableCode | show the reason on the redemption form |
//! | Classification | legacy record skipped and reported |
//! | RoleInvariantViolation | composer bug, never recoverable |

use std::fmt;

use thiserror::Error;

use crate::domain::foundation::{
    ErrorCode, ProductId, SubscriptionId, UserId, ValidationError,
};
use crate::domain::legacy::ClassificationError;
use crate::domain::subscription::ItemRole;

/// Why a gift code cannot be redeemed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnredeemableReason {
    /// No promotion code exists for the input.
    NotFound,
    /// The code exists but is an ordinary discount code.
    NotGiftCode,
    /// The redemption counter is exhausted.
    AlreadyRedeemed,
    /// The linked giver subscription is canceled or expired.
    GiverInactive,
}

impl fmt::Display for UnredeemableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnredeemableReason::NotFound => "not a real code",
            UnredeemableReason::NotGiftCode => "not a gift code",
            UnredeemableReason::AlreadyRedeemed => "already redeemed",
            UnredeemableReason::GiverInactive => "gift is no longer active",
        };
        write!(f, "{}", s)
    }
}

/// Errors surfaced by pricing, mutation, gift and migration handlers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BillingError {
    #[error("Price {price_id} cannot be resolved to a single product ({} candidates)", .candidates.len())]
    AmbiguousProduct {
        price_id: String,
        candidates: Vec<ProductId>,
    },

    #[error("Subscription {subscription_id} cannot be mutated: {reason}")]
    InvalidSubscriptionState {
        subscription_id: SubscriptionId,
        reason: String,
    },

    #[error("User {user_id} already holds an active membership")]
    AlreadyMember { user_id: UserId },

    #[error("Code '{code}' cannot be redeemed: {reason}")]
    UnredeemableCode {
        code: String,
        reason: UnredeemableReason,
    },

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error("More than one {role} item in a single mutation")]
    RoleInvariantViolation { role: ItemRole },

    #[error("Amounts cannot be negative (got {amount})")]
    NegativeAmount { amount: i64 },

    #[error("Subscription {0} not found")]
    SubscriptionNotFound(SubscriptionId),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Billing provider error: {message}")]
    Provider { message: String, retryable: bool },
}

impl BillingError {
    pub fn invalid_state(subscription_id: &SubscriptionId, reason: impl Into<String>) -> Self {
        BillingError::InvalidSubscriptionState {
            subscription_id: subscription_id.clone(),
            reason: reason.into(),
        }
    }

    pub fn unredeemable(code: impl Into<String>, reason: UnredeemableReason) -> Self {
        BillingError::UnredeemableCode {
            code: code.into(),
            reason,
        }
    }

    pub fn provider(message: impl Into<String>) -> Self {
        BillingError::Provider {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns the stable error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            BillingError::AmbiguousProduct { .. } => ErrorCode::AmbiguousProduct,
            BillingError::InvalidSubscriptionState { .. } => ErrorCode::InvalidSubscriptionState,
            BillingError::AlreadyMember { .. } => ErrorCode::AlreadyMember,
            BillingError::UnredeemableCode { .. } => ErrorCode::UnredeemableCode,
            BillingError::Classification(_) => ErrorCode::ClassificationFailed,
            BillingError::RoleInvariantViolation { .. } => ErrorCode::RoleInvariantViolation,
            BillingError::NegativeAmount { .. } => ErrorCode::NegativeAmount,
            BillingError::SubscriptionNotFound(_) => ErrorCode::SubscriptionNotFound,
            BillingError::Validation(_) => ErrorCode::ValidationFailed,
            BillingError::Provider { .. } => ErrorCode::ExternalServiceError,
        }
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BillingError::Provider { retryable: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unredeemable_reason_is_user_readable() {
        let err = BillingError::unredeemable("GIFT-1", UnredeemableReason::AlreadyRedeemed);
        assert_eq!(err.to_string(), "Code 'GIFT-1' cannot be redeemed: already redeemed");
        assert_eq!(err.code(), ErrorCode::UnredeemableCode);
    }

    #[test]
    fn ambiguous_product_reports_candidate_count() {
        let err = BillingError::AmbiguousProduct {
            price_id: "pp_1".to_string(),
            candidates: vec![ProductId::new("prod_a"), ProductId::new("prod_b")],
        };
        assert!(err.to_string().contains("2 candidates"));
    }

    #[test]
    fn validation_errors_convert() {
        let err: BillingError = ValidationError::empty_field("code").into();
        assert_eq!(err.code(), ErrorCode::ValidationFailed);
        assert!(!err.is_retryable());
    }

    #[test]
    fn role_violation_names_role() {
        let err = BillingError::RoleInvariantViolation {
            role: ItemRole::Shipping,
        };
        assert_eq!(err.to_string(), "More than one shipping item in a single mutation");
    }
}
