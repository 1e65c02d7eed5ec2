//! Error types for the domain layer.

use std::fmt;
use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: String,
        min: i64,
        max: i64,
        actual: i64,
    },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    /// Creates an out of range validation error.
    pub fn out_of_range(field: impl Into<String>, min: i64, max: i64, actual: i64) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min,
            max,
            actual,
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Error codes organized by category.
///
/// Stable machine-readable codes that callers map to form errors or
/// HTTP statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Validation errors
    ValidationFailed,
    NegativeAmount,

    // Not found errors
    SubscriptionNotFound,
    CustomerNotFound,

    // Pricing errors
    AmbiguousProduct,

    // State errors
    InvalidSubscriptionState,
    RoleInvariantViolation,

    // Gift errors
    AlreadyMember,
    UnredeemableCode,

    // Batch errors
    ClassificationFailed,

    // Infrastructure errors
    ExternalServiceError,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::NegativeAmount => "NEGATIVE_AMOUNT",
            ErrorCode::SubscriptionNotFound => "SUBSCRIPTION_NOT_FOUND",
            ErrorCode::CustomerNotFound => "CUSTOMER_NOT_FOUND",
            ErrorCode::AmbiguousProduct => "AMBIGUOUS_PRODUCT",
            ErrorCode::InvalidSubscriptionState => "INVALID_SUBSCRIPTION_STATE",
            ErrorCode::RoleInvariantViolation => "ROLE_INVARIANT_VIOLATION",
            ErrorCode::AlreadyMember => "ALREADY_MEMBER",
            ErrorCode::UnredeemableCode => "UNREDEEMABLE_CODE",
            ErrorCode::ClassificationFailed => "CLASSIFICATION_FAILED",
            ErrorCode::ExternalServiceError => "EXTERNAL_SERVICE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", s)
    }
}
