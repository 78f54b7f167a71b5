//! Crate-wide error taxonomy
//!
//! Two disjoint families: domain rejections (deterministic, never retried)
//! and contention failures (transient, retried up to a bound). The
//! `is_retryable` flag is what the retry loop consults - callers never need
//! to pattern-match on error identity to decide whether to loop.

use thiserror::Error;

use crate::core_types::Version;

/// All errors surfaced by the contention core.
///
/// Error codes match the service error table for consistent API responses.
#[derive(Error, Debug, Clone)]
pub enum MartError {
    // === Coupon rejections ===
    #[error("Coupon not found")]
    CouponNotFound,

    #[error("Coupon is outside its validity window")]
    CouponNotAvailable,

    #[error("Coupon already issued to this user")]
    AlreadyIssued,

    #[error("Coupon quota exhausted")]
    SoldOut,

    // === Stock rejections ===
    #[error("Product not found")]
    ProductNotFound,

    #[error("Insufficient stock")]
    InsufficientStock,

    // === Balance rejections ===
    #[error("Amount must be positive and within the single-operation limit")]
    InvalidAmount,

    #[error("Insufficient point balance")]
    InsufficientBalance,

    #[error("Maximum point balance exceeded")]
    MaxBalanceExceeded,

    #[error("No balance exists for this user")]
    BalanceNotFound,

    // === Contention failures ===
    #[error("Version conflict on {resource} (read v{expected})")]
    VersionConflict { resource: String, expected: Version },

    #[error("Timed out acquiring lock for key {key}")]
    LockTimeout { key: String },

    #[error("Concurrency retry budget exhausted after {attempts} attempts")]
    ConcurrencyExhausted { attempts: u32 },

    // === System errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MartError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            MartError::CouponNotFound => "COUPON_NOT_FOUND",
            MartError::CouponNotAvailable => "COUPON_NOT_AVAILABLE",
            MartError::AlreadyIssued => "COUPON_ALREADY_ISSUED",
            MartError::SoldOut => "COUPON_SOLD_OUT",
            MartError::ProductNotFound => "PRODUCT_NOT_FOUND",
            MartError::InsufficientStock => "PRODUCT_INSUFFICIENT_STOCK",
            MartError::InvalidAmount => "POINT_INVALID_AMOUNT",
            MartError::InsufficientBalance => "POINT_INSUFFICIENT_BALANCE",
            MartError::MaxBalanceExceeded => "POINT_MAX_BALANCE_EXCEEDED",
            MartError::BalanceNotFound => "POINT_NOT_FOUND",
            MartError::VersionConflict { .. } => "VERSION_CONFLICT",
            MartError::LockTimeout { .. } => "LOCK_TIMEOUT",
            MartError::ConcurrencyExhausted { .. } => "CONCURRENCY_EXHAUSTED",
            MartError::Database(_) => "DATABASE_ERROR",
            MartError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            MartError::CouponNotFound | MartError::ProductNotFound | MartError::BalanceNotFound => {
                404
            }
            MartError::CouponNotAvailable
            | MartError::InsufficientStock
            | MartError::InvalidAmount
            | MartError::InsufficientBalance
            | MartError::MaxBalanceExceeded => 400,
            MartError::AlreadyIssued | MartError::SoldOut | MartError::VersionConflict { .. } => {
                409
            }
            // Server-busy: the caller should retry the whole request later
            MartError::LockTimeout { .. } | MartError::ConcurrencyExhausted { .. } => 503,
            MartError::Database(_) | MartError::Internal(_) => 500,
        }
    }

    /// Whether the retry loop may re-attempt the operation.
    ///
    /// True only for transient contention signals. Domain rejections are
    /// deterministic - re-running the identical operation fails identically -
    /// and `ConcurrencyExhausted` is the loop's own terminal outcome, so
    /// neither is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MartError::VersionConflict { .. } | MartError::LockTimeout { .. }
        )
    }
}

impl From<sqlx::Error> for MartError {
    fn from(e: sqlx::Error) -> Self {
        MartError::Database(e.to_string())
    }
}

impl From<anyhow::Error> for MartError {
    fn from(e: anyhow::Error) -> Self {
        MartError::Internal(e.to_string())
    }
}
