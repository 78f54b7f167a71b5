//! Core types used throughout the system
//!
//! These are fundamental type aliases used by all modules.
//! They provide semantic meaning and enable future type evolution.

/// User ID - globally unique, immutable after assignment.
///
/// # Usage:
/// - Primary key for balances and grant ownership
/// - Used in map keys for O(1) account lookup
pub type UserId = u64;

/// Coupon ID - identifies one fixed-capacity coupon pool.
pub type CouponId = u64;

/// Product ID - identifies one stock counter.
pub type ProductId = u64;

/// Grant ID - store-assigned identity of an issued user grant.
pub type GrantId = u64;

/// Version token attached to every mutable aggregate.
///
/// Monotonically increasing; a conditional write succeeds only if the
/// stored version still equals the version the snapshot was read at.
pub type Version = u64;

/// Point amount in won. Signed so that arithmetic on deltas stays in one
/// domain; validated non-negative at every aggregate boundary.
pub type Amount = i64;
