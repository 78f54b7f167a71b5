//! Coupon aggregates: the fixed-capacity quota and per-user grants.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core_types::{Amount, CouponId, GrantId, UserId, Version};
use crate::error::MartError;

/// Fixed-capacity coupon pool.
///
/// # Invariants (enforced by private fields):
/// - `0 <= issued_quantity <= total_quantity`, always
/// - `total_quantity` and the validity window are immutable after creation
/// - `version` increments on every recorded issuance
///
/// All mutations go through [`CouponQuota::record_issue`]; a conditional
/// write against the version read before the mutation is what makes the
/// counter safe across processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponQuota {
    id: CouponId,
    name: String,
    discount_rate: u32,
    total_quantity: u32,
    issued_quantity: u32,
    validity_days: i64,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
    version: Version,
}

impl CouponQuota {
    /// Create a new quota with nothing issued yet.
    pub fn new(
        name: impl Into<String>,
        discount_rate: u32,
        total_quantity: u32,
        validity_days: i64,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            name: name.into(),
            discount_rate,
            total_quantity,
            issued_quantity: 0,
            validity_days,
            valid_from,
            valid_until,
            version: 0,
        }
    }

    /// Rebuild a quota from stored state. Store implementations only.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_stored(
        id: CouponId,
        name: String,
        discount_rate: u32,
        total_quantity: u32,
        issued_quantity: u32,
        validity_days: i64,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
        version: Version,
    ) -> Self {
        Self {
            id,
            name,
            discount_rate,
            total_quantity,
            issued_quantity,
            validity_days,
            valid_from,
            valid_until,
            version,
        }
    }

    pub(crate) fn with_id(mut self, id: CouponId) -> Self {
        self.id = id;
        self
    }

    #[inline(always)]
    pub fn id(&self) -> CouponId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline(always)]
    pub fn discount_rate(&self) -> u32 {
        self.discount_rate
    }

    #[inline(always)]
    pub fn total_quantity(&self) -> u32 {
        self.total_quantity
    }

    #[inline(always)]
    pub fn issued_quantity(&self) -> u32 {
        self.issued_quantity
    }

    #[inline(always)]
    pub fn validity_days(&self) -> i64 {
        self.validity_days
    }

    #[inline(always)]
    pub fn valid_from(&self) -> DateTime<Utc> {
        self.valid_from
    }

    #[inline(always)]
    pub fn valid_until(&self) -> DateTime<Utc> {
        self.valid_until
    }

    #[inline(always)]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Whether at least one grant is still available.
    pub fn can_issue(&self) -> bool {
        self.issued_quantity < self.total_quantity
    }

    /// Whether `now` falls inside the validity window (inclusive on both ends).
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && now <= self.valid_until
    }

    /// Grants still unissued.
    pub fn remaining(&self) -> u32 {
        self.total_quantity - self.issued_quantity
    }

    /// Record one issuance.
    ///
    /// # Errors
    /// [`MartError::SoldOut`] when the pool is exhausted.
    ///
    /// # Effects
    /// Increments `issued_quantity` and `version`.
    pub fn record_issue(&mut self) -> Result<(), MartError> {
        if !self.can_issue() {
            return Err(MartError::SoldOut);
        }
        self.issued_quantity += 1;
        self.version = self.version.wrapping_add(1);
        Ok(())
    }

    /// Discount amount for an order total.
    pub fn discount_for(&self, order_amount: Amount) -> Amount {
        order_amount * self.discount_rate as Amount / 100
    }
}

/// Lifecycle state of an issued grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantStatus {
    Available,
    Used,
    Expired,
}

impl GrantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantStatus::Available => "AVAILABLE",
            GrantStatus::Used => "USED",
            GrantStatus::Expired => "EXPIRED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "AVAILABLE" => Some(GrantStatus::Available),
            "USED" => Some(GrantStatus::Used),
            "EXPIRED" => Some(GrantStatus::Expired),
            _ => None,
        }
    }
}

/// One user's grant of one coupon.
///
/// At most one grant exists per (user, coupon) pair; the store enforces the
/// uniqueness under the same conditional write that bumps the quota counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGrant {
    pub id: GrantId,
    pub user_id: UserId,
    pub coupon_id: CouponId,
    pub name: String,
    pub discount_rate: u32,
    pub status: GrantStatus,
    pub issued_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl UserGrant {
    /// Build the grant for a successful issuance. The store assigns `id`.
    pub fn issue(user_id: UserId, quota: &CouponQuota, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            user_id,
            coupon_id: quota.id(),
            name: quota.name().to_string(),
            discount_rate: quota.discount_rate(),
            status: GrantStatus::Available,
            issued_at: now,
            used_at: None,
            expires_at: now + Duration::days(quota.validity_days()),
        }
    }

    /// Usable: still AVAILABLE and not past its expiry.
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.status == GrantStatus::Available && now <= self.expires_at
    }

    /// Mark the grant used.
    ///
    /// # Errors
    /// [`MartError::CouponNotAvailable`] when already used, expired, or past
    /// its expiry timestamp.
    pub fn use_grant(&mut self, now: DateTime<Utc>) -> Result<(), MartError> {
        if !self.is_available(now) {
            return Err(MartError::CouponNotAvailable);
        }
        self.status = GrantStatus::Used;
        self.used_at = Some(now);
        Ok(())
    }

    /// Mark the grant expired.
    pub fn expire(&mut self) {
        self.status = GrantStatus::Expired;
    }

    /// Still AVAILABLE but past its expiry timestamp.
    pub fn should_expire(&self, now: DateTime<Utc>) -> bool {
        self.status == GrantStatus::Available && now > self.expires_at
    }

    /// Discount amount for an order total.
    pub fn discount_for(&self, order_amount: Amount) -> Amount {
        order_amount * self.discount_rate as Amount / 100
    }
}
