//! Coupon store abstraction and the in-memory implementation.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use super::models::{CouponQuota, UserGrant};
use crate::core_types::{CouponId, UserId, Version};
use crate::error::MartError;

/// Data access for quotas and grants.
///
/// `commit_issue` is the contention-bearing operation: it must apply the
/// bumped quota and insert the grant as one atomic unit, conditioned on the
/// stored quota version, and report a mismatch instead of writing.
#[async_trait]
pub trait CouponStore: Send + Sync {
    async fn find_quota(&self, coupon_id: CouponId) -> Result<Option<CouponQuota>, MartError>;

    /// Persist a new quota, assigning its id.
    async fn create_quota(&self, quota: CouponQuota) -> Result<CouponQuota, MartError>;

    async fn find_grant(
        &self,
        user_id: UserId,
        coupon_id: CouponId,
    ) -> Result<Option<UserGrant>, MartError>;

    /// All grants held by a user, oldest first.
    async fn grants_for_user(&self, user_id: UserId) -> Result<Vec<UserGrant>, MartError>;

    /// Persist a status change to an existing grant.
    async fn save_grant(&self, grant: UserGrant) -> Result<UserGrant, MartError>;

    /// Conditionally commit one issuance: write `quota` and insert `grant`
    /// iff the stored version equals `expected_version`.
    ///
    /// Returns the saved grant on success, `None` on version mismatch.
    async fn commit_issue(
        &self,
        quota: CouponQuota,
        expected_version: Version,
        grant: UserGrant,
    ) -> Result<Option<UserGrant>, MartError>;
}

/// Thread-safe in-memory store.
///
/// The single-process stand-in for the SQL store: CAS atomicity comes from
/// holding the quota's map guard across the version check, counter write,
/// and grant insert.
pub struct MemoryCouponStore {
    quotas: DashMap<CouponId, CouponQuota>,
    grants: DashMap<(UserId, CouponId), UserGrant>,
    quota_seq: AtomicU64,
    grant_seq: AtomicU64,
}

impl MemoryCouponStore {
    pub fn new() -> Self {
        Self {
            quotas: DashMap::new(),
            grants: DashMap::new(),
            quota_seq: AtomicU64::new(1),
            grant_seq: AtomicU64::new(1),
        }
    }

    /// Drop everything. Test hook.
    pub fn clear(&self) {
        self.quotas.clear();
        self.grants.clear();
    }
}

impl Default for MemoryCouponStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CouponStore for MemoryCouponStore {
    async fn find_quota(&self, coupon_id: CouponId) -> Result<Option<CouponQuota>, MartError> {
        Ok(self.quotas.get(&coupon_id).map(|q| q.clone()))
    }

    async fn create_quota(&self, quota: CouponQuota) -> Result<CouponQuota, MartError> {
        let id = self.quota_seq.fetch_add(1, Ordering::SeqCst);
        let quota = quota.with_id(id);
        self.quotas.insert(id, quota.clone());
        Ok(quota)
    }

    async fn find_grant(
        &self,
        user_id: UserId,
        coupon_id: CouponId,
    ) -> Result<Option<UserGrant>, MartError> {
        Ok(self.grants.get(&(user_id, coupon_id)).map(|g| g.clone()))
    }

    async fn grants_for_user(&self, user_id: UserId) -> Result<Vec<UserGrant>, MartError> {
        let mut grants: Vec<UserGrant> = self
            .grants
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        grants.sort_by_key(|g| g.id);
        Ok(grants)
    }

    async fn save_grant(&self, grant: UserGrant) -> Result<UserGrant, MartError> {
        self.grants
            .insert((grant.user_id, grant.coupon_id), grant.clone());
        Ok(grant)
    }

    async fn commit_issue(
        &self,
        quota: CouponQuota,
        expected_version: Version,
        mut grant: UserGrant,
    ) -> Result<Option<UserGrant>, MartError> {
        let mut slot = match self.quotas.get_mut(&quota.id()) {
            Some(slot) => slot,
            None => return Ok(None),
        };
        if slot.version() != expected_version {
            return Ok(None);
        }

        // The shard guard on this quota serializes the whole commit: version
        // check, counter write, and grant insert happen as one step.
        grant.id = self.grant_seq.fetch_add(1, Ordering::SeqCst);
        self.grants
            .insert((grant.user_id, grant.coupon_id), grant.clone());
        *slot = quota;
        Ok(Some(grant))
    }
}
