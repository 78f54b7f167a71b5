//! First-come-first-served coupon issuance.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::models::{CouponQuota, GrantStatus, UserGrant};
use super::repository::CouponStore;
use crate::core_types::{CouponId, UserId};
use crate::error::MartError;
use crate::lock::LockManager;
use crate::retry::{self, RetryPolicy};

/// Issuance and grant lifecycle over a [`CouponStore`].
///
/// The keyed mutex serializes in-process callers per coupon so the
/// duplicate-check / counter-bump / grant-insert sequence rarely conflicts
/// locally; the store's conditional write remains the guard that holds when
/// other processes mutate the same quota.
pub struct CouponService {
    store: Arc<dyn CouponStore>,
    locks: Arc<LockManager>,
    retry: RetryPolicy,
}

impl CouponService {
    pub fn new(store: Arc<dyn CouponStore>, locks: Arc<LockManager>, retry: RetryPolicy) -> Self {
        Self { store, locks, retry }
    }

    /// Issue `coupon_id` to `user_id`.
    ///
    /// Per attempt, against a fresh snapshot:
    /// 1. quota must exist,
    /// 2. now must be inside the validity window,
    /// 3. the user must not already hold a grant,
    /// 4. the pool must not be sold out,
    /// 5. the counter bump and grant insert commit conditionally on the
    ///    version read in step 1; a conflict re-runs the whole sequence.
    pub async fn issue(&self, user_id: UserId, coupon_id: CouponId) -> Result<UserGrant, MartError> {
        let key = format!("coupon:{}", coupon_id);
        self.locks
            .with_lock(&key, || async move {
                retry::execute(&self.retry, || self.try_issue(user_id, coupon_id)).await
            })
            .await
    }

    async fn try_issue(&self, user_id: UserId, coupon_id: CouponId) -> Result<UserGrant, MartError> {
        let now = Utc::now();

        let mut quota = self
            .store
            .find_quota(coupon_id)
            .await?
            .ok_or(MartError::CouponNotFound)?;

        if !quota.is_within_window(now) {
            return Err(MartError::CouponNotAvailable);
        }

        if self.store.find_grant(user_id, coupon_id).await?.is_some() {
            return Err(MartError::AlreadyIssued);
        }

        let expected = quota.version();
        quota.record_issue()?;
        let grant = UserGrant::issue(user_id, &quota, now);

        match self.store.commit_issue(quota, expected, grant).await? {
            Some(saved) => {
                tracing::info!(user_id, coupon_id, grant_id = saved.id, "coupon issued");
                Ok(saved)
            }
            None => Err(MartError::VersionConflict {
                resource: format!("coupon:{}", coupon_id),
                expected,
            }),
        }
    }

    /// Create a new quota (setup path).
    pub async fn create_quota(
        &self,
        name: &str,
        discount_rate: u32,
        total_quantity: u32,
        validity_days: i64,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Result<CouponQuota, MartError> {
        let quota = CouponQuota::new(
            name,
            discount_rate,
            total_quantity,
            validity_days,
            valid_from,
            valid_until,
        );
        self.store.create_quota(quota).await
    }

    pub async fn get_quota(&self, coupon_id: CouponId) -> Result<CouponQuota, MartError> {
        self.store
            .find_quota(coupon_id)
            .await?
            .ok_or(MartError::CouponNotFound)
    }

    /// All grants held by a user, expiring any that lapsed since last read.
    pub async fn grants_for(&self, user_id: UserId) -> Result<Vec<UserGrant>, MartError> {
        let now = Utc::now();
        let mut grants = self.store.grants_for_user(user_id).await?;

        for grant in grants.iter_mut() {
            if grant.should_expire(now) {
                grant.expire();
                self.store.save_grant(grant.clone()).await?;
            }
        }

        Ok(grants)
    }

    /// Grants a user can still apply to an order.
    pub async fn available_grants_for(&self, user_id: UserId) -> Result<Vec<UserGrant>, MartError> {
        let now = Utc::now();
        let grants = self.store.grants_for_user(user_id).await?;
        Ok(grants
            .into_iter()
            .filter(|g| g.status == GrantStatus::Available && g.is_available(now))
            .collect())
    }

    /// Mark a held grant as used.
    pub async fn use_grant(&self, user_id: UserId, coupon_id: CouponId) -> Result<UserGrant, MartError> {
        let now = Utc::now();
        let mut grant = self
            .store
            .find_grant(user_id, coupon_id)
            .await?
            .ok_or(MartError::CouponNotFound)?;

        grant.use_grant(now)?;
        self.store.save_grant(grant).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupon::repository::MemoryCouponStore;
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    fn service() -> CouponService {
        CouponService::new(
            Arc::new(MemoryCouponStore::new()),
            Arc::new(LockManager::new(Duration::from_secs(10))),
            RetryPolicy::low_contention(),
        )
    }

    async fn open_quota(svc: &CouponService, total: u32) -> CouponQuota {
        let now = Utc::now();
        svc.create_quota(
            "test coupon",
            10,
            total,
            30,
            now - ChronoDuration::hours(1),
            now + ChronoDuration::days(7),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_issue_grants_and_counts() {
        let svc = service();
        let quota = open_quota(&svc, 2).await;

        let grant = svc.issue(7, quota.id()).await.unwrap();
        assert_eq!(grant.user_id, 7);
        assert_eq!(grant.coupon_id, quota.id());
        assert_eq!(grant.status, GrantStatus::Available);

        let stored = svc.get_quota(quota.id()).await.unwrap();
        assert_eq!(stored.issued_quantity(), 1);
        assert_eq!(stored.remaining(), 1);
    }

    #[tokio::test]
    async fn test_issue_unknown_coupon() {
        let svc = service();
        let err = svc.issue(7, 999).await;
        assert!(matches!(err, Err(MartError::CouponNotFound)));
    }

    #[tokio::test]
    async fn test_issue_outside_window() {
        let svc = service();
        let now = Utc::now();
        let quota = svc
            .create_quota(
                "not yet open",
                10,
                5,
                30,
                now + ChronoDuration::days(1),
                now + ChronoDuration::days(7),
            )
            .await
            .unwrap();

        let err = svc.issue(7, quota.id()).await;
        assert!(matches!(err, Err(MartError::CouponNotAvailable)));
    }

    #[tokio::test]
    async fn test_duplicate_issue_rejected() {
        let svc = service();
        let quota = open_quota(&svc, 5).await;

        svc.issue(7, quota.id()).await.unwrap();
        let err = svc.issue(7, quota.id()).await;
        assert!(matches!(err, Err(MartError::AlreadyIssued)));

        // Counter moved exactly once
        assert_eq!(svc.get_quota(quota.id()).await.unwrap().issued_quantity(), 1);
    }

    #[tokio::test]
    async fn test_sold_out_after_capacity() {
        let svc = service();
        let quota = open_quota(&svc, 2).await;

        svc.issue(1, quota.id()).await.unwrap();
        svc.issue(2, quota.id()).await.unwrap();

        let err = svc.issue(3, quota.id()).await;
        assert!(matches!(err, Err(MartError::SoldOut)));
        assert_eq!(svc.get_quota(quota.id()).await.unwrap().issued_quantity(), 2);
    }

    #[tokio::test]
    async fn test_use_grant_once() {
        let svc = service();
        let quota = open_quota(&svc, 5).await;
        svc.issue(7, quota.id()).await.unwrap();

        let used = svc.use_grant(7, quota.id()).await.unwrap();
        assert_eq!(used.status, GrantStatus::Used);
        assert!(used.used_at.is_some());

        let err = svc.use_grant(7, quota.id()).await;
        assert!(matches!(err, Err(MartError::CouponNotAvailable)));
    }

    #[tokio::test]
    async fn test_grants_listing_and_availability() {
        let svc = service();
        let a = open_quota(&svc, 5).await;
        let b = open_quota(&svc, 5).await;

        svc.issue(7, a.id()).await.unwrap();
        svc.issue(7, b.id()).await.unwrap();
        svc.use_grant(7, a.id()).await.unwrap();

        let all = svc.grants_for(7).await.unwrap();
        assert_eq!(all.len(), 2);

        let available = svc.available_grants_for(7).await.unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].coupon_id, b.id());
    }
}
