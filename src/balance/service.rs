//! Point charging and payment under optimistic concurrency.

use std::sync::Arc;

use chrono::Utc;

use super::models::{EntryKind, LedgerEntry, PointBalance};
use super::repository::BalanceStore;
use crate::core_types::{Amount, UserId};
use crate::error::MartError;
use crate::retry::{self, RetryPolicy};

/// Charge/spend over a [`BalanceStore`].
///
/// Validation happens on the snapshot inside each attempt, so deterministic
/// rejections (bad amount, limit breaches, insufficient balance) surface
/// immediately; only version conflicts loop.
pub struct BalanceService {
    store: Arc<dyn BalanceStore>,
    retry: RetryPolicy,
}

impl BalanceService {
    pub fn new(store: Arc<dyn BalanceStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Current balance, created at zero on first touch.
    pub async fn balance_of(&self, user_id: UserId) -> Result<PointBalance, MartError> {
        self.store.find_or_create(user_id).await
    }

    /// Wallet top-up.
    pub async fn charge(&self, user_id: UserId, amount: Amount) -> Result<PointBalance, MartError> {
        retry::execute(&self.retry, || {
            self.try_mutate(user_id, amount, EntryKind::Charge)
        })
        .await
    }

    /// Payment with points.
    pub async fn spend(&self, user_id: UserId, amount: Amount) -> Result<PointBalance, MartError> {
        retry::execute(&self.retry, || self.try_mutate(user_id, amount, EntryKind::Use)).await
    }

    /// Full mutation history, in commit order.
    pub async fn transactions(&self, user_id: UserId) -> Result<Vec<LedgerEntry>, MartError> {
        if self.store.find(user_id).await?.is_none() {
            return Err(MartError::BalanceNotFound);
        }
        self.store.entries_for(user_id).await
    }

    /// Replay the ledger from zero and compare with the live amount.
    pub async fn audit(&self, user_id: UserId) -> Result<bool, MartError> {
        let balance = self
            .store
            .find(user_id)
            .await?
            .ok_or(MartError::BalanceNotFound)?;
        let entries = self.store.entries_for(user_id).await?;
        Ok(LedgerEntry::replay(&entries) == balance.amount())
    }

    async fn try_mutate(
        &self,
        user_id: UserId,
        amount: Amount,
        kind: EntryKind,
    ) -> Result<PointBalance, MartError> {
        let now = Utc::now();

        let mut balance = self.store.find_or_create(user_id).await?;
        let expected = balance.version();

        match kind {
            EntryKind::Charge => balance.charge(amount)?,
            EntryKind::Use => balance.spend(amount)?,
        }

        let entry = LedgerEntry::new(user_id, amount, kind, balance.amount(), now);

        if self.store.commit_mutation(balance, expected, entry).await? {
            tracing::info!(
                user_id,
                amount,
                kind = kind.as_str(),
                balance = balance.amount(),
                "balance mutated"
            );
            Ok(balance)
        } else {
            Err(MartError::VersionConflict {
                resource: format!("balance:{}", user_id),
                expected,
            })
        }
    }
}
