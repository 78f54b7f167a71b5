//! Balance store abstraction and the in-memory implementation.

use async_trait::async_trait;
use dashmap::DashMap;

use super::models::{LedgerEntry, PointBalance};
use crate::core_types::{UserId, Version};
use crate::error::MartError;

/// Data access for balances and their ledgers.
///
/// `commit_mutation` is the contention-bearing operation: the balance write
/// and the entry append land as one atomic unit, conditioned on the stored
/// balance version. A balance change without its entry, or vice versa, would
/// break the replay invariant, so no weaker commit exists on this trait.
#[async_trait]
pub trait BalanceStore: Send + Sync {
    async fn find(&self, user_id: UserId) -> Result<Option<PointBalance>, MartError>;

    /// Fetch the balance, creating a zero balance if the user has none.
    async fn find_or_create(&self, user_id: UserId) -> Result<PointBalance, MartError>;

    /// Conditionally write `balance` and append `entry` iff the stored
    /// version equals `expected_version`. Returns false on mismatch.
    async fn commit_mutation(
        &self,
        balance: PointBalance,
        expected_version: Version,
        entry: LedgerEntry,
    ) -> Result<bool, MartError>;

    /// Full ledger for a user, in commit order.
    async fn entries_for(&self, user_id: UserId) -> Result<Vec<LedgerEntry>, MartError>;
}

/// Thread-safe in-memory store.
pub struct MemoryBalanceStore {
    balances: DashMap<UserId, PointBalance>,
    entries: DashMap<UserId, Vec<LedgerEntry>>,
}

impl MemoryBalanceStore {
    pub fn new() -> Self {
        Self {
            balances: DashMap::new(),
            entries: DashMap::new(),
        }
    }

    /// Drop everything. Test hook.
    pub fn clear(&self) {
        self.balances.clear();
        self.entries.clear();
    }
}

impl Default for MemoryBalanceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BalanceStore for MemoryBalanceStore {
    async fn find(&self, user_id: UserId) -> Result<Option<PointBalance>, MartError> {
        Ok(self.balances.get(&user_id).map(|b| *b))
    }

    async fn find_or_create(&self, user_id: UserId) -> Result<PointBalance, MartError> {
        let balance = *self
            .balances
            .entry(user_id)
            .or_insert_with(|| PointBalance::new(user_id));
        Ok(balance)
    }

    async fn commit_mutation(
        &self,
        balance: PointBalance,
        expected_version: Version,
        entry: LedgerEntry,
    ) -> Result<bool, MartError> {
        let mut slot = match self.balances.get_mut(&balance.user_id()) {
            Some(slot) => slot,
            None => return Ok(false),
        };
        if slot.version() != expected_version {
            return Ok(false);
        }

        // The shard guard on this balance serializes the commit; the entry
        // append rides inside it, keeping write and log in lockstep.
        self.entries
            .entry(balance.user_id())
            .or_default()
            .push(entry);
        *slot = balance;
        Ok(true)
    }

    async fn entries_for(&self, user_id: UserId) -> Result<Vec<LedgerEntry>, MartError> {
        Ok(self
            .entries
            .get(&user_id)
            .map(|e| e.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::models::EntryKind;
    use chrono::Utc;

    #[tokio::test]
    async fn test_find_or_create_starts_at_zero() {
        let store = MemoryBalanceStore::new();
        assert!(store.find(7).await.unwrap().is_none());

        let balance = store.find_or_create(7).await.unwrap();
        assert_eq!(balance.amount(), 0);
        assert_eq!(balance.version(), 0);
        assert!(store.find(7).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_commit_pairs_balance_and_entry() {
        let store = MemoryBalanceStore::new();
        let mut balance = store.find_or_create(7).await.unwrap();

        let expected = balance.version();
        balance.charge(1_000).unwrap();
        let entry = LedgerEntry::new(7, 1_000, EntryKind::Charge, balance.amount(), Utc::now());

        assert!(store.commit_mutation(balance, expected, entry).await.unwrap());
        assert_eq!(store.find(7).await.unwrap().unwrap().amount(), 1_000);
        assert_eq!(store.entries_for(7).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_commit_writes_nothing() {
        let store = MemoryBalanceStore::new();
        let fresh = store.find_or_create(7).await.unwrap();

        let mut first = fresh;
        let expected = first.version();
        first.charge(1_000).unwrap();
        let entry = LedgerEntry::new(7, 1_000, EntryKind::Charge, first.amount(), Utc::now());
        assert!(store.commit_mutation(first, expected, entry).await.unwrap());

        // Loser of the round: neither the balance nor the ledger moves
        let mut second = fresh;
        second.charge(500).unwrap();
        let entry = LedgerEntry::new(7, 500, EntryKind::Charge, second.amount(), Utc::now());
        assert!(!store.commit_mutation(second, expected, entry).await.unwrap());

        assert_eq!(store.find(7).await.unwrap().unwrap().amount(), 1_000);
        assert_eq!(store.entries_for(7).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_entries_isolated_per_user() {
        let store = MemoryBalanceStore::new();
        for user_id in [1u64, 2] {
            let mut balance = store.find_or_create(user_id).await.unwrap();
            let expected = balance.version();
            balance.charge(100).unwrap();
            let entry =
                LedgerEntry::new(user_id, 100, EntryKind::Charge, balance.amount(), Utc::now());
            store.commit_mutation(balance, expected, entry).await.unwrap();
        }

        assert_eq!(store.entries_for(1).await.unwrap().len(), 1);
        assert_eq!(store.entries_for(2).await.unwrap().len(), 1);
        assert!(store.entries_for(3).await.unwrap().is_empty());
    }
}
