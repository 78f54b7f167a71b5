//! Point balance and its append-only ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core_types::{Amount, UserId, Version};
use crate::error::MartError;

/// A user's point balance.
///
/// # Invariants (enforced by private fields):
/// - `0 <= amount <= MAX_BALANCE`, always
/// - A single charge never exceeds `MAX_CHARGE_ONCE`
/// - `version` increments on every mutation
/// - Every mutation is paired with exactly one [`LedgerEntry`]; the store
///   commits both or neither
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointBalance {
    user_id: UserId,
    amount: Amount,
    version: Version,
}

impl PointBalance {
    /// Largest single top-up: 1,000,000 won.
    pub const MAX_CHARGE_ONCE: Amount = 1_000_000;
    /// Largest holdable balance: 10,000,000 won.
    pub const MAX_BALANCE: Amount = 10_000_000;

    /// Fresh zero balance.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            amount: 0,
            version: 0,
        }
    }

    /// Rebuild a balance from stored state. Store implementations only.
    pub(crate) fn from_stored(user_id: UserId, amount: Amount, version: Version) -> Self {
        Self {
            user_id,
            amount,
            version,
        }
    }

    #[inline(always)]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[inline(always)]
    pub fn amount(&self) -> Amount {
        self.amount
    }

    #[inline(always)]
    pub fn version(&self) -> Version {
        self.version
    }

    pub fn has_sufficient(&self, amount: Amount) -> bool {
        self.amount >= amount
    }

    /// Add points (wallet top-up).
    ///
    /// # Errors
    /// - [`MartError::InvalidAmount`] when `amount <= 0` or above the
    ///   single-charge limit
    /// - [`MartError::MaxBalanceExceeded`] when the result would pass
    ///   `MAX_BALANCE`
    pub fn charge(&mut self, amount: Amount) -> Result<(), MartError> {
        if amount <= 0 || amount > Self::MAX_CHARGE_ONCE {
            return Err(MartError::InvalidAmount);
        }
        let next = self
            .amount
            .checked_add(amount)
            .ok_or_else(|| MartError::Internal("balance overflow".to_string()))?;
        if next > Self::MAX_BALANCE {
            return Err(MartError::MaxBalanceExceeded);
        }
        self.amount = next;
        self.version = self.version.wrapping_add(1);
        Ok(())
    }

    /// Remove points (payment).
    ///
    /// # Errors
    /// - [`MartError::InvalidAmount`] when `amount <= 0`
    /// - [`MartError::InsufficientBalance`] when the balance cannot cover it
    pub fn spend(&mut self, amount: Amount) -> Result<(), MartError> {
        if amount <= 0 {
            return Err(MartError::InvalidAmount);
        }
        if self.amount < amount {
            return Err(MartError::InsufficientBalance);
        }
        self.amount -= amount;
        self.version = self.version.wrapping_add(1);
        Ok(())
    }
}

/// Direction of one balance mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    Charge,
    Use,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Charge => "CHARGE",
            EntryKind::Use => "USE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CHARGE" => Some(EntryKind::Charge),
            "USE" => Some(EntryKind::Use),
            _ => None,
        }
    }
}

/// One immutable record of one balance mutation.
///
/// `delta` is the positive magnitude; `kind` carries the sign. Entries are
/// appended in commit order and never edited or removed, so folding them
/// from zero reproduces the balance they accompany.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub user_id: UserId,
    pub delta: Amount,
    pub kind: EntryKind,
    pub balance_after: Amount,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        user_id: UserId,
        delta: Amount,
        kind: EntryKind,
        balance_after: Amount,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            delta,
            kind,
            balance_after,
            created_at,
        }
    }

    /// Delta with its sign applied.
    pub fn signed_delta(&self) -> Amount {
        match self.kind {
            EntryKind::Charge => self.delta,
            EntryKind::Use => -self.delta,
        }
    }

    /// Fold an ordered entry sequence from zero.
    ///
    /// For any untampered history this equals the live balance exactly.
    pub fn replay(entries: &[LedgerEntry]) -> Amount {
        entries.iter().map(LedgerEntry::signed_delta).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charge() {
        let mut balance = PointBalance::new(7);
        balance.charge(1_000).unwrap();
        assert_eq!(balance.amount(), 1_000);
        assert_eq!(balance.version(), 1);
    }

    #[test]
    fn test_charge_rejects_non_positive() {
        let mut balance = PointBalance::new(7);
        assert!(matches!(balance.charge(0), Err(MartError::InvalidAmount)));
        assert!(matches!(balance.charge(-5), Err(MartError::InvalidAmount)));
        assert_eq!(balance.version(), 0);
    }

    #[test]
    fn test_charge_rejects_over_single_limit() {
        let mut balance = PointBalance::new(7);
        let err = balance.charge(PointBalance::MAX_CHARGE_ONCE + 1);
        assert!(matches!(err, Err(MartError::InvalidAmount)));

        balance.charge(PointBalance::MAX_CHARGE_ONCE).unwrap();
        assert_eq!(balance.amount(), PointBalance::MAX_CHARGE_ONCE);
    }

    #[test]
    fn test_charge_rejects_past_max_balance() {
        let mut balance = PointBalance::new(7);
        for _ in 0..10 {
            balance.charge(PointBalance::MAX_CHARGE_ONCE).unwrap();
        }
        assert_eq!(balance.amount(), PointBalance::MAX_BALANCE);

        let err = balance.charge(1);
        assert!(matches!(err, Err(MartError::MaxBalanceExceeded)));
        assert_eq!(balance.amount(), PointBalance::MAX_BALANCE);
    }

    #[test]
    fn test_spend() {
        let mut balance = PointBalance::new(7);
        balance.charge(5_000).unwrap();
        balance.spend(2_000).unwrap();
        assert_eq!(balance.amount(), 3_000);
        assert_eq!(balance.version(), 2);
    }

    #[test]
    fn test_spend_insufficient() {
        let mut balance = PointBalance::new(7);
        balance.charge(1_000).unwrap();
        let err = balance.spend(1_001);
        assert!(matches!(err, Err(MartError::InsufficientBalance)));
        assert_eq!(balance.amount(), 1_000);
    }

    #[test]
    fn test_spend_rejects_non_positive() {
        let mut balance = PointBalance::new(7);
        assert!(matches!(balance.spend(0), Err(MartError::InvalidAmount)));
        assert!(matches!(balance.spend(-1), Err(MartError::InvalidAmount)));
    }

    #[test]
    fn test_replay_reproduces_balance() {
        let now = Utc::now();
        let entries = vec![
            LedgerEntry::new(7, 5_000, EntryKind::Charge, 5_000, now),
            LedgerEntry::new(7, 2_000, EntryKind::Use, 3_000, now),
            LedgerEntry::new(7, 300, EntryKind::Charge, 3_300, now),
            LedgerEntry::new(7, 3_300, EntryKind::Use, 0, now),
        ];
        assert_eq!(LedgerEntry::replay(&entries), 0);
        assert_eq!(LedgerEntry::replay(&entries[..3]), 3_300);
        assert_eq!(LedgerEntry::replay(&[]), 0);
    }

    #[test]
    fn test_entry_kind_round_trip() {
        assert_eq!(EntryKind::from_str("CHARGE"), Some(EntryKind::Charge));
        assert_eq!(EntryKind::from_str("USE"), Some(EntryKind::Use));
        assert_eq!(EntryKind::from_str("REFUND"), None);
    }
}
