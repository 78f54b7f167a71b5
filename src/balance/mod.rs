//! Point balance with an append-only transaction ledger.
//!
//! Every mutation co-commits exactly one ledger entry; replaying the entry
//! sequence from zero reproduces the live amount.

pub mod db;
pub mod models;
pub mod repository;
pub mod service;

pub use db::PgBalanceStore;
pub use models::{EntryKind, LedgerEntry, PointBalance};
pub use repository::{BalanceStore, MemoryBalanceStore};
pub use service::BalanceService;
