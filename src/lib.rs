//! flashmart - Contention core for a flash-sale e-commerce backend
//!
//! Keyed locks, optimistic-version retry, and the three quantity-bounded
//! aggregates they protect: coupon quotas, stock counters, and point
//! balances with an append-only ledger.
//!
//! # Modules
//!
//! - [`core_types`] - Core type definitions (UserId, CouponId, etc.)
//! - [`error`] - Crate-wide error taxonomy with the retryable flag
//! - [`lock`] - Keyed mutual exclusion with bounded wait
//! - [`retry`] - Optimistic read-validate-write retry loop
//! - [`coupon`] - Fixed-capacity coupon pool and user grants
//! - [`stock`] - Per-product stock counters
//! - [`balance`] - Point balance plus transaction ledger
//! - [`config`] - YAML-backed runtime configuration
//! - [`logging`] - tracing subscriber setup
//! - [`db`] - PostgreSQL connection management

// Core types - must be first!
pub mod core_types;

// Concurrency primitives
pub mod lock;
pub mod retry;

// Resource aggregates
pub mod balance;
pub mod coupon;
pub mod stock;

// Ambient plumbing
pub mod config;
pub mod db;
pub mod error;
pub mod logging;

// Convenient re-exports at crate root
pub use balance::{BalanceService, BalanceStore, EntryKind, LedgerEntry, PointBalance};
pub use config::AppConfig;
pub use core_types::{Amount, CouponId, GrantId, ProductId, UserId, Version};
pub use coupon::{CouponQuota, CouponService, CouponStore, GrantStatus, UserGrant};
pub use error::MartError;
pub use lock::LockManager;
pub use retry::{Backoff, RetryPolicy};
pub use stock::{StockCounter, StockService, StockStore};
