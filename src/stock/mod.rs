//! Per-product stock counters.
//!
//! Decremented on order placement, incremented on cancellation; both
//! directions version-guarded so concurrent adjustments never lose updates
//! or drive the quantity negative.

pub mod db;
pub mod models;
pub mod repository;
pub mod service;

pub use db::PgStockStore;
pub use models::StockCounter;
pub use repository::{MemoryStockStore, StockStore};
pub use service::StockService;
