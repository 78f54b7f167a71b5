//! Stock store abstraction and the in-memory implementation.

use async_trait::async_trait;
use dashmap::DashMap;

use super::models::StockCounter;
use crate::core_types::{ProductId, Version};
use crate::error::MartError;

/// Data access for stock counters.
#[async_trait]
pub trait StockStore: Send + Sync {
    async fn find(&self, product_id: ProductId) -> Result<Option<StockCounter>, MartError>;

    /// Persist a counter for a new product (or reset an existing one).
    async fn create(&self, counter: StockCounter) -> Result<StockCounter, MartError>;

    /// Conditionally write `counter` iff the stored version equals
    /// `expected_version`. Returns false on mismatch.
    async fn compare_and_save(
        &self,
        counter: StockCounter,
        expected_version: Version,
    ) -> Result<bool, MartError>;
}

/// Thread-safe in-memory store.
pub struct MemoryStockStore {
    counters: DashMap<ProductId, StockCounter>,
}

impl MemoryStockStore {
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
        }
    }

    /// Drop everything. Test hook.
    pub fn clear(&self) {
        self.counters.clear();
    }
}

impl Default for MemoryStockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StockStore for MemoryStockStore {
    async fn find(&self, product_id: ProductId) -> Result<Option<StockCounter>, MartError> {
        Ok(self.counters.get(&product_id).map(|c| *c))
    }

    async fn create(&self, counter: StockCounter) -> Result<StockCounter, MartError> {
        self.counters.insert(counter.product_id(), counter);
        Ok(counter)
    }

    async fn compare_and_save(
        &self,
        counter: StockCounter,
        expected_version: Version,
    ) -> Result<bool, MartError> {
        let mut slot = match self.counters.get_mut(&counter.product_id()) {
            Some(slot) => slot,
            None => return Ok(false),
        };
        if slot.version() != expected_version {
            return Ok(false);
        }
        *slot = counter;
        Ok(true)
    }
}
