//! Stock adjustment under optimistic concurrency.

use std::sync::Arc;

use super::models::StockCounter;
use super::repository::StockStore;
use crate::core_types::ProductId;
use crate::error::MartError;
use crate::retry::{self, RetryPolicy};

/// Decrement/increment over a [`StockStore`].
///
/// Both directions run a read-validate-write round per attempt; increments
/// are unconditional on quantity but still version-guarded, so they cannot
/// erase an interleaved decrement.
pub struct StockService {
    store: Arc<dyn StockStore>,
    retry: RetryPolicy,
}

impl StockService {
    pub fn new(store: Arc<dyn StockStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Remove `qty` units of a product (order placement).
    pub async fn decrease(&self, product_id: ProductId, qty: u32) -> Result<StockCounter, MartError> {
        retry::execute(&self.retry, || self.try_apply(product_id, qty, Direction::Down)).await
    }

    /// Return `qty` units of a product (order cancellation, restock).
    pub async fn increase(&self, product_id: ProductId, qty: u32) -> Result<StockCounter, MartError> {
        retry::execute(&self.retry, || self.try_apply(product_id, qty, Direction::Up)).await
    }

    /// Current counter for a product.
    pub async fn stock_of(&self, product_id: ProductId) -> Result<StockCounter, MartError> {
        self.store
            .find(product_id)
            .await?
            .ok_or(MartError::ProductNotFound)
    }

    /// Decrement stock for every line of an order.
    ///
    /// Lines are processed in ascending product id - the one fixed order all
    /// multi-key callers share, so two orders touching the same products can
    /// never hold-and-wait in opposite directions. If a later line fails,
    /// the already-applied decrements are compensated before the error
    /// propagates, leaving no partial claim behind.
    pub async fn decrease_batch(&self, items: &[(ProductId, u32)]) -> Result<(), MartError> {
        let mut items = items.to_vec();
        items.sort_by_key(|(product_id, _)| *product_id);

        let mut applied: Vec<(ProductId, u32)> = Vec::with_capacity(items.len());
        for (product_id, qty) in items {
            match self.decrease(product_id, qty).await {
                Ok(_) => applied.push((product_id, qty)),
                Err(e) => {
                    for (product_id, qty) in applied.into_iter().rev() {
                        if let Err(undo) = self.increase(product_id, qty).await {
                            tracing::error!(
                                product_id,
                                qty,
                                error = %undo,
                                "failed to restore stock after aborted batch"
                            );
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Return stock for every line of a cancelled order.
    pub async fn increase_batch(&self, items: &[(ProductId, u32)]) -> Result<(), MartError> {
        let mut items = items.to_vec();
        items.sort_by_key(|(product_id, _)| *product_id);

        for (product_id, qty) in items {
            self.increase(product_id, qty).await?;
        }
        Ok(())
    }

    async fn try_apply(
        &self,
        product_id: ProductId,
        qty: u32,
        direction: Direction,
    ) -> Result<StockCounter, MartError> {
        let mut counter = self
            .store
            .find(product_id)
            .await?
            .ok_or(MartError::ProductNotFound)?;

        let expected = counter.version();
        match direction {
            Direction::Down => counter.decrease(qty)?,
            Direction::Up => counter.increase(qty)?,
        }

        if self.store.compare_and_save(counter, expected).await? {
            tracing::debug!(product_id, qty, quantity = counter.quantity(), "stock adjusted");
            Ok(counter)
        } else {
            Err(MartError::VersionConflict {
                resource: format!("product:{}", product_id),
                expected,
            })
        }
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Down,
    Up,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stock::repository::MemoryStockStore;

    async fn service_with(products: &[(ProductId, u32)]) -> (Arc<MemoryStockStore>, StockService) {
        let store = Arc::new(MemoryStockStore::new());
        for &(product_id, qty) in products {
            store.create(StockCounter::new(product_id, qty)).await.unwrap();
        }
        let service = StockService::new(store.clone(), RetryPolicy::high_contention());
        (store, service)
    }

    #[tokio::test]
    async fn test_decrease_and_increase() {
        let (_, svc) = service_with(&[(7, 10)]).await;

        let after = svc.decrease(7, 4).await.unwrap();
        assert_eq!(after.quantity(), 6);

        let after = svc.increase(7, 2).await.unwrap();
        assert_eq!(after.quantity(), 8);
    }

    #[tokio::test]
    async fn test_decrease_insufficient_is_terminal() {
        let (_, svc) = service_with(&[(7, 3)]).await;
        let err = svc.decrease(7, 5).await;
        assert!(matches!(err, Err(MartError::InsufficientStock)));
        assert_eq!(svc.stock_of(7).await.unwrap().quantity(), 3);
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let (_, svc) = service_with(&[]).await;
        assert!(matches!(
            svc.decrease(99, 1).await,
            Err(MartError::ProductNotFound)
        ));
        assert!(matches!(
            svc.stock_of(99).await,
            Err(MartError::ProductNotFound)
        ));
    }

    #[tokio::test]
    async fn test_batch_applies_all_lines() {
        let (_, svc) = service_with(&[(1, 5), (2, 5), (3, 5)]).await;

        svc.decrease_batch(&[(3, 2), (1, 1), (2, 4)]).await.unwrap();
        assert_eq!(svc.stock_of(1).await.unwrap().quantity(), 4);
        assert_eq!(svc.stock_of(2).await.unwrap().quantity(), 1);
        assert_eq!(svc.stock_of(3).await.unwrap().quantity(), 3);
    }

    #[tokio::test]
    async fn test_batch_compensates_on_failure() {
        let (_, svc) = service_with(&[(1, 5), (2, 1), (3, 5)]).await;

        // Line for product 2 cannot be satisfied; lines already applied must
        // be returned.
        let err = svc.decrease_batch(&[(1, 2), (2, 3), (3, 2)]).await;
        assert!(matches!(err, Err(MartError::InsufficientStock)));

        assert_eq!(svc.stock_of(1).await.unwrap().quantity(), 5);
        assert_eq!(svc.stock_of(2).await.unwrap().quantity(), 1);
        assert_eq!(svc.stock_of(3).await.unwrap().quantity(), 5);
    }

    #[tokio::test]
    async fn test_increase_batch() {
        let (_, svc) = service_with(&[(1, 0), (2, 0)]).await;
        svc.increase_batch(&[(2, 3), (1, 1)]).await.unwrap();
        assert_eq!(svc.stock_of(1).await.unwrap().quantity(), 1);
        assert_eq!(svc.stock_of(2).await.unwrap().quantity(), 3);
    }
}
