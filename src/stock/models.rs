//! Per-product stock counter.

use serde::{Deserialize, Serialize};

use crate::core_types::{ProductId, Version};
use crate::error::MartError;

/// Available quantity for one product.
///
/// # Invariants (enforced by private fields):
/// - `quantity` never goes negative: a decrement larger than the remaining
///   stock is rejected before any state changes
/// - `version` increments on every mutation, including increments, so
///   interleaved increases cannot silently swallow a concurrent decrease
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockCounter {
    product_id: ProductId,
    quantity: u32,
    version: Version,
}

impl StockCounter {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
            version: 0,
        }
    }

    /// Rebuild a counter from stored state. Store implementations only.
    pub(crate) fn from_stored(product_id: ProductId, quantity: u32, version: Version) -> Self {
        Self {
            product_id,
            quantity,
            version,
        }
    }

    #[inline(always)]
    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    #[inline(always)]
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    #[inline(always)]
    pub fn version(&self) -> Version {
        self.version
    }

    pub fn has_sufficient(&self, qty: u32) -> bool {
        self.quantity >= qty
    }

    /// Remove `qty` units.
    ///
    /// # Errors
    /// [`MartError::InsufficientStock`] when fewer than `qty` units remain.
    pub fn decrease(&mut self, qty: u32) -> Result<(), MartError> {
        if self.quantity < qty {
            return Err(MartError::InsufficientStock);
        }
        self.quantity -= qty;
        self.version = self.version.wrapping_add(1);
        Ok(())
    }

    /// Return `qty` units (cancellation/restock).
    ///
    /// # Errors
    /// Counter overflow, which indicates corrupted input rather than a
    /// domain condition.
    pub fn increase(&mut self, qty: u32) -> Result<(), MartError> {
        self.quantity = self
            .quantity
            .checked_add(qty)
            .ok_or_else(|| MartError::Internal("stock counter overflow".to_string()))?;
        self.version = self.version.wrapping_add(1);
        Ok(())
    }
}
