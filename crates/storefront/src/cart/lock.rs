//! Per-product mutual exclusion for mutating cart requests.
//!
//! The cart service does not make `add` idempotent, so a second request for a
//! product must never be issued while the first is in flight. The lock is the
//! only defense against double submission from rapid repeated clicks.
//!
//! Scope is per product: mutations on different products touch disjoint lines
//! and proceed in parallel.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cartwright_core::ProductId;
use thiserror::Error;

/// A mutation for the product is already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("mutation already in flight for product {0}")]
pub struct LockBusyError(pub ProductId);

/// Set of product IDs with an outstanding mutating request.
///
/// Cloning shares the same set.
#[derive(Debug, Clone, Default)]
pub struct MutationLock {
    held: Arc<Mutex<HashSet<ProductId>>>,
}

impl MutationLock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `product_id` as held.
    ///
    /// Returns `false` without side effect if it is already held.
    pub fn try_acquire(&self, product_id: ProductId) -> bool {
        self.held().insert(product_id)
    }

    /// Release `product_id`. Releasing an unheld ID is a no-op.
    pub fn release(&self, product_id: ProductId) {
        self.held().remove(&product_id);
    }

    #[must_use]
    pub fn is_held(&self, product_id: ProductId) -> bool {
        self.held().contains(&product_id)
    }

    /// Number of products currently held.
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.held().len()
    }

    /// Acquire `product_id` and return a guard that releases it on drop.
    ///
    /// # Errors
    ///
    /// Returns `LockBusyError` if the product is already held.
    pub fn acquire(&self, product_id: ProductId) -> Result<MutationGuard, LockBusyError> {
        if self.try_acquire(product_id) {
            Ok(MutationGuard {
                lock: self.clone(),
                product_id,
            })
        } else {
            Err(LockBusyError(product_id))
        }
    }

    fn held(&self) -> MutexGuard<'_, HashSet<ProductId>> {
        // The set stays consistent even if a holder panicked mid-insert.
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds one product's lock; releases it when dropped on any exit path.
#[derive(Debug)]
#[must_use = "the product is released as soon as the guard is dropped"]
pub struct MutationGuard {
    lock: MutationLock,
    product_id: ProductId,
}

impl MutationGuard {
    #[must_use]
    pub const fn product_id(&self) -> ProductId {
        self.product_id
    }
}

impl Drop for MutationGuard {
    fn drop(&mut self) {
        self.lock.release(self.product_id);
    }
}
