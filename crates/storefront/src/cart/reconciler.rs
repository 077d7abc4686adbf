//! Cart reconciler.
//!
//! Orchestrates every cart change for one page session:
//!
//! 1. plan the remote call from the last known snapshot and the requested delta
//! 2. acquire the product's lock (a busy product drops the request silently)
//! 3. issue the remote call
//! 4. fetch the authoritative snapshot
//! 5. on failure keep the last known-good snapshot and notify the shopper
//! 6. release the lock
//! 7. publish a [`CartEvent`] for the renderer
//!
//! Local arithmetic is only published as a [`CartEvent::Provisional`] hint.
//! The stored snapshot is always the one the server returned.
//!
//! Per product the reconciler moves `Idle → Locked → (Idle | Failed)`. Calls
//! for a `Locked` product are dropped, never queued.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};

use cartwright_core::{CartLine, CartSnapshot, ProductId, UserId};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::client::CartApi;
use super::events::{CartEvent, Notice, ReconcileCause};
use super::lock::{MutationGuard, MutationLock};
use crate::error::{CartError, add_breadcrumb, report_error};

/// Buffered events per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 64;

/// Change requested for one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartDelta {
    Increase,
    /// Floors at zero; reaching zero removes the line.
    Decrease,
    Remove,
    SetExplicit(u32),
}

impl CartDelta {
    /// Target quantity given the current one (`0` when the line is absent).
    #[must_use]
    pub const fn target(self, current: u32) -> u32 {
        match self {
            Self::Increase => current.saturating_add(1),
            Self::Decrease => current.saturating_sub(1),
            Self::Remove => 0,
            Self::SetExplicit(quantity) => quantity,
        }
    }
}

/// Remote call chosen for a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationPlan {
    /// The product has no line yet.
    Add { quantity: u32 },
    SetQuantity { quantity: u32 },
    /// Target reached zero. Never sent as `set_quantity(0)`.
    Remove,
    /// Target equals the current quantity; nothing to send.
    Unchanged,
}

impl MutationPlan {
    const fn describe(self) -> &'static str {
        match self {
            Self::Add { .. } => "Add to cart",
            Self::SetQuantity { .. } => "Update quantity",
            Self::Remove => "Remove from cart",
            Self::Unchanged => "No change",
        }
    }
}

/// Choose the remote call for `delta` applied to the current line.
#[must_use]
pub fn plan(current: Option<&CartLine>, delta: CartDelta) -> MutationPlan {
    let current = current.map_or(0, CartLine::quantity);
    let target = delta.target(current);

    if target == current {
        MutationPlan::Unchanged
    } else if target == 0 {
        MutationPlan::Remove
    } else if current == 0 {
        MutationPlan::Add { quantity: target }
    } else {
        MutationPlan::SetQuantity { quantity: target }
    }
}

/// Per-product reconciliation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductState {
    Idle,
    Locked,
    /// The last mutation for this product failed.
    Failed,
}

/// Result of a reconciler operation.
///
/// Failures are already reported and published; callers never need to
/// handle them for the page to stay consistent.
#[derive(Debug, Clone)]
pub enum MutationOutcome {
    /// The server confirmed the change and a fresh snapshot was applied.
    Reconciled(Arc<CartSnapshot>),
    /// Nothing to send.
    Unchanged,
    /// The product already had a mutation in flight.
    Dropped,
    /// The operation failed; the last known-good snapshot is kept.
    Failed(CartError),
}

impl MutationOutcome {
    #[must_use]
    pub const fn is_reconciled(&self) -> bool {
        matches!(self, Self::Reconciled(_))
    }
}

/// Owns the cart snapshot and lock set for one page session.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CartReconciler {
    inner: Arc<ReconcilerInner>,
}

struct ReconcilerInner {
    user_id: UserId,
    api: Arc<dyn CartApi>,
    locks: MutationLock,
    slot: RwLock<SnapshotSlot>,
    fetch_seq: AtomicU64,
    failed: Mutex<HashSet<ProductId>>,
    events: broadcast::Sender<CartEvent>,
}

/// The current snapshot and the sequence number of the fetch that produced it.
#[derive(Default)]
struct SnapshotSlot {
    seq: u64,
    snapshot: Option<Arc<CartSnapshot>>,
}

impl CartReconciler {
    /// Create a reconciler for `user_id`. The cart starts out unknown.
    #[must_use]
    pub fn new(user_id: UserId, api: Arc<dyn CartApi>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(ReconcilerInner {
                user_id,
                api,
                locks: MutationLock::new(),
                slot: RwLock::new(SnapshotSlot::default()),
                fetch_seq: AtomicU64::new(0),
                failed: Mutex::new(HashSet::new()),
                events,
            }),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.inner.user_id
    }

    /// Subscribe to reconciler events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.inner.events.subscribe()
    }

    /// Last known-good snapshot; `None` until the first successful fetch.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<CartSnapshot>> {
        self.slot().snapshot.clone()
    }

    #[must_use]
    pub fn locks(&self) -> &MutationLock {
        &self.inner.locks
    }

    #[must_use]
    pub fn state(&self, product_id: ProductId) -> ProductState {
        if self.inner.locks.is_held(product_id) {
            ProductState::Locked
        } else if self.failed().contains(&product_id) {
            ProductState::Failed
        } else {
            ProductState::Idle
        }
    }

    /// Load the cart from the server.
    #[instrument(skip(self), fields(user_id = %self.inner.user_id))]
    pub async fn refresh(&self) -> MutationOutcome {
        let (event, outcome) = self
            .reconcile(ReconcileCause::Refresh, Uuid::new_v4(), Ok(()), |_| None)
            .await;
        self.emit(event);
        outcome
    }

    /// Apply `delta` to a product's line.
    ///
    /// An unknown cart is loaded first; if that fails nothing is sent.
    #[instrument(skip(self), fields(user_id = %self.inner.user_id, product_id = %product_id))]
    pub async fn mutate(&self, product_id: ProductId, delta: CartDelta) -> MutationOutcome {
        let current = match self.snapshot() {
            Some(snapshot) => snapshot,
            None => match self.refresh().await {
                MutationOutcome::Reconciled(snapshot) => snapshot,
                outcome => return outcome,
            },
        };
        let line = current.line(product_id);
        let plan = plan(line, delta);
        if plan == MutationPlan::Unchanged {
            debug!(?delta, "Quantity unchanged, nothing to send");
            return MutationOutcome::Unchanged;
        }

        let guard = match self.inner.locks.acquire(product_id) {
            Ok(guard) => guard,
            Err(busy) => {
                report_error(&busy.into());
                return MutationOutcome::Dropped;
            }
        };

        let provisional = delta.target(line.map_or(0, CartLine::quantity));
        self.run_locked(
            guard,
            ReconcileCause::Mutation { product_id, delta },
            plan,
            provisional,
            None,
        )
        .await
    }

    /// Catalog "add to cart": add one unit, whether or not a line exists.
    #[instrument(skip(self), fields(user_id = %self.inner.user_id, product_id = %product_id))]
    pub async fn add_new_product(&self, product_id: ProductId) -> MutationOutcome {
        let guard = match self.inner.locks.acquire(product_id) {
            Ok(guard) => guard,
            Err(busy) => {
                report_error(&busy.into());
                return MutationOutcome::Dropped;
            }
        };

        let current = self
            .snapshot()
            .map_or(0, |s| s.quantity_of(product_id));
        self.run_locked(
            guard,
            ReconcileCause::AddProduct(product_id),
            MutationPlan::Add { quantity: 1 },
            current.saturating_add(1),
            Some(Notice::success("Product added to cart")),
        )
        .await
    }

    /// Empty the whole cart.
    ///
    /// Bypasses per-product locks; row mutations issued while a clear is
    /// outstanding may race with it.
    #[instrument(skip(self), fields(user_id = %self.inner.user_id))]
    pub async fn clear_all(&self) -> MutationOutcome {
        add_breadcrumb("cart", "Clear cart", None);
        let sent = self.inner.api.clear(self.inner.user_id).await;
        let (event, outcome) = self
            .reconcile(ReconcileCause::ClearAll, Uuid::new_v4(), sent, |_| {
                Some(Notice::success("Cart emptied"))
            })
            .await;
        self.emit(event);
        outcome
    }

    /// Re-read the cart before handing the shopper to payment.
    #[instrument(skip(self), fields(user_id = %self.inner.user_id))]
    pub async fn checkout(&self) -> MutationOutcome {
        let (event, outcome) = self
            .reconcile(ReconcileCause::Checkout, Uuid::new_v4(), Ok(()), |snapshot| {
                Some(if snapshot.is_empty() {
                    Notice::info("Your cart is empty.")
                } else {
                    Notice::success(format!(
                        "Proceeding to payment with {} products.",
                        snapshot.len()
                    ))
                })
            })
            .await;
        if outcome.is_reconciled() {
            info!("Checkout requested");
        }
        self.emit(event);
        outcome
    }

    async fn run_locked(
        &self,
        guard: MutationGuard,
        cause: ReconcileCause,
        plan: MutationPlan,
        provisional: u32,
        success: Option<Notice>,
    ) -> MutationOutcome {
        let product_id = guard.product_id();
        self.failed().remove(&product_id);

        self.emit(CartEvent::Provisional {
            product_id,
            quantity: provisional,
        });

        let id = product_id.to_string();
        add_breadcrumb("cart", plan.describe(), Some(&[("product_id", id.as_str())]));

        let sent = self.send(product_id, plan).await;
        let (event, outcome) = self
            .reconcile(cause, Uuid::new_v4(), sent, move |_| success)
            .await;

        if matches!(outcome, MutationOutcome::Failed(_)) {
            self.failed().insert(product_id);
        }

        drop(guard);
        self.emit(event);
        outcome
    }

    async fn send(&self, product_id: ProductId, plan: MutationPlan) -> Result<(), CartError> {
        let user_id = self.inner.user_id;
        let api = &self.inner.api;
        match plan {
            MutationPlan::Add { quantity } => api.add(user_id, product_id, quantity).await,
            MutationPlan::SetQuantity { quantity } => {
                api.set_quantity(user_id, product_id, quantity).await
            }
            MutationPlan::Remove => api.remove(user_id, product_id).await,
            MutationPlan::Unchanged => Ok(()),
        }
    }

    /// Fetch the authoritative snapshot after `sent` succeeded and build the
    /// event describing the result.
    async fn reconcile<F>(
        &self,
        cause: ReconcileCause,
        operation_id: Uuid,
        sent: Result<(), CartError>,
        success: F,
    ) -> (CartEvent, MutationOutcome)
    where
        F: FnOnce(&CartSnapshot) -> Option<Notice> + Send,
    {
        let fetched = match sent {
            Ok(()) => {
                let seq = self.inner.fetch_seq.fetch_add(1, Ordering::Relaxed) + 1;
                self.inner
                    .api
                    .fetch(self.inner.user_id)
                    .await
                    .map(|snapshot| (seq, snapshot))
            }
            Err(err) => Err(err),
        };

        match fetched {
            Ok((seq, snapshot)) => {
                let snapshot = self.commit(seq, snapshot);
                let notice = success(&snapshot);
                debug!(
                    lines = snapshot.len(),
                    operation_id = %operation_id,
                    "Cart reconciled"
                );
                (
                    CartEvent::Reconciled {
                        cause,
                        operation_id,
                        snapshot: Arc::clone(&snapshot),
                        notice,
                    },
                    MutationOutcome::Reconciled(snapshot),
                )
            }
            Err(error) => {
                report_error(&error);
                (
                    CartEvent::Failed {
                        cause,
                        operation_id,
                        error: error.clone(),
                        snapshot: self.snapshot(),
                        notice: Notice::action_failed(),
                    },
                    MutationOutcome::Failed(error),
                )
            }
        }
    }

    /// Replace the stored snapshot unless a later fetch already landed.
    ///
    /// Returns the snapshot that is current afterwards.
    fn commit(&self, seq: u64, snapshot: CartSnapshot) -> Arc<CartSnapshot> {
        let fresh = Arc::new(snapshot);
        let mut slot = self.inner.slot.write().unwrap_or_else(PoisonError::into_inner);
        if seq > slot.seq {
            slot.seq = seq;
            slot.snapshot = Some(Arc::clone(&fresh));
            fresh
        } else {
            debug!(seq, current = slot.seq, "Discarding stale cart snapshot");
            slot.snapshot.clone().unwrap_or(fresh)
        }
    }

    fn emit(&self, event: CartEvent) {
        if self.inner.events.send(event).is_err() {
            debug!("No cart event subscribers");
        }
    }

    fn slot(&self) -> RwLockReadGuard<'_, SnapshotSlot> {
        self.inner.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn failed(&self) -> MutexGuard<'_, HashSet<ProductId>> {
        self.inner.failed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
