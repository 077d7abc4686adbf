//! In-memory cart service for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use cartwright_core::{CartLine, CartSnapshot, ProductId, UserId};
use rust_decimal::Decimal;
use tokio::sync::Notify;

use super::client::CartApi;
use crate::error::{CartError, MutationKind, TransportError};

/// Unit price for products added without a catalog entry.
const DEFAULT_UNIT_PRICE: i64 = 1_000;

/// A recorded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Call {
    Fetch,
    Add(ProductId, u32),
    SetQuantity(ProductId, u32),
    Remove(ProductId),
    Clear,
}

/// Fake cart service with call recording, per-product gates and failure
/// injection.
#[derive(Default)]
pub(crate) struct FakeCartApi {
    state: Mutex<FakeState>,
    gates: Mutex<HashMap<ProductId, Arc<Notify>>>,
    fail_mutations: AtomicBool,
    fail_fetch: AtomicBool,
}

#[derive(Default)]
struct FakeState {
    /// `(product, unit price, quantity)` in insertion order.
    lines: Vec<(ProductId, Decimal, u32)>,
    calls: Vec<Call>,
}

impl FakeCartApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_line(self, product_id: ProductId, unit_price: i64, quantity: u32) -> Self {
        self.state()
            .lines
            .push((product_id, Decimal::from(unit_price), quantity));
        self
    }

    /// Make mutations for `product_id` wait until the returned gate is
    /// notified. The call is recorded before it waits; the gate applies to
    /// the next mutation only.
    pub(crate) fn hold(&self, product_id: ProductId) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates().insert(product_id, Arc::clone(&gate));
        gate
    }

    pub(crate) fn set_fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Every recorded call except fetches.
    pub(crate) fn mutation_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| *c != Call::Fetch)
            .collect()
    }

    /// Total price of the cart as the server sees it.
    pub(crate) fn server_total(&self) -> Decimal {
        self.state()
            .lines
            .iter()
            .map(|(_, price, quantity)| price * Decimal::from(*quantity))
            .sum()
    }

    async fn mutation(
        &self,
        call: Call,
        operation: MutationKind,
        apply: impl FnOnce(&mut Vec<(ProductId, Decimal, u32)>),
    ) -> Result<(), CartError> {
        self.state().calls.push(call);

        let gate = match call {
            Call::Add(id, _) | Call::SetQuantity(id, _) | Call::Remove(id) => {
                self.gates().remove(&id)
            }
            Call::Fetch | Call::Clear => None,
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(CartError::mutation(
                operation,
                TransportError::status(500, "internal error"),
            ));
        }

        apply(&mut self.state().lines);
        Ok(())
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn gates(&self) -> MutexGuard<'_, HashMap<ProductId, Arc<Notify>>> {
        self.gates.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CartApi for FakeCartApi {
    async fn fetch(&self, user_id: UserId) -> Result<CartSnapshot, CartError> {
        let mut state = self.state();
        state.calls.push(Call::Fetch);

        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(CartError::Fetch(TransportError::Request(
                "connection reset".to_string(),
            )));
        }

        let lines = state
            .lines
            .iter()
            .map(|(id, price, quantity)| {
                CartLine::new(*id, format!("Product {id}"), *price, *quantity, None)
                    .map_err(|e| CartError::Fetch(TransportError::Decode(e.to_string())))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CartSnapshot::new(user_id, lines))
    }

    async fn add(
        &self,
        _user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), CartError> {
        self.mutation(Call::Add(product_id, quantity), MutationKind::Add, |lines| {
            if let Some(line) = lines.iter_mut().find(|l| l.0 == product_id) {
                line.2 += quantity;
            } else {
                lines.push((product_id, Decimal::from(DEFAULT_UNIT_PRICE), quantity));
            }
        })
        .await
    }

    async fn set_quantity(
        &self,
        _user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), CartError> {
        self.mutation(
            Call::SetQuantity(product_id, quantity),
            MutationKind::SetQuantity,
            |lines| {
                if quantity == 0 {
                    lines.retain(|l| l.0 != product_id);
                } else if let Some(line) = lines.iter_mut().find(|l| l.0 == product_id) {
                    line.2 = quantity;
                }
            },
        )
        .await
    }

    async fn remove(&self, _user_id: UserId, product_id: ProductId) -> Result<(), CartError> {
        self.mutation(Call::Remove(product_id), MutationKind::Remove, |lines| {
            lines.retain(|l| l.0 != product_id);
        })
        .await
    }

    async fn clear(&self, _user_id: UserId) -> Result<(), CartError> {
        self.mutation(Call::Clear, MutationKind::Clear, Vec::clear)
            .await
    }
}
