//! Cart snapshot types.
//!
//! A [`CartSnapshot`] is the server-authoritative state of one shopper's cart
//! at a single instant. Snapshots are immutable: after every round trip to the
//! cart service a fresh snapshot replaces the previous one wholesale.
//!
//! Totals are never stored. [`CartTotals::of`] recomputes them from the lines
//! every time so displayed totals cannot drift from the snapshot.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use super::id::{ProductId, UserId};

/// Errors raised when a cart line would violate its invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartLineError {
    /// A line must hold at least one unit; empty lines are removed instead.
    #[error("cart line for product {0} has zero quantity")]
    ZeroQuantity(ProductId),

    /// Unit prices are never negative.
    #[error("cart line for product {product_id} has negative unit price {unit_price}")]
    NegativePrice {
        product_id: ProductId,
        unit_price: Decimal,
    },
}

/// One product entry in a cart snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    product_id: ProductId,
    product_name: String,
    unit_price: Decimal,
    quantity: u32,
    image_url: Option<String>,
}

impl CartLine {
    /// Create a validated cart line.
    ///
    /// # Errors
    ///
    /// Returns `CartLineError` if the quantity is zero or the unit price is
    /// negative.
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        unit_price: Decimal,
        quantity: u32,
        image_url: Option<String>,
    ) -> Result<Self, CartLineError> {
        if quantity == 0 {
            return Err(CartLineError::ZeroQuantity(product_id));
        }
        if unit_price.is_sign_negative() && !unit_price.is_zero() {
            return Err(CartLineError::NegativePrice {
                product_id,
                unit_price,
            });
        }
        Ok(Self {
            product_id,
            product_name: product_name.into(),
            unit_price,
            quantity,
            image_url,
        })
    }

    #[must_use]
    pub const fn product_id(&self) -> ProductId {
        self.product_id
    }

    #[must_use]
    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    #[must_use]
    pub const fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    /// Always at least 1.
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    #[must_use]
    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    /// Unrounded `unit_price * quantity`.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Server-authoritative cart contents for one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    owner: UserId,
    lines: Vec<CartLine>,
}

impl CartSnapshot {
    /// Build a snapshot from lines in server order.
    ///
    /// Product IDs are unique within a snapshot. If the server repeats a
    /// product, the quantities are merged into its first occurrence so the
    /// line keeps its original position.
    #[must_use]
    pub fn new(owner: UserId, lines: Vec<CartLine>) -> Self {
        let mut merged: Vec<CartLine> = Vec::with_capacity(lines.len());
        for line in lines {
            if let Some(existing) = merged
                .iter_mut()
                .find(|l| l.product_id == line.product_id)
            {
                existing.quantity = existing.quantity.saturating_add(line.quantity);
            } else {
                merged.push(line);
            }
        }
        Self {
            owner,
            lines: merged,
        }
    }

    /// An empty cart for `owner`.
    #[must_use]
    pub const fn empty(owner: UserId) -> Self {
        Self {
            owner,
            lines: Vec::new(),
        }
    }

    #[must_use]
    pub const fn owner(&self) -> UserId {
        self.owner
    }

    /// Lines in server insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Find the line for a product, if present.
    #[must_use]
    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    /// Quantity of a product, `0` when the product is not in the cart.
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.line(product_id).map_or(0, CartLine::quantity)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Recompute totals from the lines.
    #[must_use]
    pub fn totals(&self) -> CartTotals {
        CartTotals::of(self)
    }
}

/// Totals derived from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    /// Sum of line quantities.
    pub total_item_count: u64,
    /// Sum of `unit_price * quantity`, unrounded.
    pub total_price: Decimal,
}

impl CartTotals {
    /// Compute totals fresh from every line of `snapshot`.
    #[must_use]
    pub fn of(snapshot: &CartSnapshot) -> Self {
        snapshot
            .lines
            .iter()
            .fold(Self::default(), |acc, line| Self {
                total_item_count: acc.total_item_count + u64::from(line.quantity),
                total_price: acc.total_price + line.subtotal(),
            })
    }
}
