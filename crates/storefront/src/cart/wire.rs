//! Cart service wire format.
//!
//! The service speaks camelCase JSON. Missing fields fall back the way the
//! storefront pages always treated them: no name, price `0`, quantity `1`.
//! Lines reported with quantity `0` are dropped; a cart never shows an empty
//! line.

use cartwright_core::{CartLine, CartLineError, CartSnapshot, ProductId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Body of `GET /cart/{userId}`.
#[derive(Debug, Clone, Deserialize)]
pub struct CartPayload {
    #[serde(default)]
    pub items: Vec<CartItemPayload>,
}

/// One item of a cart payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemPayload {
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Body of the add and update calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl CartPayload {
    /// Convert into a snapshot owned by `owner`, keeping server order.
    ///
    /// # Errors
    ///
    /// Returns `CartLineError` if an item carries a negative price.
    pub fn into_snapshot(self, owner: UserId) -> Result<CartSnapshot, CartLineError> {
        let lines = self
            .items
            .into_iter()
            .filter_map(|item| item.into_line().transpose())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CartSnapshot::new(owner, lines))
    }
}

impl CartItemPayload {
    /// `Ok(None)` when the item has no units left.
    fn into_line(self) -> Result<Option<CartLine>, CartLineError> {
        let quantity = self.quantity.unwrap_or(1);
        if quantity == 0 {
            tracing::debug!(product_id = %self.product_id, "Dropping zero-quantity cart item");
            return Ok(None);
        }

        CartLine::new(
            self.product_id,
            self.product_name.unwrap_or_default(),
            self.unit_price.unwrap_or(Decimal::ZERO),
            quantity,
            self.image_url.filter(|url| !url.trim().is_empty()),
        )
        .map(Some)
    }
}
