//! Display data derived from a cart snapshot.
//!
//! Pure functions only: the same snapshot always yields the same view, and
//! totals are recomputed from every line instead of patched.

use cartwright_core::{CartLine, CartSnapshot, CurrencyCode, Price, ProductId};
use rust_decimal::Decimal;

/// One rendered cart row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartRowView {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    /// `unit_price * quantity` rounded to the display currency.
    pub line_subtotal: Decimal,
    pub image_url: Option<String>,
    pub unit_price_display: String,
    pub line_subtotal_display: String,
}

/// Cart totals ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartTotalsView {
    pub total_item_count: u64,
    /// Unrounded sum of line subtotals.
    pub total_price: Decimal,
    /// Sum of the rounded row subtotals, so the shown rows add up to the
    /// shown total.
    pub total_price_display: String,
}

/// Rows in snapshot order plus totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartView {
    pub rows: Vec<CartRowView>,
    pub totals: CartTotalsView,
}

impl CartView {
    /// Derive the view in the storefront's default currency (COP).
    #[must_use]
    pub fn derive(snapshot: &CartSnapshot) -> Self {
        Self::derive_in(snapshot, CurrencyCode::default())
    }

    #[must_use]
    pub fn derive_in(snapshot: &CartSnapshot, currency: CurrencyCode) -> Self {
        let totals = snapshot.totals();
        let rows: Vec<CartRowView> = snapshot
            .lines()
            .iter()
            .map(|line| CartRowView::derive(line, currency))
            .collect();
        let shown_total: Decimal = rows.iter().map(|r| r.line_subtotal).sum();

        Self {
            rows,
            totals: CartTotalsView {
                total_item_count: totals.total_item_count,
                total_price: totals.total_price,
                total_price_display: Price::new(shown_total, currency).display(),
            },
        }
    }

    /// View of a cart with no lines.
    #[must_use]
    pub fn empty(currency: CurrencyCode) -> Self {
        Self {
            rows: Vec::new(),
            totals: CartTotalsView {
                total_item_count: 0,
                total_price: Decimal::ZERO,
                total_price_display: Price::new(Decimal::ZERO, currency).display(),
            },
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl CartRowView {
    fn derive(line: &CartLine, currency: CurrencyCode) -> Self {
        let subtotal = Price::new(line.subtotal(), currency).rounded();
        let product_name = if line.product_name().trim().is_empty() {
            format!("Product #{}", line.product_id())
        } else {
            line.product_name().to_string()
        };

        Self {
            product_id: line.product_id(),
            product_name,
            unit_price: line.unit_price(),
            quantity: line.quantity(),
            line_subtotal: subtotal.amount,
            image_url: line.image_url().map(str::to_string),
            unit_price_display: Price::new(line.unit_price(), currency).display(),
            line_subtotal_display: subtotal.display(),
        }
    }
}

#[cfg(test)]
mod tests {
    use cartwright_core::UserId;

    use super::*;

    fn snapshot(lines: Vec<CartLine>) -> CartSnapshot {
        CartSnapshot::new(UserId::new(1), lines)
    }

    fn line(id: i32, name: &str, price: Decimal, quantity: u32) -> CartLine {
        CartLine::new(ProductId::new(id), name, price, quantity, None).unwrap()
    }

    #[test]
    fn test_single_line_totals() {
        let view = CartView::derive(&snapshot(vec![line(
            1,
            "Café",
            Decimal::from(10_000),
            2,
        )]));

        assert_eq!(view.totals.total_price, Decimal::from(20_000));
        assert_eq!(view.totals.total_item_count, 2);
        assert_eq!(view.totals.total_price_display, "$20.000");
        assert_eq!(view.rows[0].line_subtotal_display, "$20.000");
        assert_eq!(view.rows[0].unit_price_display, "$10.000");
    }

    #[test]
    fn test_rows_keep_snapshot_order() {
        let view = CartView::derive(&snapshot(vec![
            line(3, "C", Decimal::ONE, 1),
            line(1, "A", Decimal::ONE, 1),
            line(2, "B", Decimal::ONE, 1),
        ]));
        let ids: Vec<i32> = view.rows.iter().map(|r| r.product_id.as_i32()).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_line_subtotal_rounds_to_whole_pesos() {
        // 3 x 333.5 = 1000.5
        let view = CartView::derive(&snapshot(vec![line(
            1,
            "Arepa",
            Decimal::new(3335, 1),
            3,
        )]));
        assert_eq!(view.rows[0].line_subtotal, Decimal::from(1_001));
        assert_eq!(view.totals.total_price, Decimal::new(10_005, 1));
    }

    #[test]
    fn test_displayed_total_matches_displayed_rows() {
        // Each 333.5 line shows as 334; the unrounded total is 1000.5.
        let view = CartView::derive(&snapshot(vec![
            line(1, "A", Decimal::new(3335, 1), 1),
            line(2, "B", Decimal::new(3335, 1), 1),
            line(3, "C", Decimal::new(3335, 1), 1),
        ]));

        assert!(view.rows.iter().all(|r| r.line_subtotal_display == "$334"));
        assert_eq!(view.totals.total_price_display, "$1.002");
        assert_eq!(view.totals.total_price, Decimal::new(10_005, 1));
    }

    #[test]
    fn test_missing_name_falls_back_to_product_id() {
        let view = CartView::derive(&snapshot(vec![line(42, "", Decimal::ONE, 1)]));
        assert_eq!(view.rows[0].product_name, "Product #42");
    }

    #[test]
    fn test_empty_snapshot() {
        let view = CartView::derive(&snapshot(Vec::new()));
        assert!(view.is_empty());
        assert_eq!(view, CartView::empty(CurrencyCode::COP));
        assert_eq!(view.totals.total_price_display, "$0");
    }

    #[test]
    fn test_usd_formatting() {
        let view = CartView::derive_in(
            &snapshot(vec![line(1, "Mug", Decimal::new(61_725, 2), 2)]),
            CurrencyCode::USD,
        );
        assert_eq!(view.totals.total_price_display, "$1,234.50");
    }
}
