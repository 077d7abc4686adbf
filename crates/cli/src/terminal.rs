//! Terminal rendering of the cart.

use std::io::{self, BufRead, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use cartwright_core::ProductId;
use cartwright_storefront::cart::{CartRowView, CartSurface, NoticeLevel, Toast};

/// Prints toasts as they arrive and the cart on demand.
#[derive(Debug)]
pub struct TerminalSurface {
    assume_yes: bool,
    state: Mutex<TerminalState>,
}

#[derive(Debug, Default)]
struct TerminalState {
    rows: Vec<CartRowView>,
    total: String,
    items: u64,
}

impl TerminalSurface {
    /// `assume_yes` answers every confirmation prompt without asking.
    #[must_use]
    pub fn new(assume_yes: bool) -> Self {
        Self {
            assume_yes,
            state: Mutex::new(TerminalState::default()),
        }
    }

    /// Write the last rendered cart to stdout.
    ///
    /// # Errors
    ///
    /// Returns error if stdout cannot be written.
    pub fn print_cart(&self) -> io::Result<()> {
        let text = format_cart(&self.state());
        io::stdout().lock().write_all(text.as_bytes())
    }

    fn state(&self) -> MutexGuard<'_, TerminalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn format_cart(state: &TerminalState) -> String {
    use std::fmt::Write as _;

    let mut out = String::new();
    if state.rows.is_empty() {
        out.push_str("Your cart is empty.\n");
    }
    for row in &state.rows {
        let _ = writeln!(
            out,
            "{:>6}  {:<30} {:>4} x {:>12} {:>14}",
            row.product_id,
            row.product_name,
            row.quantity,
            row.unit_price_display,
            row.line_subtotal_display,
        );
    }
    let _ = writeln!(out, "Total: {} ({} items)", state.total, state.items);
    out
}

impl CartSurface for TerminalSurface {
    fn replace_rows(&self, rows: &[CartRowView]) {
        self.state().rows = rows.to_vec();
    }

    fn set_total(&self, total: &str) {
        total.clone_into(&mut self.state().total);
    }

    fn set_badges(&self, count: u64) {
        self.state().items = count;
    }

    fn mark_provisional(&self, product_id: ProductId, quantity: u32) {
        tracing::debug!(product_id = %product_id, quantity, "Updating cart line");
    }

    fn clear_provisional(&self, _product_id: ProductId) {}

    fn show_toast(&self, toast: Toast) {
        let tag = match toast.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Info => "info",
            NoticeLevel::Error => "error",
        };
        if let Err(e) = writeln!(io::stdout().lock(), "[{tag}] {}", toast.title) {
            tracing::warn!(error = %e, "Failed to print notice");
        }
    }

    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }

        let mut stdout = io::stdout().lock();
        if write!(stdout, "{prompt} [y/N] ").and_then(|()| stdout.flush()).is_err() {
            return false;
        }
        drop(stdout);

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}
