//! Page surfaces the cart renderer paints onto.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use askama::Template;
use cartwright_core::ProductId;
use chrono::{DateTime, Utc};
use tracing::error;

use super::render::Toast;
use super::view::CartRowView;

/// The parts of a page that show the cart.
///
/// Implementations only display what they are given; every value comes from
/// a reconciled snapshot except [`mark_provisional`](Self::mark_provisional).
pub trait CartSurface: Send + Sync {
    /// Replace the whole row list.
    fn replace_rows(&self, rows: &[CartRowView]);

    /// Show the formatted cart total.
    fn set_total(&self, total: &str);

    /// Update every badge counter element.
    fn set_badges(&self, count: u64);

    /// Show a quantity hint for a row while its mutation is in flight.
    fn mark_provisional(&self, product_id: ProductId, quantity: u32);

    /// Drop a row's quantity hint once its mutation settled.
    fn clear_provisional(&self, product_id: ProductId);

    fn show_toast(&self, toast: Toast);

    /// Ask a blocking yes/no question.
    fn confirm(&self, prompt: &str) -> bool;
}

/// Cart items fragment.
#[derive(Template)]
#[template(path = "partials/cart_items.html")]
struct CartItemsTemplate<'a> {
    rows: &'a [CartRowView],
}

/// Cart count badge fragment.
#[derive(Template)]
#[template(path = "partials/cart_count.html")]
struct CartCountTemplate {
    count: u64,
}

/// In-memory HTML page: a cart items container, a total element and a
/// number of badge counters.
#[derive(Debug)]
pub struct HtmlDocument {
    state: Mutex<DocumentState>,
    confirm_answer: AtomicBool,
}

#[derive(Debug, Default)]
struct DocumentState {
    rows_html: String,
    row_ids: Vec<ProductId>,
    total_text: String,
    badges: Vec<String>,
    badge_count: u64,
    provisional: HashMap<ProductId, u32>,
    toasts: Vec<Toast>,
    prompts: Vec<String>,
    render_count: usize,
}

impl HtmlDocument {
    /// Create a page with `badge_elements` badge counters.
    ///
    /// Confirmation prompts are accepted until
    /// [`set_confirm_answer`](Self::set_confirm_answer) says otherwise.
    #[must_use]
    pub fn new(badge_elements: usize) -> Self {
        let badge = render_badge(0).unwrap_or_default();
        Self {
            state: Mutex::new(DocumentState {
                badges: vec![badge; badge_elements],
                ..DocumentState::default()
            }),
            confirm_answer: AtomicBool::new(true),
        }
    }

    pub fn set_confirm_answer(&self, answer: bool) {
        self.confirm_answer.store(answer, Ordering::Relaxed);
    }

    #[must_use]
    pub fn rows_html(&self) -> String {
        self.state().rows_html.clone()
    }

    /// Product IDs of the rendered rows, in page order.
    #[must_use]
    pub fn row_ids(&self) -> Vec<ProductId> {
        self.state().row_ids.clone()
    }

    #[must_use]
    pub fn total_text(&self) -> String {
        self.state().total_text.clone()
    }

    /// Rendered HTML of every badge element.
    #[must_use]
    pub fn badges(&self) -> Vec<String> {
        self.state().badges.clone()
    }

    #[must_use]
    pub fn badge_count(&self) -> u64 {
        self.state().badge_count
    }

    #[must_use]
    pub fn provisional_quantity(&self, product_id: ProductId) -> Option<u32> {
        self.state().provisional.get(&product_id).copied()
    }

    /// Toasts shown so far, oldest first. Expired toasts are dropped when a
    /// new one is shown.
    #[must_use]
    pub fn toasts(&self) -> Vec<Toast> {
        self.state().toasts.clone()
    }

    /// Toasts still on screen at `now`.
    #[must_use]
    pub fn visible_toasts(&self, now: DateTime<Utc>) -> Vec<Toast> {
        self.state()
            .toasts
            .iter()
            .filter(|t| t.is_visible_at(now))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.state().prompts.clone()
    }

    /// Number of full row-list renders.
    #[must_use]
    pub fn render_count(&self) -> usize {
        self.state().render_count
    }

    fn state(&self) -> MutexGuard<'_, DocumentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn render_badge(count: u64) -> Option<String> {
    CartCountTemplate { count }
        .render()
        .inspect_err(|e| error!(error = %e, "Failed to render cart badge"))
        .ok()
}

impl CartSurface for HtmlDocument {
    fn replace_rows(&self, rows: &[CartRowView]) {
        let html = match (CartItemsTemplate { rows }).render() {
            Ok(html) => html,
            Err(e) => {
                error!(error = %e, "Failed to render cart items");
                return;
            }
        };

        let mut state = self.state();
        state.rows_html = html;
        state.row_ids = rows.iter().map(|r| r.product_id).collect();
        state.render_count += 1;
    }

    fn set_total(&self, total: &str) {
        total.clone_into(&mut self.state().total_text);
    }

    fn set_badges(&self, count: u64) {
        let Some(badge) = render_badge(count) else {
            return;
        };
        let mut state = self.state();
        state.badge_count = count;
        for element in &mut state.badges {
            element.clone_from(&badge);
        }
    }

    fn mark_provisional(&self, product_id: ProductId, quantity: u32) {
        self.state().provisional.insert(product_id, quantity);
    }

    fn clear_provisional(&self, product_id: ProductId) {
        self.state().provisional.remove(&product_id);
    }

    fn show_toast(&self, toast: Toast) {
        let mut state = self.state();
        state.toasts.retain(|t| t.is_visible_at(toast.shown_at));
        state.toasts.push(toast);
    }

    fn confirm(&self, prompt: &str) -> bool {
        self.state().prompts.push(prompt.to_string());
        self.confirm_answer.load(Ordering::Relaxed)
    }
}
