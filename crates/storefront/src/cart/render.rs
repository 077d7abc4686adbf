//! Binds reconciler output to a page surface and page actions back to the
//! reconciler.

use std::str::FromStr;
use std::time::Duration;

use cartwright_core::{CartSnapshot, CurrencyCode, ProductId};
use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tracing::{debug, warn};

use super::events::{CartEvent, Notice, NoticeLevel, ReconcileCause};
use super::reconciler::{CartDelta, CartReconciler, MutationOutcome};
use super::surface::CartSurface;
use super::view::CartView;

/// Confirmation asked before emptying the cart.
pub const CLEAR_PROMPT: &str = "Are you sure you want to empty the cart?";

/// A transient notice on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: NoticeLevel,
    pub title: String,
    pub shown_at: DateTime<Utc>,
    pub duration: Duration,
}

impl Toast {
    #[must_use]
    pub fn new(notice: &Notice, shown_at: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            level: notice.level,
            title: notice.title.clone(),
            shown_at,
            duration,
        }
    }

    /// When the toast dismisses itself.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        TimeDelta::from_std(self.duration)
            .ok()
            .and_then(|d| self.shown_at.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    #[must_use]
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.shown_at && now < self.expires_at()
    }
}

/// A row control, as carried by the `data-action` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    Increase,
    Decrease,
    Remove,
}

/// Unknown `data-action` value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown row action: {0}")]
pub struct UnknownRowAction(pub String);

impl FromStr for RowAction {
    type Err = UnknownRowAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "increase" => Ok(Self::Increase),
            "decrease" => Ok(Self::Decrease),
            "remove" => Ok(Self::Remove),
            other => Err(UnknownRowAction(other.to_string())),
        }
    }
}

impl From<RowAction> for CartDelta {
    fn from(action: RowAction) -> Self {
        match action {
            RowAction::Increase => Self::Increase,
            RowAction::Decrease => Self::Decrease,
            RowAction::Remove => Self::Remove,
        }
    }
}

/// Paints reconciler events onto a [`CartSurface`].
///
/// Every render replaces the whole row list and updates every badge, failure
/// renders included. A failure before the first successful fetch only shows
/// a toast: an unknown cart is never painted as empty.
pub struct CartRenderer<S> {
    reconciler: CartReconciler,
    surface: S,
    toast_duration: Duration,
    currency: CurrencyCode,
}

impl<S: CartSurface> CartRenderer<S> {
    #[must_use]
    pub const fn new(
        reconciler: CartReconciler,
        surface: S,
        toast_duration: Duration,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            reconciler,
            surface,
            toast_duration,
            currency,
        }
    }

    #[must_use]
    pub const fn surface(&self) -> &S {
        &self.surface
    }

    #[must_use]
    pub const fn reconciler(&self) -> &CartReconciler {
        &self.reconciler
    }

    /// Render rows, total and badges from `snapshot`.
    pub fn render(&self, snapshot: &CartSnapshot) {
        let view = CartView::derive_in(snapshot, self.currency);
        self.surface.replace_rows(&view.rows);
        self.surface.set_total(&view.totals.total_price_display);
        self.surface.set_badges(view.totals.total_item_count);
    }

    /// Apply one reconciler event.
    pub fn apply(&self, event: &CartEvent) {
        match event {
            CartEvent::Provisional {
                product_id,
                quantity,
            } => self.surface.mark_provisional(*product_id, *quantity),
            CartEvent::Reconciled {
                cause,
                snapshot,
                notice,
                ..
            } => {
                self.render(snapshot);
                self.settle(cause);
                if let Some(notice) = notice {
                    self.toast(notice);
                }
            }
            CartEvent::Failed {
                cause,
                snapshot,
                notice,
                ..
            } => {
                if let Some(snapshot) = snapshot {
                    self.render(snapshot);
                }
                self.settle(cause);
                self.toast(notice);
            }
        }
    }

    /// Apply events until the reconciler is dropped.
    pub async fn run(&self, mut events: broadcast::Receiver<CartEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => self.apply(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Cart renderer lagged, re-rendering current cart");
                    self.render_current();
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("Cart event stream closed");
    }

    /// Apply every event already queued on `events`. Returns how many were
    /// applied.
    pub fn drain(&self, events: &mut broadcast::Receiver<CartEvent>) -> usize {
        let mut applied = 0;
        loop {
            match events.try_recv() {
                Ok(event) => {
                    self.apply(&event);
                    applied += 1;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Cart renderer lagged, re-rendering current cart");
                    self.render_current();
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return applied,
            }
        }
    }

    /// A row's increase/decrease/remove control was clicked.
    pub async fn on_row_action(&self, product_id: ProductId, action: RowAction) -> MutationOutcome {
        self.reconciler.mutate(product_id, action.into()).await
    }

    /// Route a click by its `data-id` and `data-action` attributes.
    ///
    /// Clicks that do not name a product and a known action are ignored.
    pub async fn dispatch(&self, data_id: &str, data_action: &str) -> Option<MutationOutcome> {
        let Some(product_id) = ProductId::parse_data_attribute(data_id) else {
            debug!(data_id, "Ignoring click without a product id");
            return None;
        };
        let action = match data_action.parse::<RowAction>() {
            Ok(action) => action,
            Err(e) => {
                debug!(error = %e, "Ignoring click");
                return None;
            }
        };
        Some(self.on_row_action(product_id, action).await)
    }

    /// A catalog "add to cart" button was clicked.
    pub async fn on_add_to_cart(&self, product_id: ProductId) -> MutationOutcome {
        self.reconciler.add_new_product(product_id).await
    }

    /// The "empty cart" button was clicked. Returns `None` if the shopper
    /// declined the confirmation.
    pub async fn on_clear_clicked(&self) -> Option<MutationOutcome> {
        if !self.surface.confirm(CLEAR_PROMPT) {
            debug!("Clear cart cancelled");
            return None;
        }
        Some(self.reconciler.clear_all().await)
    }

    pub async fn on_checkout_clicked(&self) -> MutationOutcome {
        self.reconciler.checkout().await
    }

    fn render_current(&self) {
        if let Some(snapshot) = self.reconciler.snapshot() {
            self.render(&snapshot);
        }
    }

    /// Drop the quantity hint of the product whose mutation settled.
    fn settle(&self, cause: &ReconcileCause) {
        if let Some(product_id) = cause.product_id() {
            self.surface.clear_provisional(product_id);
        }
    }

    fn toast(&self, notice: &Notice) {
        self.surface
            .show_toast(Toast::new(notice, Utc::now(), self.toast_duration));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cartwright_core::UserId;

    use super::*;
    use crate::cart::client::CartApi;
    use crate::cart::surface::HtmlDocument;
    use crate::cart::testing::{Call, FakeCartApi};
    use crate::error::ACTION_FAILED;

    const P1: ProductId = ProductId::new(1);
    const P2: ProductId = ProductId::new(2);
    const P3: ProductId = ProductId::new(3);

    fn renderer(api: &Arc<FakeCartApi>, badges: usize) -> CartRenderer<HtmlDocument> {
        let reconciler = CartReconciler::new(UserId::new(1), Arc::clone(api) as Arc<dyn CartApi>);
        CartRenderer::new(
            reconciler,
            HtmlDocument::new(badges),
            Duration::from_millis(1_200),
            CurrencyCode::COP,
        )
    }

    /// Refresh and paint the initial cart, returning the live receiver.
    async fn loaded(renderer: &CartRenderer<HtmlDocument>) -> broadcast::Receiver<CartEvent> {
        let mut rx = renderer.reconciler().subscribe();
        renderer.reconciler().refresh().await;
        renderer.drain(&mut rx);
        rx
    }

    #[test]
    fn test_row_action_parsing() {
        assert_eq!("increase".parse::<RowAction>(), Ok(RowAction::Increase));
        assert_eq!("decrease".parse::<RowAction>(), Ok(RowAction::Decrease));
        assert_eq!(" remove ".parse::<RowAction>(), Ok(RowAction::Remove));
        assert!("explode".parse::<RowAction>().is_err());
        assert_eq!(CartDelta::from(RowAction::Decrease), CartDelta::Decrease);
    }

    #[test]
    fn test_toast_expiry() {
        let shown_at = Utc::now();
        let toast = Toast::new(
            &Notice::success("Cart emptied"),
            shown_at,
            Duration::from_millis(1_200),
        );
        assert!(toast.is_visible_at(shown_at));
        assert!(toast.is_visible_at(shown_at + TimeDelta::milliseconds(1_199)));
        assert!(!toast.is_visible_at(shown_at + TimeDelta::milliseconds(1_200)));
    }

    #[tokio::test]
    async fn test_initial_render() {
        let api = Arc::new(FakeCartApi::new().with_line(P1, 10_000, 2));
        let renderer = renderer(&api, 2);
        loaded(&renderer).await;

        let page = renderer.surface();
        assert_eq!(page.row_ids(), vec![P1]);
        assert_eq!(page.total_text(), "$20.000");
        assert_eq!(page.badge_count(), 2);
        assert!(page.badges().iter().all(|b| b.contains(">2<")));
        assert!(page.toasts().is_empty());
    }

    #[tokio::test]
    async fn test_clear_all_empties_rows_and_badges() {
        let api = Arc::new(
            FakeCartApi::new()
                .with_line(P1, 10_000, 1)
                .with_line(P2, 5_000, 2)
                .with_line(P3, 1_000, 3),
        );
        let renderer = renderer(&api, 3);
        let mut rx = loaded(&renderer).await;
        assert_eq!(renderer.surface().badge_count(), 6);

        let outcome = renderer.on_clear_clicked().await;
        renderer.drain(&mut rx);

        assert!(outcome.is_some_and(|o| o.is_reconciled()));
        let page = renderer.surface();
        assert!(page.row_ids().is_empty());
        assert_eq!(page.badge_count(), 0);
        assert!(page.badges().iter().all(|b| b.contains(">0<")));
        assert_eq!(page.prompts(), vec![CLEAR_PROMPT.to_string()]);
        assert_eq!(page.toasts()[0].title, "Cart emptied");
    }

    #[tokio::test]
    async fn test_declined_confirmation_sends_nothing() {
        let api = Arc::new(FakeCartApi::new().with_line(P1, 10_000, 1));
        let renderer = renderer(&api, 1);
        loaded(&renderer).await;
        renderer.surface().set_confirm_answer(false);

        assert!(renderer.on_clear_clicked().await.is_none());
        assert!(api.mutation_calls().is_empty());
        assert_eq!(renderer.surface().row_ids(), vec![P1]);
    }

    #[tokio::test]
    async fn test_fetch_failure_after_add_keeps_rendered_cart() {
        let api = Arc::new(FakeCartApi::new().with_line(P1, 10_000, 2));
        let renderer = renderer(&api, 1);
        let mut rx = loaded(&renderer).await;
        let rows_before = renderer.surface().rows_html();
        let total_before = renderer.surface().total_text();

        api.set_fail_fetch(true);
        renderer.on_add_to_cart(P2).await;
        renderer.drain(&mut rx);

        let page = renderer.surface();
        assert_eq!(page.rows_html(), rows_before);
        assert_eq!(page.total_text(), total_before);
        assert_eq!(page.badge_count(), 2);
        let toasts = page.toasts();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].level, NoticeLevel::Error);
        assert_eq!(toasts[0].title, ACTION_FAILED);
    }

    #[tokio::test]
    async fn test_unknown_cart_is_never_painted_empty() {
        let api = Arc::new(FakeCartApi::new().with_line(P1, 10_000, 2));
        api.set_fail_fetch(true);
        let renderer = renderer(&api, 1);
        loaded(&renderer).await;

        let page = renderer.surface();
        assert_eq!(page.render_count(), 0);
        assert_eq!(page.toasts().len(), 1);
        assert_eq!(page.toasts()[0].title, ACTION_FAILED);
    }

    #[tokio::test]
    async fn test_failed_add_on_unknown_cart_clears_hint() {
        let api = Arc::new(FakeCartApi::new());
        api.set_fail_fetch(true);
        let renderer = renderer(&api, 1);
        let mut rx = loaded(&renderer).await;

        renderer.on_add_to_cart(P2).await;
        renderer.drain(&mut rx);

        assert_eq!(renderer.surface().provisional_quantity(P2), None);
        assert_eq!(renderer.surface().render_count(), 0);
    }

    #[tokio::test]
    async fn test_hint_survives_other_products_settling() {
        let api = Arc::new(
            FakeCartApi::new()
                .with_line(P1, 10_000, 1)
                .with_line(P2, 5_000, 1),
        );
        let renderer = renderer(&api, 1);
        let mut rx = loaded(&renderer).await;
        let release = api.hold(P1);

        let slow = {
            let reconciler = renderer.reconciler().clone();
            tokio::spawn(async move { reconciler.mutate(P1, CartDelta::Increase).await })
        };
        while !renderer.reconciler().locks().is_held(P1) {
            tokio::task::yield_now().await;
        }

        renderer.on_row_action(P2, RowAction::Increase).await;
        renderer.drain(&mut rx);
        let page = renderer.surface();
        assert_eq!(page.provisional_quantity(P1), Some(2));
        assert_eq!(page.provisional_quantity(P2), None);

        release.notify_one();
        assert!(slow.await.unwrap().is_reconciled());
        renderer.drain(&mut rx);
        assert_eq!(page.provisional_quantity(P1), None);
        assert_eq!(page.total_text(), "$30.000");
    }

    #[tokio::test]
    async fn test_dispatch_routes_row_clicks() {
        let api = Arc::new(FakeCartApi::new().with_line(P1, 10_000, 1));
        let renderer = renderer(&api, 1);
        let mut rx = loaded(&renderer).await;

        assert!(renderer.dispatch("abc", "increase").await.is_none());
        assert!(renderer.dispatch("1", "explode").await.is_none());
        let outcome = renderer.dispatch("1", "decrease").await;
        renderer.drain(&mut rx);

        assert!(outcome.is_some_and(|o| o.is_reconciled()));
        assert_eq!(api.mutation_calls(), vec![Call::Remove(P1)]);
        assert!(renderer.surface().row_ids().is_empty());
        assert_eq!(renderer.surface().total_text(), "$0");
    }

    #[tokio::test]
    async fn test_lagged_renderer_catches_up() {
        let api = Arc::new(FakeCartApi::new().with_line(P1, 10_000, 1));
        let renderer = renderer(&api, 1);
        let mut rx = renderer.reconciler().subscribe();

        for _ in 0..100 {
            renderer.reconciler().refresh().await;
        }
        renderer.on_row_action(P1, RowAction::Increase).await;
        renderer.drain(&mut rx);

        assert_eq!(renderer.surface().row_ids(), vec![P1]);
        assert_eq!(renderer.surface().total_text(), "$20.000");
    }
}
