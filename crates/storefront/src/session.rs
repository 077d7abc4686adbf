//! Page session wiring.
//!
//! One reconciler and one renderer per page session, created only when the
//! identity collaborator names a valid user.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use cartwright_core::{CurrencyCode, ProductId, UserId};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::cart::{
    CartApi, CartEvent, CartReconciler, CartRenderer, CartSurface, MutationOutcome,
};
use crate::config::CartConfig;
use crate::error::set_sentry_user;

/// Source of the signed-in user's ID.
pub trait IdentityProvider {
    /// Raw user ID as stored by the login flow, if any.
    fn session_value(&self) -> Option<String>;

    /// Parsed user ID; `None` when absent or not numeric.
    fn user_id(&self) -> Option<UserId> {
        self.session_value()
            .as_deref()
            .and_then(UserId::parse_session_value)
    }
}

/// Identity with a fixed session value.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    value: Option<String>,
}

impl StaticIdentity {
    #[must_use]
    pub const fn new(value: Option<String>) -> Self {
        Self { value }
    }
}

impl IdentityProvider for StaticIdentity {
    fn session_value(&self) -> Option<String> {
        self.value.clone()
    }
}

/// Display settings for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub toast_duration: Duration,
    pub currency: CurrencyCode,
}

impl SessionSettings {
    #[must_use]
    pub const fn from_config(config: &CartConfig) -> Self {
        Self {
            toast_duration: config.toast_duration,
            currency: CurrencyCode::COP,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            toast_duration: Duration::from_millis(1_200),
            currency: CurrencyCode::default(),
        }
    }
}

/// The cart subsystem of one page session.
///
/// Page actions render their own results before returning. A long-lived
/// page can instead hand rendering to a background task with
/// [`spawn_render_loop`](Self::spawn_render_loop).
pub struct CartSession<S> {
    renderer: Arc<CartRenderer<S>>,
    events: Mutex<Option<broadcast::Receiver<CartEvent>>>,
}

impl<S: CartSurface + 'static> CartSession<S> {
    /// Start the cart subsystem and render the initial cart.
    ///
    /// Returns `None`, doing nothing, when there is no valid signed-in user.
    /// A failed initial fetch still yields a session; the page shows an
    /// error toast and no cart.
    #[instrument(skip_all)]
    pub async fn init(
        identity: &impl IdentityProvider,
        api: Arc<dyn CartApi>,
        surface: S,
        settings: SessionSettings,
    ) -> Option<Self> {
        let Some(user_id) = identity.user_id() else {
            warn!("No valid user in session, cart disabled");
            return None;
        };
        set_sentry_user(&user_id);

        let reconciler = CartReconciler::new(user_id, api);
        let events = reconciler.subscribe();
        let renderer = Arc::new(CartRenderer::new(
            reconciler,
            surface,
            settings.toast_duration,
            settings.currency,
        ));
        let session = Self {
            renderer,
            events: Mutex::new(Some(events)),
        };

        session.reconciler().refresh().await;
        session.pump();
        info!(user_id = %user_id, "Cart session started");
        Some(session)
    }

    #[must_use]
    pub fn renderer(&self) -> &CartRenderer<S> {
        &self.renderer
    }

    #[must_use]
    pub fn reconciler(&self) -> &CartReconciler {
        self.renderer.reconciler()
    }

    #[must_use]
    pub fn surface(&self) -> &S {
        self.renderer.surface()
    }

    /// Render every queued event. A no-op once the render loop is spawned.
    pub fn pump(&self) -> usize {
        self.events()
            .as_mut()
            .map_or(0, |events| self.renderer.drain(events))
    }

    /// Move rendering to a background task.
    ///
    /// Returns `None` if the loop was already spawned.
    pub fn spawn_render_loop(&self) -> Option<JoinHandle<()>> {
        let events = self.events().take()?;
        let renderer = Arc::clone(&self.renderer);
        Some(tokio::spawn(async move { renderer.run(events).await }))
    }

    /// A row control was clicked.
    pub async fn click_row(&self, data_id: &str, data_action: &str) -> Option<MutationOutcome> {
        let outcome = self.renderer.dispatch(data_id, data_action).await;
        self.pump();
        outcome
    }

    pub async fn add_to_cart(&self, product_id: ProductId) -> MutationOutcome {
        let outcome = self.renderer.on_add_to_cart(product_id).await;
        self.pump();
        outcome
    }

    /// Ask for confirmation, then empty the cart.
    pub async fn clear(&self) -> Option<MutationOutcome> {
        let outcome = self.renderer.on_clear_clicked().await;
        self.pump();
        outcome
    }

    pub async fn checkout(&self) -> MutationOutcome {
        let outcome = self.renderer.on_checkout_clicked().await;
        self.pump();
        outcome
    }

    fn events(&self) -> MutexGuard<'_, Option<broadcast::Receiver<CartEvent>>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::HtmlDocument;
    use crate::cart::testing::{Call, FakeCartApi};

    fn identity(value: &str) -> StaticIdentity {
        StaticIdentity::new(Some(value.to_string()))
    }

    #[test]
    fn test_identity_parsing() {
        assert_eq!(identity(" 17 ").user_id(), Some(UserId::new(17)));
        assert_eq!(identity("guest").user_id(), None);
        assert_eq!(StaticIdentity::default().user_id(), None);
    }

    #[tokio::test]
    async fn test_no_user_means_no_session() {
        let api = Arc::new(FakeCartApi::new());
        let session = CartSession::init(
            &StaticIdentity::default(),
            Arc::clone(&api) as Arc<dyn CartApi>,
            HtmlDocument::new(1),
            SessionSettings::default(),
        )
        .await;

        assert!(session.is_none());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_session_renders_initial_cart_and_actions() {
        let api = Arc::new(FakeCartApi::new().with_line(ProductId::new(12), 10_000, 2));
        let session = CartSession::init(
            &identity("5"),
            Arc::clone(&api) as Arc<dyn CartApi>,
            HtmlDocument::new(2),
            SessionSettings::default(),
        )
        .await
        .unwrap();

        assert_eq!(session.reconciler().user_id(), UserId::new(5));
        assert_eq!(session.surface().total_text(), "$20.000");

        session.click_row("12", "increase").await;
        assert_eq!(session.surface().total_text(), "$30.000");
        assert_eq!(session.surface().badge_count(), 3);

        session.add_to_cart(ProductId::new(4)).await;
        assert_eq!(session.surface().row_ids().len(), 2);

        let outcome = session.checkout().await;
        assert!(outcome.is_reconciled());
        let titles: Vec<String> = session
            .surface()
            .toasts()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(
            titles,
            vec![
                "Product added to cart".to_string(),
                "Proceeding to payment with 2 products.".to_string(),
            ]
        );
        assert_eq!(
            api.mutation_calls(),
            vec![
                Call::SetQuantity(ProductId::new(12), 3),
                Call::Add(ProductId::new(4), 1)
            ]
        );
    }

    #[tokio::test]
    async fn test_render_loop_takes_over_rendering() {
        let api = Arc::new(FakeCartApi::new().with_line(ProductId::new(1), 1_000, 1));
        let session = CartSession::init(
            &identity("1"),
            Arc::clone(&api) as Arc<dyn CartApi>,
            HtmlDocument::new(1),
            SessionSettings::default(),
        )
        .await
        .unwrap();

        let handle = session.spawn_render_loop();
        assert!(handle.is_some());
        assert!(session.spawn_render_loop().is_none());
        assert_eq!(session.pump(), 0);
    }
}
