//! Cart commands.
//!
//! Each invocation is one page session: load the cart, apply at most one
//! action, print the reconciled cart.

use std::sync::Arc;

use cartwright_core::ProductId;
use cartwright_storefront::cart::{CartApi, CartDelta, HttpCartClient, MutationOutcome, RowAction};
use cartwright_storefront::{
    CartConfig, CartError, CartSession, SessionSettings, StaticIdentity, TransportError,
};
use thiserror::Error;

use crate::Commands;
use crate::terminal::TerminalSurface;

/// Errors that can occur while running a cart command.
#[derive(Debug, Error)]
pub enum CartCommandError {
    /// The HTTP client could not be built.
    #[error("Failed to build cart client: {0}")]
    Client(#[from] TransportError),

    #[error("No valid user ID; set CART_USER_ID or pass --user")]
    NoUser,

    /// The cart could not be loaded at all.
    #[error("Cart is unavailable")]
    Unavailable,

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

/// Run a cart command against the configured cart service.
pub async fn run(
    command: Commands,
    user: Option<String>,
    config: CartConfig,
) -> Result<(), CartCommandError> {
    let api: Arc<dyn CartApi> = Arc::new(HttpCartClient::new(&config)?);
    let identity = StaticIdentity::new(user.or_else(|| config.user_id.clone()));
    let surface = TerminalSurface::new(matches!(command, Commands::Clear { yes: true }));

    let session = CartSession::init(
        &identity,
        api,
        surface,
        SessionSettings::from_config(&config),
    )
    .await
    .ok_or(CartCommandError::NoUser)?;

    if session.reconciler().snapshot().is_none() {
        return Err(CartCommandError::Unavailable);
    }

    let outcome = match command {
        Commands::Show => None,
        Commands::Add { product_id } => {
            Some(session.add_to_cart(ProductId::new(product_id)).await)
        }
        Commands::Inc { product_id } => Some(row_action(&session, product_id, RowAction::Increase).await),
        Commands::Dec { product_id } => Some(row_action(&session, product_id, RowAction::Decrease).await),
        Commands::Remove { product_id } => {
            Some(row_action(&session, product_id, RowAction::Remove).await)
        }
        Commands::Set {
            product_id,
            quantity,
        } => Some(
            session
                .reconciler()
                .mutate(ProductId::new(product_id), CartDelta::SetExplicit(quantity))
                .await,
        ),
        Commands::Clear { .. } => session.clear().await,
        Commands::Checkout => Some(session.checkout().await),
    };
    session.pump();

    session.surface().print_cart()?;

    match outcome {
        Some(MutationOutcome::Failed(err)) => Err(err.into()),
        _ => Ok(()),
    }
}

async fn row_action(
    session: &CartSession<TerminalSurface>,
    product_id: i32,
    action: RowAction,
) -> MutationOutcome {
    session
        .renderer()
        .on_row_action(ProductId::new(product_id), action)
        .await
}
