//! Cartwright Storefront - cart state reconciliation.
//!
//! Keeps the cart shown on a storefront page consistent with the remote cart
//! service while shoppers click add/increase/decrease/remove faster than the
//! service answers.
//!
//! # Architecture
//!
//! - [`cart::HttpCartClient`] - stateless wrapper over the cart service's REST API
//! - [`cart::MutationLock`] - per-product guard against double submission
//! - [`cart::CartReconciler`] - lock → remote call → authoritative refetch → release → notify
//! - [`cart::CartView`] - pure derivation of rows and totals from a snapshot
//! - [`cart::CartRenderer`] - subscribes to reconciler events and paints a [`cart::CartSurface`]
//!
//! The cart service is the source of truth. Local arithmetic is only ever
//! shown as a provisional hint and is never stored as cart state.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cartwright_storefront::{CartConfig, CartSession, SessionSettings, StaticIdentity};
//! use cartwright_storefront::cart::{HtmlDocument, HttpCartClient};
//!
//! let config = CartConfig::from_env()?;
//! let api = Arc::new(HttpCartClient::new(&config)?);
//! let identity = StaticIdentity::new(config.user_id.clone());
//! let surface = HtmlDocument::new(config.badge_count);
//!
//! if let Some(session) =
//!     CartSession::init(&identity, api, surface, SessionSettings::from_config(&config)).await
//! {
//!     session.click_row("12", "increase").await;
//! }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod config;
pub mod error;
pub mod session;

pub use config::{CartConfig, ConfigError};
pub use error::{CartError, MutationKind, TransportError};
pub use session::{CartSession, IdentityProvider, SessionSettings, StaticIdentity};
