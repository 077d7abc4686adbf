//! Cartwright Core - Shared types library.
//!
//! This crate provides the types shared by all Cartwright components:
//! - `storefront` - Cart reconciliation subsystem for the storefront pages
//! - `cli` - Terminal driver for the cart subsystem
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no async. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, cart snapshots and the admin product contract
//!
//! [`ProductDraft`] and its companions are the admin console's product payload.
//! They are shared for serialization only; the storefront cart never reads them.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
