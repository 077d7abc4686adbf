//! Cart reconciliation subsystem.
//!
//! Data flow for a shopper action:
//!
//! ```text
//! click → CartRenderer → CartReconciler::mutate → MutationLock
//!       → CartApi call → CartApi::fetch → CartEvent → CartView → CartSurface
//! ```

mod client;
mod events;
mod lock;
mod reconciler;
mod render;
mod surface;
mod view;
mod wire;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{CartApi, HttpCartClient};
pub use events::{CartEvent, Notice, NoticeLevel, ReconcileCause};
pub use lock::{LockBusyError, MutationGuard, MutationLock};
pub use reconciler::{
    CartDelta, CartReconciler, MutationOutcome, MutationPlan, ProductState, plan,
};
pub use render::{CLEAR_PROMPT, CartRenderer, RowAction, Toast, UnknownRowAction};
pub use surface::{CartSurface, HtmlDocument};
pub use view::{CartRowView, CartTotalsView, CartView};
pub use wire::{CartItemPayload, CartLineRequest, CartPayload};
