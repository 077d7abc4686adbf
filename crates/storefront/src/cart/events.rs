//! Events published by the reconciler.
//!
//! The renderer subscribes to these instead of mutation logic painting the
//! page directly. Every settled operation produces exactly one `Reconciled`
//! or `Failed` event carrying the snapshot the page should show.

use std::sync::Arc;

use cartwright_core::{CartSnapshot, ProductId};
use uuid::Uuid;

use super::reconciler::CartDelta;
use crate::error::{ACTION_FAILED, CartError};

/// Severity of a shopper-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// A short message for the shopper, shown as a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
}

impl Notice {
    #[must_use]
    pub fn success(title: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: title.into(),
        }
    }

    #[must_use]
    pub fn info(title: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.into(),
        }
    }

    /// The single notice used for every failed cart action.
    #[must_use]
    pub fn action_failed() -> Self {
        Self {
            level: NoticeLevel::Error,
            title: ACTION_FAILED.to_string(),
        }
    }
}

/// What started a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileCause {
    /// Initial load or an explicit refresh.
    Refresh,
    /// A row control changed a product's quantity.
    Mutation {
        product_id: ProductId,
        delta: CartDelta,
    },
    /// A catalog "add to cart" action.
    AddProduct(ProductId),
    /// The "empty cart" action.
    ClearAll,
    /// The checkout button.
    Checkout,
}

impl ReconcileCause {
    /// The product this reconciliation was about, if any.
    #[must_use]
    pub const fn product_id(&self) -> Option<ProductId> {
        match self {
            Self::Mutation { product_id, .. } | Self::AddProduct(product_id) => Some(*product_id),
            Self::Refresh | Self::ClearAll | Self::Checkout => None,
        }
    }
}

/// Reconciler event.
#[derive(Debug, Clone)]
pub enum CartEvent {
    /// A mutation was issued. `quantity` is local arithmetic and only a hint;
    /// it is never stored as cart state.
    Provisional {
        product_id: ProductId,
        quantity: u32,
    },

    /// A fresh authoritative snapshot replaced the previous one.
    Reconciled {
        cause: ReconcileCause,
        operation_id: Uuid,
        snapshot: Arc<CartSnapshot>,
        notice: Option<Notice>,
    },

    /// The operation failed. `snapshot` is the last known-good cart, or
    /// `None` if the cart has never been loaded.
    Failed {
        cause: ReconcileCause,
        operation_id: Uuid,
        error: CartError,
        snapshot: Option<Arc<CartSnapshot>>,
        notice: Notice,
    },
}

impl CartEvent {
    /// The snapshot to render, if this event carries one.
    #[must_use]
    pub const fn snapshot(&self) -> Option<&Arc<CartSnapshot>> {
        match self {
            Self::Provisional { .. } => None,
            Self::Reconciled { snapshot, .. } => Some(snapshot),
            Self::Failed { snapshot, .. } => snapshot.as_ref(),
        }
    }

    #[must_use]
    pub const fn notice(&self) -> Option<&Notice> {
        match self {
            Self::Provisional { .. } => None,
            Self::Reconciled { notice, .. } => notice.as_ref(),
            Self::Failed { notice, .. } => Some(notice),
        }
    }
}
