//! Cart error taxonomy with Sentry integration.
//!
//! Every failure of the cart service is caught at the reconciler boundary and
//! converted into a single shopper-facing notice. Nothing here is fatal: the
//! page always keeps its last known-good cart.

use std::fmt;

use thiserror::Error;

use crate::cart::LockBusyError;

/// Notice shown to the shopper for any failed cart action.
pub const ACTION_FAILED: &str = "Action failed, try again";

/// Maximum number of response body characters kept in errors and logs.
const BODY_PREVIEW_CHARS: usize = 200;

/// Transport-level failure talking to the cart service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Request could not be sent or the response could not be read
    /// (connection refused, timeout, reset).
    #[error("Request failed: {0}")]
    Request(String),

    /// The service answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not match the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl TransportError {
    /// Build a status error, keeping only a short preview of the body.
    #[must_use]
    pub fn status(status: u16, body: &str) -> Self {
        Self::Status {
            status,
            body: body.chars().take(BODY_PREVIEW_CHARS).collect(),
        }
    }
}

/// The mutating operations of the cart service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Add,
    SetQuantity,
    Remove,
    Clear,
}

impl MutationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::SetQuantity => "update",
            Self::Remove => "remove",
            Self::Clear => "clear",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the cart subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// The snapshot could not be retrieved; the cart is unknown, not empty.
    #[error("Cart fetch failed: {0}")]
    Fetch(#[source] TransportError),

    /// An add/update/remove/clear call failed; no snapshot change.
    #[error("Cart {operation} failed: {source}")]
    Mutation {
        operation: MutationKind,
        #[source]
        source: TransportError,
    },

    /// A mutation for the same product is still in flight.
    #[error(transparent)]
    LockBusy(#[from] LockBusyError),
}

impl CartError {
    /// Shorthand for a failed mutating call.
    #[must_use]
    pub const fn mutation(operation: MutationKind, source: TransportError) -> Self {
        Self::Mutation { operation, source }
    }

    /// Message to show the shopper, or `None` when the error stays silent.
    ///
    /// A busy lock only means an earlier click is still being processed.
    #[must_use]
    pub const fn user_message(&self) -> Option<&'static str> {
        match self {
            Self::Fetch(_) | Self::Mutation { .. } => Some(ACTION_FAILED),
            Self::LockBusy(_) => None,
        }
    }
}

/// Report a cart failure to tracing and Sentry.
///
/// Busy locks are expected during rapid clicking and are only logged at
/// debug level.
pub fn report_error(err: &CartError) {
    if err.user_message().is_none() {
        tracing::debug!(error = %err, "Cart action dropped");
        return;
    }

    let event_id = sentry::capture_error(err);
    tracing::error!(
        error = %err,
        sentry_event_id = %event_id,
        "Cart action failed"
    );
}

/// Set the Sentry user context to the cart owner.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for a shopper's cart action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
