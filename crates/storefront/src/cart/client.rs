//! Remote cart service client.
//!
//! Stateless request wrapper over the cart service's REST API:
//!
//! | Operation      | Method | Path                                  |
//! |----------------|--------|---------------------------------------|
//! | `fetch`        | GET    | `/cart/{userId}`                      |
//! | `add`          | POST   | `/cart/{userId}/add`                  |
//! | `set_quantity` | PUT    | `/cart/{userId}/update`               |
//! | `remove`       | DELETE | `/cart/{userId}/remove/{productId}`   |
//! | `clear`        | DELETE | `/cart/{userId}/clear`                |
//!
//! Any non-2xx status is a failure; the body of a failed response is not
//! required to parse. Nothing retries automatically.

use std::sync::Arc;

use async_trait::async_trait;
use cartwright_core::{CartSnapshot, ProductId, UserId};
use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument, warn};

use super::wire::{CartLineRequest, CartPayload};
use crate::config::CartConfig;
use crate::error::{CartError, MutationKind, TransportError};

/// Operations of the remote cart service.
///
/// `add` is not idempotent on the server. Callers must hold the product's
/// [`MutationLock`](super::MutationLock) while issuing it.
#[async_trait]
pub trait CartApi: Send + Sync {
    /// Retrieve the current cart.
    ///
    /// On failure the cart is unknown, which is different from empty.
    async fn fetch(&self, user_id: UserId) -> Result<CartSnapshot, CartError>;

    /// Add `quantity` units of a product.
    async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), CartError>;

    /// Set a product's quantity. `0` means remove.
    async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), CartError>;

    /// Remove a product's line.
    async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<(), CartError>;

    /// Remove every line.
    async fn clear(&self, user_id: UserId) -> Result<(), CartError>;
}

/// HTTP implementation of [`CartApi`].
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct HttpCartClient {
    inner: Arc<HttpCartClientInner>,
}

struct HttpCartClientInner {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<SecretString>,
}

impl std::fmt::Debug for HttpCartClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCartClient")
            .field("base_url", &self.inner.base_url)
            .field("api_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl HttpCartClient {
    /// Create a new cart client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &CartConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(HttpCartClientInner {
                client,
                base_url: config.base_url(),
                api_token: config.api_token.clone(),
            }),
        })
    }

    fn url(&self, user_id: UserId, suffix: &str) -> String {
        format!("{}/{user_id}{suffix}", self.inner.base_url)
    }

    /// Send a request and reject non-success statuses.
    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, TransportError> {
        let request = match &self.inner.api_token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Cart service returned non-success status"
            );
            return Err(TransportError::status(status.as_u16(), &body));
        }

        Ok(response)
    }

    async fn mutate(
        &self,
        operation: MutationKind,
        request: RequestBuilder,
    ) -> Result<(), CartError> {
        self.send(request)
            .await
            .map_err(|source| CartError::mutation(operation, source))?;
        debug!(operation = %operation, "Cart mutation acknowledged");
        Ok(())
    }
}

#[async_trait]
impl CartApi for HttpCartClient {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn fetch(&self, user_id: UserId) -> Result<CartSnapshot, CartError> {
        let request = self.inner.client.get(self.url(user_id, ""));
        let response = self.send(request).await.map_err(CartError::Fetch)?;

        let body = response
            .text()
            .await
            .map_err(|e| CartError::Fetch(TransportError::Request(e.to_string())))?;

        let payload: CartPayload = serde_json::from_str(&body).map_err(|e| {
            warn!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse cart response"
            );
            CartError::Fetch(TransportError::Decode(e.to_string()))
        })?;

        let snapshot = payload
            .into_snapshot(user_id)
            .map_err(|e| CartError::Fetch(TransportError::Decode(e.to_string())))?;

        debug!(lines = snapshot.len(), "Fetched cart snapshot");
        Ok(snapshot)
    }

    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), CartError> {
        let request = self
            .inner
            .client
            .post(self.url(user_id, "/add"))
            .json(&CartLineRequest {
                product_id,
                quantity,
            });
        self.mutate(MutationKind::Add, request).await
    }

    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), CartError> {
        let request = self
            .inner
            .client
            .put(self.url(user_id, "/update"))
            .json(&CartLineRequest {
                product_id,
                quantity,
            });
        self.mutate(MutationKind::SetQuantity, request).await
    }

    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<(), CartError> {
        let request = self
            .inner
            .client
            .delete(self.url(user_id, &format!("/remove/{product_id}")));
        self.mutate(MutationKind::Remove, request).await
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn clear(&self, user_id: UserId) -> Result<(), CartError> {
        let request = self.inner.client.delete(self.url(user_id, "/clear"));
        self.mutate(MutationKind::Clear, request).await
    }
}
