//! Integration tests for Cartwright.
//!
//! Tests run the storefront cart subsystem against [`FakeCartService`], an
//! in-process HTTP server that speaks the cart service's REST API.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartwright-integration-tests
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use cartwright_storefront::CartConfig;
use cartwright_storefront::cart::CartLineRequest;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use url::Url;

/// A request received by the fake service.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
    pub authorization: Option<String>,
}

#[derive(Debug, Clone)]
struct StoredLine {
    product_id: i32,
    quantity: u32,
}

#[derive(Debug, Clone)]
struct Product {
    name: String,
    price: i64,
}

#[derive(Debug, Default)]
struct ServiceData {
    catalog: HashMap<i32, Product>,
    carts: HashMap<i32, Vec<StoredLine>>,
    requests: Vec<RecordedRequest>,
    mutation_failure: Option<u16>,
    fetch_failure: Option<u16>,
    fetch_body: Option<String>,
    mutation_delay: Duration,
}

impl ServiceData {
    fn record(
        &mut self,
        method: &'static str,
        path: String,
        body: Option<Value>,
        headers: &HeaderMap,
    ) {
        self.requests.push(RecordedRequest {
            method,
            path,
            body,
            authorization: headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        });
    }

    fn cart(&mut self, user_id: i32) -> &mut Vec<StoredLine> {
        self.carts.entry(user_id).or_default()
    }
}

#[derive(Clone, Default)]
struct ServiceState {
    data: Arc<Mutex<ServiceData>>,
}

impl ServiceState {
    fn lock(&self) -> MutexGuard<'_, ServiceData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-process cart service bound to `127.0.0.1` on a random port.
///
/// The server shuts down when the handle is dropped.
pub struct FakeCartService {
    base_url: String,
    state: ServiceState,
    shutdown: Option<oneshot::Sender<()>>,
}

impl FakeCartService {
    /// Start the service.
    ///
    /// # Errors
    ///
    /// Returns error if the listener cannot bind.
    pub async fn spawn() -> std::io::Result<Self> {
        let state = ServiceState::default();

        let app = Router::new()
            .route("/cart/{user_id}", get(fetch_cart))
            .route("/cart/{user_id}/add", post(add_item))
            .route("/cart/{user_id}/update", put(update_item))
            .route("/cart/{user_id}/remove/{product_id}", delete(remove_item))
            .route("/cart/{user_id}/clear", delete(clear_cart))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = server.await;
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            state,
            shutdown: Some(shutdown_tx),
        })
    }

    /// Client configuration pointing at this service.
    ///
    /// # Panics
    ///
    /// Panics if the bound address does not form a valid URL.
    #[must_use]
    pub fn config(&self) -> CartConfig {
        let url = Url::parse(&format!("{}/cart", self.base_url)).expect("valid service URL");
        CartConfig::new(url)
    }

    /// Register a catalog product.
    pub fn add_product(&self, product_id: i32, name: &str, price: i64) {
        self.state.lock().catalog.insert(
            product_id,
            Product {
                name: name.to_string(),
                price,
            },
        );
    }

    /// Put a line straight into a user's cart.
    pub fn seed_line(&self, user_id: i32, product_id: i32, quantity: u32) {
        self.state.lock().cart(user_id).push(StoredLine {
            product_id,
            quantity,
        });
    }

    /// Answer every mutating call with `status` (`None` restores success).
    pub fn fail_mutations(&self, status: Option<u16>) {
        self.state.lock().mutation_failure = status;
    }

    /// Answer every fetch with `status` (`None` restores success).
    pub fn fail_fetches(&self, status: Option<u16>) {
        self.state.lock().fetch_failure = status;
    }

    /// Serve `body` verbatim for every fetch.
    pub fn set_fetch_body(&self, body: Option<&str>) {
        self.state.lock().fetch_body = body.map(str::to_string);
    }

    /// Delay every mutating call by `delay`.
    pub fn set_mutation_delay(&self, delay: Duration) {
        self.state.lock().mutation_delay = delay;
    }

    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// Every recorded request except fetches.
    #[must_use]
    pub fn mutation_requests(&self) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method != "GET")
            .collect()
    }

    /// Quantity the server holds for a product, `0` if absent.
    #[must_use]
    pub fn quantity_of(&self, user_id: i32, product_id: i32) -> u32 {
        self.state
            .lock()
            .carts
            .get(&user_id)
            .and_then(|lines| lines.iter().find(|l| l.product_id == product_id))
            .map_or(0, |l| l.quantity)
    }
}

impl Drop for FakeCartService {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

fn status_response(status: u16) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, "<html>cart service error</html>").into_response()
}

async fn fetch_cart(
    State(state): State<ServiceState>,
    Path(user_id): Path<i32>,
    headers: HeaderMap,
) -> Response {
    let mut data = state.lock();
    data.record("GET", format!("/cart/{user_id}"), None, &headers);

    if let Some(status) = data.fetch_failure {
        return status_response(status);
    }
    if let Some(body) = data.fetch_body.clone() {
        return (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response();
    }

    let items: Vec<Value> = data
        .carts
        .get(&user_id)
        .map(|lines| {
            lines
                .iter()
                .map(|line| {
                    let product = data.catalog.get(&line.product_id);
                    json!({
                        "productId": line.product_id,
                        "productName": product.map(|p| p.name.clone()),
                        "unitPrice": product.map_or(0, |p| p.price),
                        "quantity": line.quantity,
                        "imageUrl": format!("https://cdn.example.com/{}.jpg", line.product_id),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Json(json!({ "items": items })).into_response()
}

/// Record a mutating call, wait the configured delay and report whether it
/// should fail.
async fn begin_mutation(
    state: &ServiceState,
    method: &'static str,
    path: String,
    body: Option<Value>,
    headers: &HeaderMap,
) -> Option<Response> {
    let delay = {
        let mut data = state.lock();
        data.record(method, path, body, headers);
        data.mutation_delay
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    state.lock().mutation_failure.map(status_response)
}

async fn add_item(
    State(state): State<ServiceState>,
    Path(user_id): Path<i32>,
    headers: HeaderMap,
    Json(request): Json<CartLineRequest>,
) -> Response {
    let body = serde_json::to_value(request).ok();
    let path = format!("/cart/{user_id}/add");
    if let Some(failure) = begin_mutation(&state, "POST", path, body, &headers).await {
        return failure;
    }

    let product_id = request.product_id.as_i32();
    let mut data = state.lock();
    let cart = data.cart(user_id);
    if let Some(line) = cart.iter_mut().find(|l| l.product_id == product_id) {
        line.quantity += request.quantity;
    } else {
        cart.push(StoredLine {
            product_id,
            quantity: request.quantity,
        });
    }
    StatusCode::CREATED.into_response()
}

async fn update_item(
    State(state): State<ServiceState>,
    Path(user_id): Path<i32>,
    headers: HeaderMap,
    Json(request): Json<CartLineRequest>,
) -> Response {
    let body = serde_json::to_value(request).ok();
    let path = format!("/cart/{user_id}/update");
    if let Some(failure) = begin_mutation(&state, "PUT", path, body, &headers).await {
        return failure;
    }

    let product_id = request.product_id.as_i32();
    let mut data = state.lock();
    let cart = data.cart(user_id);
    if request.quantity == 0 {
        cart.retain(|l| l.product_id != product_id);
        return StatusCode::NO_CONTENT.into_response();
    }
    match cart.iter_mut().find(|l| l.product_id == product_id) {
        Some(line) => {
            line.quantity = request.quantity;
            StatusCode::NO_CONTENT.into_response()
        }
        None => status_response(404),
    }
}

async fn remove_item(
    State(state): State<ServiceState>,
    Path((user_id, product_id)): Path<(i32, i32)>,
    headers: HeaderMap,
) -> Response {
    let path = format!("/cart/{user_id}/remove/{product_id}");
    if let Some(failure) = begin_mutation(&state, "DELETE", path, None, &headers).await {
        return failure;
    }

    state
        .lock()
        .cart(user_id)
        .retain(|l| l.product_id != product_id);
    StatusCode::NO_CONTENT.into_response()
}

async fn clear_cart(
    State(state): State<ServiceState>,
    Path(user_id): Path<i32>,
    headers: HeaderMap,
) -> Response {
    let path = format!("/cart/{user_id}/clear");
    if let Some(failure) = begin_mutation(&state, "DELETE", path, None, &headers).await {
        return failure;
    }

    state.lock().cart(user_id).clear();
    StatusCode::NO_CONTENT.into_response()
}
