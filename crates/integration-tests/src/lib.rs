//! End-to-end tests for the YMGS storefront.
//!
//! [`MockBackend`] serves the shop backend's HTTP contract from an in-memory
//! store on a random local port. Tests point an `HttpShopApi` at it and drive
//! a `ShopState` exactly as a front end would.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p ymgs-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `catalog` - Product listing, filters, pagination, product lookup
//! - `cart_sync` - Login hydration, cart sync, session restore
//! - `checkout` - Order placement, rejections, account area

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;
use ymgs_storefront::api::{ApiError, HttpShopApi};
use ymgs_storefront::config::StorefrontConfig;
use ymgs_storefront::session::{MemoryTokenStore, TokenStore};
use ymgs_storefront::state::{ShopSettings, ShopState};

/// Header the backend reads the session token from.
pub const TOKEN_HEADER: &str = "token";

/// A request the backend received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub token: Option<String>,
    pub body: Value,
}

/// Everything the mock backend knows. Tests seed and inspect it directly.
#[derive(Debug, Default)]
pub struct BackendState {
    /// Product documents as the backend stores them.
    pub products: Vec<Value>,
    /// Server-side carts by token; values are whatever the client sent.
    pub carts: BTreeMap<String, Map<String, Value>>,
    pub addresses: BTreeMap<String, Vec<Value>>,
    pub orders: BTreeMap<String, Vec<Value>>,
    pub settings: Map<String, Value>,
    /// Tokens the backend accepts.
    pub tokens: HashSet<String>,
    /// When set, every order endpoint answers `success: false` with this message.
    pub reject_orders: Option<String>,
    /// Cart, address and order calls, in arrival order.
    pub requests: Vec<RecordedRequest>,
}

type Shared = Arc<Mutex<BackendState>>;

fn lock(state: &Shared) -> MutexGuard<'_, BackendState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A running mock backend. The server stops when this is dropped.
pub struct MockBackend {
    base_url: Url,
    state: Shared,
    server: JoinHandle<()>,
}

impl MockBackend {
    /// Bind to a random local port and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start() -> std::io::Result<Self> {
        let state = Shared::default();
        let app = router(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        let base_url = Url::parse(&format!("http://{addr}/"))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        Ok(Self {
            base_url,
            state,
            server,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> Url {
        self.base_url.clone()
    }

    /// Lock the backend state for seeding or inspection.
    pub fn state(&self) -> MutexGuard<'_, BackendState> {
        lock(&self.state)
    }

    /// Accept `token` as a valid session.
    pub fn issue_token(&self, token: &str) {
        self.state().tokens.insert(token.to_string());
    }

    pub fn add_product(&self, product: Value) {
        self.state().products.push(product);
    }

    /// Requests received on `path`, oldest first.
    #[must_use]
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.state()
            .requests
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }
}

impl MockBackend {
    /// Storefront configuration pointing at this backend, with no token file.
    #[must_use]
    pub fn config(&self) -> StorefrontConfig {
        StorefrontConfig {
            token_file: None,
            ..StorefrontConfig::new(self.base_url())
        }
    }

    /// A guest shop against this backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn shop(&self) -> Result<ShopState<HttpShopApi, MemoryTokenStore>, ApiError> {
        self.shop_with(&self.config(), MemoryTokenStore::new())
    }

    /// A shop with custom configuration and token storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn shop_with<S: TokenStore>(
        &self,
        config: &StorefrontConfig,
        tokens: S,
    ) -> Result<ShopState<HttpShopApi, S>, ApiError> {
        let api = HttpShopApi::new(config)?;
        Ok(ShopState::new(api, tokens, ShopSettings::from(config)))
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// A product document with the fields the storefront reads.
#[must_use]
pub fn product(id: &str, name: &str, price: f64, category: &str, sub_category: &str) -> Value {
    json!({
        "_id": id,
        "name": name,
        "description": format!("{name} description"),
        "price": price,
        "minOrderQuantity": 1,
        "image": [format!("https://cdn.example.com/{id}.jpg")],
        "category": category,
        "subCategory": sub_category,
        "bestseller": false,
        "date": 1_700_000_000_000_i64
    })
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/api/product/user/list", post(list_products))
        .route("/api/product/{id}", get(get_product))
        .route("/api/cart/add", post(cart_add))
        .route("/api/cart/update", post(cart_update))
        .route("/api/cart/get", post(cart_get))
        .route("/api/address/get", get(address_get))
        .route("/api/address/save", post(address_save))
        .route("/api/order/place", post(order_place))
        .route("/api/order/manual", post(order_manual))
        .route("/api/order/stripe", post(order_stripe))
        .route("/api/order/razorpay", post(order_razorpay))
        .route("/api/order/guest", post(order_guest))
        .route("/api/order/verifyRazorpay", post(verify_razorpay))
        .route("/api/order/userorders", post(user_orders))
        .route("/api/order/settings", get(settings))
        .with_state(state)
}

// =============================================================================
// Helpers
// =============================================================================

fn ok(mut payload: Value) -> Response {
    if let Some(object) = payload.as_object_mut() {
        object.insert("success".to_string(), Value::Bool(true));
    }
    Json(payload).into_response()
}

fn rejected(message: &str) -> Response {
    Json(json!({"success": false, "message": message})).into_response()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"success": false, "message": "Not Authorized Login Again"})),
    )
        .into_response()
}

/// The caller's token if the backend issued it.
fn authorize(state: &BackendState, headers: &HeaderMap) -> Option<String> {
    let token = headers.get(TOKEN_HEADER)?.to_str().ok()?;
    state.tokens.contains(token).then(|| token.to_string())
}

fn record(state: &mut BackendState, path: &str, headers: &HeaderMap, body: &Value) {
    state.requests.push(RecordedRequest {
        path: path.to_string(),
        token: headers
            .get(TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: body.clone(),
    });
}

fn strings(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn field<'a>(product: &'a Value, key: &str) -> &'a str {
    product.get(key).and_then(Value::as_str).unwrap_or_default()
}

// =============================================================================
// Catalog
// =============================================================================

async fn list_products(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let products = lock(&state).products.clone();

    let categories = strings(body.get("category"));
    let sub_categories = strings(body.get("subCategory"));
    let search = body
        .get("search")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_lowercase();
    let bestseller = body.get("bestseller").and_then(Value::as_bool);

    let mut matching: Vec<Value> = products
        .into_iter()
        .filter(|p| categories.is_empty() || categories.iter().any(|c| c == field(p, "category")))
        .filter(|p| {
            sub_categories.is_empty() || sub_categories.iter().any(|c| c == field(p, "subCategory"))
        })
        .filter(|p| search.is_empty() || field(p, "name").to_lowercase().contains(&search))
        .filter(|p| {
            bestseller.is_none_or(|b| p.get("bestseller").and_then(Value::as_bool) == Some(b))
        })
        .collect();

    let number = |p: &Value, key: &str| p.get(key).and_then(Value::as_f64).unwrap_or_default();
    match body.get("sortBy").and_then(Value::as_str).unwrap_or("date") {
        "price" => matching.sort_by(|a, b| number(a, "price").total_cmp(&number(b, "price"))),
        "name" => matching.sort_by(|a, b| field(a, "name").cmp(field(b, "name"))),
        _ => matching.sort_by(|a, b| number(a, "date").total_cmp(&number(b, "date"))),
    }
    if body.get("sortOrder").and_then(Value::as_str) != Some("asc") {
        matching.reverse();
    }

    let limit = body.get("limit").and_then(Value::as_u64).unwrap_or(12).max(1);
    let page = body.get("page").and_then(Value::as_u64).unwrap_or(1).max(1);
    let total = matching.len() as u64;
    let pages = total.div_ceil(limit);
    let start = usize::try_from((page - 1) * limit).unwrap_or(usize::MAX);
    let take = usize::try_from(limit).unwrap_or(usize::MAX);
    let products: Vec<Value> = matching.into_iter().skip(start).take(take).collect();

    ok(json!({
        "products": products,
        "pagination": {
            "total": total,
            "pages": pages,
            "currentPage": page,
            "limit": limit
        }
    }))
}

async fn get_product(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let state = lock(&state);
    match state.products.iter().find(|p| field(p, "_id") == id) {
        Some(product) => ok(json!({"product": product})),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "message": "Product not found"})),
        )
            .into_response(),
    }
}

// =============================================================================
// Cart
// =============================================================================

async fn cart_add(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    record(&mut state, "/api/cart/add", &headers, &body);
    let Some(token) = authorize(&state, &headers) else {
        return unauthorized();
    };
    let Some(item_id) = body.get("itemId").and_then(Value::as_str) else {
        return rejected("itemId is required");
    };
    let entry = body.get("cartData").cloned().unwrap_or(Value::from(1));
    state
        .carts
        .entry(token)
        .or_default()
        .insert(item_id.to_string(), entry);
    ok(json!({"message": "Added To Cart"}))
}

async fn cart_update(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    record(&mut state, "/api/cart/update", &headers, &body);
    let Some(token) = authorize(&state, &headers) else {
        return unauthorized();
    };
    let Some(item_id) = body.get("itemId").and_then(Value::as_str).map(str::to_string) else {
        return rejected("itemId is required");
    };
    let cart = state.carts.entry(token).or_default();
    match body.get("cartData") {
        Some(entry) => {
            cart.insert(item_id, entry.clone());
        }
        None => {
            cart.remove(&item_id);
        }
    }
    ok(json!({"message": "Cart Updated"}))
}

async fn cart_get(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = lock(&state);
    let Some(token) = authorize(&state, &headers) else {
        return unauthorized();
    };
    let cart = state.carts.get(&token).cloned().unwrap_or_default();
    ok(json!({"cartData": cart}))
}

// =============================================================================
// Addresses
// =============================================================================

async fn address_get(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = lock(&state);
    let Some(token) = authorize(&state, &headers) else {
        return unauthorized();
    };
    let addresses = state.addresses.get(&token).cloned().unwrap_or_default();
    ok(json!({"addresses": addresses}))
}

async fn address_save(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    record(&mut state, "/api/address/save", &headers, &body);
    let Some(token) = authorize(&state, &headers) else {
        return unauthorized();
    };
    let Some(address) = body.get("address").cloned() else {
        return rejected("address is required");
    };
    state.addresses.entry(token).or_default().push(address);
    ok(json!({"message": "Address saved"}))
}

// =============================================================================
// Orders
// =============================================================================

/// Record an authenticated order, store it for the order history and clear
/// the server cart.
fn accept_order(
    state: &mut BackendState,
    path: &str,
    headers: &HeaderMap,
    body: &Value,
) -> Result<(), Response> {
    record(state, path, headers, body);
    let token = authorize(state, headers).ok_or_else(unauthorized)?;
    if let Some(message) = &state.reject_orders {
        return Err(rejected(message));
    }
    let count = state.orders.values().map(Vec::len).sum::<usize>();
    let method = match path {
        "/api/order/manual" => "Manual",
        "/api/order/stripe" => "Stripe",
        "/api/order/razorpay" => "Razorpay",
        _ => "COD",
    };
    let order = json!({
        "_id": format!("order-{}", count + 1),
        "items": body.get("items").cloned().unwrap_or_default(),
        "amount": body.get("amount").cloned().unwrap_or_default(),
        "status": "Order Placed",
        "paymentMethod": method,
        "payment": false,
        "date": 1_710_000_000_000_i64 + i64::try_from(count).unwrap_or_default()
    });
    state.orders.entry(token.clone()).or_default().push(order);
    state.carts.remove(&token);
    Ok(())
}

async fn order_place(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    match accept_order(&mut lock(&state), "/api/order/place", &headers, &body) {
        Ok(()) => ok(json!({"message": "Order Placed"})),
        Err(response) => response,
    }
}

async fn order_manual(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    match accept_order(&mut lock(&state), "/api/order/manual", &headers, &body) {
        Ok(()) => ok(json!({"message": "Order Placed"})),
        Err(response) => response,
    }
}

async fn order_stripe(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    match accept_order(&mut lock(&state), "/api/order/stripe", &headers, &body) {
        Ok(()) => ok(json!({"session_url": "https://checkout.stripe.com/pay/cs_test_1"})),
        Err(response) => response,
    }
}

async fn order_razorpay(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    match accept_order(&mut lock(&state), "/api/order/razorpay", &headers, &body) {
        Ok(()) => ok(json!({
            "order": {"id": "order_rzp_1", "amount": 7500, "currency": "INR", "receipt": "r1"}
        })),
        Err(response) => response,
    }
}

async fn order_guest(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    record(&mut state, "/api/order/guest", &headers, &body);
    if let Some(message) = &state.reject_orders {
        return rejected(message);
    }
    ok(json!({"message": "Order Placed"}))
}

async fn verify_razorpay(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    record(&mut state, "/api/order/verifyRazorpay", &headers, &body);
    if authorize(&state, &headers).is_none() {
        return unauthorized();
    }
    if body.get("razorpay_signature").and_then(Value::as_str) == Some("valid") {
        ok(json!({"message": "Payment Successful"}))
    } else {
        rejected("Payment Failed")
    }
}

async fn user_orders(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = lock(&state);
    let Some(token) = authorize(&state, &headers) else {
        return unauthorized();
    };
    let orders = state.orders.get(&token).cloned().unwrap_or_default();
    ok(json!({"orders": orders}))
}

async fn settings(State(state): State<Shared>) -> Response {
    let settings = lock(&state).settings.clone();
    ok(json!({"settings": settings}))
}
