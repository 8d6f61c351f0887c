//! HTTP API contract of the pharmacy backend.
//!
//! # Architecture
//!
//! - [`ShopApi`] has one async method per backend endpoint; the store is
//!   generic over it so tests can inject an in-memory fake
//! - [`HttpShopApi`] is the production implementation on `reqwest`
//! - Every response is a `{ success, message?, ... }` envelope; a
//!   `success: false` body is reported as [`ApiError::Rejected`]
//! - Single-product lookups and settings are cached with `moka`
//!
//! # Example
//!
//! ```rust,ignore
//! use ymgs_storefront::api::{HttpShopApi, ShopApi};
//!
//! let api = HttpShopApi::new(&config)?;
//! let page = api.list_products(&catalog.request_for(1)).await?;
//! ```

mod cache;
mod client;
mod types;

pub use client::HttpShopApi;
pub use types::*;

use std::future::Future;

use thiserror::Error;
use ymgs_core::{PaymentMethod, ProductId};

use crate::cart::CartItem;
use crate::session::AuthToken;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the expected JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The backend answered `success: false`.
    #[error("{0}")]
    Rejected(String),

    /// The token is missing, expired or was refused.
    #[error("Not authorized, please log in again")]
    Unauthorized,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl ApiError {
    /// Whether this error points at the backend or the network rather than
    /// at the request the customer made.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        match self {
            Self::Http(_) | Self::Parse(_) | Self::Url(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Rejected(_) | Self::Unauthorized | Self::NotFound(_) => false,
        }
    }
}

/// The backend's HTTP endpoints.
///
/// Methods that act on the customer's account take the bearer token
/// explicitly; the implementation forwards it under the configured header.
pub trait ShopApi: Send + Sync + 'static {
    /// `POST /api/product/user/list`
    fn list_products(
        &self,
        request: &ProductListRequest,
    ) -> impl Future<Output = Result<ProductPage, ApiError>> + Send;

    /// `GET /api/product/{id}`
    fn get_product(&self, id: &ProductId)
    -> impl Future<Output = Result<Product, ApiError>> + Send;

    /// `POST /api/cart/add`
    fn sync_cart_add(
        &self,
        token: &AuthToken,
        id: &ProductId,
        item: &CartItem,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// `POST /api/cart/update`; `None` removes the entry.
    fn sync_cart_update(
        &self,
        token: &AuthToken,
        id: &ProductId,
        item: Option<&CartItem>,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// `POST /api/cart/get`
    fn get_cart(
        &self,
        token: &AuthToken,
    ) -> impl Future<Output = Result<CartResponse, ApiError>> + Send;

    /// `GET /api/address/get`
    fn get_addresses(
        &self,
        token: &AuthToken,
    ) -> impl Future<Output = Result<Vec<Address>, ApiError>> + Send;

    /// `POST /api/address/save`
    fn save_address(
        &self,
        token: &AuthToken,
        address: &Address,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// `POST /api/order/{place,manual,stripe,razorpay}` depending on `method`.
    fn place_order(
        &self,
        token: &AuthToken,
        method: PaymentMethod,
        order: &OrderRequest,
    ) -> impl Future<Output = Result<OrderResponse, ApiError>> + Send;

    /// `POST /api/order/guest`, sent without a token.
    fn place_guest_order(
        &self,
        order: &OrderRequest,
    ) -> impl Future<Output = Result<OrderResponse, ApiError>> + Send;

    /// `POST /api/order/verifyRazorpay`
    fn verify_razorpay(
        &self,
        token: &AuthToken,
        payload: &RazorpayVerification,
    ) -> impl Future<Output = Result<OrderResponse, ApiError>> + Send;

    /// `POST /api/order/userorders`
    fn user_orders(
        &self,
        token: &AuthToken,
    ) -> impl Future<Output = Result<Vec<Order>, ApiError>> + Send;

    /// `GET /api/order/settings`
    fn settings(&self) -> impl Future<Output = Result<StoreSettings, ApiError>> + Send;
}

/// Endpoint path for a registered order placed with `method`.
#[must_use]
pub const fn order_path(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cod => "api/order/place",
        PaymentMethod::Manual => "api/order/manual",
        PaymentMethod::Stripe => "api/order/stripe",
        PaymentMethod::Razorpay => "api/order/razorpay",
    }
}
