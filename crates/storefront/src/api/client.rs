//! `reqwest` implementation of [`ShopApi`].

use std::sync::Arc;

use moka::future::Cache;
use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::Value;
use tracing::{debug, error, instrument, warn};
use url::Url;
use ymgs_core::{PaymentMethod, ProductId};

use super::cache::{CacheKey, CacheValue};
use super::{
    Address, AddressesResponse, ApiError, CartResponse, CartSyncRequest, Order, OrderRequest,
    OrderResponse, OrdersResponse, Product, ProductListRequest, ProductPage, ProductResponse,
    RazorpayVerification, SaveAddressRequest, SettingsResponse, ShopApi, StoreSettings,
    order_path,
};
use crate::cart::CartItem;
use crate::config::StorefrontConfig;
use crate::session::AuthToken;

const BODY_EXCERPT_CHARS: usize = 500;

// =============================================================================
// HttpShopApi
// =============================================================================

/// Client for the pharmacy backend.
///
/// Cheap to clone; all clones share one connection pool and cache.
#[derive(Clone)]
pub struct HttpShopApi {
    inner: Arc<HttpShopApiInner>,
}

struct HttpShopApiInner {
    client: reqwest::Client,
    base_url: Url,
    token_header: String,
    cache: Cache<CacheKey, CacheValue>,
}

impl std::fmt::Debug for HttpShopApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpShopApi")
            .field("base_url", &self.inner.base_url.as_str())
            .field("token_header", &self.inner.token_header)
            .finish_non_exhaustive()
    }
}

impl HttpShopApi {
    /// Create a client for the backend named in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &StorefrontConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.product_cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(HttpShopApiInner {
                client,
                base_url: with_trailing_slash(config.backend_url.clone()),
                token_header: config.token_header.clone(),
                cache,
            }),
        })
    }

    /// Base URL every endpoint path is resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Drop every cached product and the cached settings.
    pub fn invalidate_cache(&self) {
        self.inner.cache.invalidate_all();
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base_url.join(path)?)
    }

    fn product_url(&self, id: &ProductId) -> Result<Url, ApiError> {
        let mut url = self.endpoint("api/product/")?;
        url.path_segments_mut()
            .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .push(id.as_str());
        Ok(url)
    }

    fn get(&self, url: Url, token: Option<&AuthToken>) -> reqwest::RequestBuilder {
        self.authorize(self.inner.client.get(url), token)
    }

    fn post<B: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &B,
        token: Option<&AuthToken>,
    ) -> reqwest::RequestBuilder {
        self.authorize(self.inner.client.post(url).json(body), token)
    }

    fn authorize(
        &self,
        request: reqwest::RequestBuilder,
        token: Option<&AuthToken>,
    ) -> reqwest::RequestBuilder {
        match token {
            Some(token) => request.header(self.inner.token_header.as_str(), token.expose()),
            None => request,
        }
    }

    /// Send a request and decode the envelope payload.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let url = response.url().path().to_owned();

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            warn!(status = %status, endpoint = %url, "Backend refused token");
            return Err(ApiError::Unauthorized);
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(endpoint = %url, "Backend returned 404");
            return Err(ApiError::NotFound(url));
        }

        if !status.is_success() {
            error!(
                status = %status,
                endpoint = %url,
                body = %excerpt(&response_text),
                "Backend returned non-success status"
            );
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: response_text.chars().take(200).collect(),
            });
        }

        let envelope: Value = match serde_json::from_str(&response_text) {
            Ok(v) => v,
            Err(e) => {
                error!(
                    error = %e,
                    endpoint = %url,
                    body = %excerpt(&response_text),
                    "Failed to parse backend response"
                );
                return Err(ApiError::Parse(e));
            }
        };

        if envelope.get("success").and_then(Value::as_bool) == Some(false) {
            let message = envelope
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Request failed")
                .to_owned();
            debug!(endpoint = %url, message = %message, "Backend rejected request");
            return Err(ApiError::Rejected(message));
        }

        serde_json::from_value(envelope).map_err(|e| {
            error!(
                error = %e,
                endpoint = %url,
                body = %excerpt(&response_text),
                "Backend response has unexpected shape"
            );
            ApiError::Parse(e)
        })
    }
}

impl ShopApi for HttpShopApi {
    // =========================================================================
    // Products
    // =========================================================================

    #[instrument(skip(self, request), fields(page = request.page, limit = request.limit))]
    async fn list_products(&self, request: &ProductListRequest) -> Result<ProductPage, ApiError> {
        let url = self.endpoint("api/product/user/list")?;
        self.execute(self.post(url, request, None)).await
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn get_product(&self, id: &ProductId) -> Result<Product, ApiError> {
        let cache_key = CacheKey::Product(id.clone());

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let url = self.product_url(id)?;
        let response: ProductResponse = self.execute(self.get(url, None)).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(response.product.clone())))
            .await;

        Ok(response.product)
    }

    // =========================================================================
    // Cart
    // =========================================================================

    #[instrument(skip(self, token, item), fields(product_id = %id))]
    async fn sync_cart_add(
        &self,
        token: &AuthToken,
        id: &ProductId,
        item: &CartItem,
    ) -> Result<(), ApiError> {
        let body = CartSyncRequest {
            item_id: id.clone(),
            cart_data: Some((*item).into()),
            quantity: None,
        };
        let url = self.endpoint("api/cart/add")?;
        let _: IgnoredAny = self.execute(self.post(url, &body, Some(token))).await?;
        Ok(())
    }

    #[instrument(skip(self, token, item), fields(product_id = %id, remove = item.is_none()))]
    async fn sync_cart_update(
        &self,
        token: &AuthToken,
        id: &ProductId,
        item: Option<&CartItem>,
    ) -> Result<(), ApiError> {
        let body = match item {
            Some(item) => CartSyncRequest {
                item_id: id.clone(),
                cart_data: Some((*item).into()),
                quantity: None,
            },
            None => CartSyncRequest {
                item_id: id.clone(),
                cart_data: None,
                quantity: Some(0),
            },
        };
        let url = self.endpoint("api/cart/update")?;
        let _: IgnoredAny = self.execute(self.post(url, &body, Some(token))).await?;
        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn get_cart(&self, token: &AuthToken) -> Result<CartResponse, ApiError> {
        let url = self.endpoint("api/cart/get")?;
        self.execute(self.post(url, &serde_json::json!({}), Some(token)))
            .await
    }

    // =========================================================================
    // Addresses
    // =========================================================================

    #[instrument(skip(self, token))]
    async fn get_addresses(&self, token: &AuthToken) -> Result<Vec<Address>, ApiError> {
        let url = self.endpoint("api/address/get")?;
        let response: AddressesResponse = self.execute(self.get(url, Some(token))).await?;
        Ok(response.addresses)
    }

    #[instrument(skip(self, token, address))]
    async fn save_address(&self, token: &AuthToken, address: &Address) -> Result<(), ApiError> {
        let url = self.endpoint("api/address/save")?;
        let body = SaveAddressRequest { address };
        let _: IgnoredAny = self.execute(self.post(url, &body, Some(token))).await?;
        Ok(())
    }

    // =========================================================================
    // Orders
    // =========================================================================

    #[instrument(skip(self, token, order), fields(method = %method, items = order.items.len()))]
    async fn place_order(
        &self,
        token: &AuthToken,
        method: PaymentMethod,
        order: &OrderRequest,
    ) -> Result<OrderResponse, ApiError> {
        let url = self.endpoint(order_path(method))?;
        self.execute(self.post(url, order, Some(token))).await
    }

    #[instrument(skip(self, order), fields(items = order.items.len()))]
    async fn place_guest_order(&self, order: &OrderRequest) -> Result<OrderResponse, ApiError> {
        let url = self.endpoint("api/order/guest")?;
        self.execute(self.post(url, order, None)).await
    }

    #[instrument(skip(self, token, payload), fields(order_id = %payload.razorpay_order_id))]
    async fn verify_razorpay(
        &self,
        token: &AuthToken,
        payload: &RazorpayVerification,
    ) -> Result<OrderResponse, ApiError> {
        let url = self.endpoint("api/order/verifyRazorpay")?;
        self.execute(self.post(url, payload, Some(token))).await
    }

    #[instrument(skip(self, token))]
    async fn user_orders(&self, token: &AuthToken) -> Result<Vec<Order>, ApiError> {
        let url = self.endpoint("api/order/userorders")?;
        let response: OrdersResponse = self
            .execute(self.post(url, &serde_json::json!({}), Some(token)))
            .await?;
        Ok(response.orders)
    }

    // =========================================================================
    // Settings
    // =========================================================================

    #[instrument(skip(self))]
    async fn settings(&self) -> Result<StoreSettings, ApiError> {
        if let Some(CacheValue::Settings(settings)) =
            self.inner.cache.get(&CacheKey::Settings).await
        {
            debug!("Cache hit for settings");
            return Ok(*settings);
        }

        let url = self.endpoint("api/order/settings")?;
        let response: SettingsResponse = self.execute(self.get(url, None)).await?;

        self.inner
            .cache
            .insert(
                CacheKey::Settings,
                CacheValue::Settings(Box::new(response.settings.clone())),
            )
            .await;

        Ok(response.settings)
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}

/// `Url::join` replaces the last path segment unless the base ends in `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
