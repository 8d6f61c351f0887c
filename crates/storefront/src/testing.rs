//! In-memory [`ShopApi`] for unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::json;
use ymgs_core::{PaymentMethod, ProductId};

use crate::api::{
    Address, ApiError, CartResponse, Order, OrderRequest, OrderResponse, PaginationInfo, Product,
    ProductListRequest, ProductPage, RazorpayVerification, ShopApi, StoreSettings,
};
use crate::cart::{CartItem, RawCartValue};
use crate::catalog::{SortBy, SortOrder};
use crate::session::AuthToken;

/// A recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListProducts(ProductListRequest),
    GetProduct(ProductId),
    CartAdd { id: ProductId, item: CartItem },
    CartUpdate { id: ProductId, item: Option<CartItem> },
    GetCart,
    GetAddresses,
    SaveAddress(Address),
    PlaceOrder { method: PaymentMethod, order: OrderRequest },
    PlaceGuestOrder(OrderRequest),
    VerifyRazorpay(RazorpayVerification),
    UserOrders,
    Settings,
}

/// Mutable backend state behind [`FakeShopApi`].
#[derive(Debug, Default)]
pub struct FakeBackend {
    pub products: Vec<Product>,
    pub cart: BTreeMap<ProductId, RawCartValue>,
    pub addresses: Vec<Address>,
    pub orders: Vec<Order>,
    pub settings: StoreSettings,
    pub order_response: OrderResponse,
    pub calls: Vec<Call>,
    /// Every call fails with HTTP 500.
    pub fail_all: bool,
    /// Cart add/update calls fail with HTTP 500.
    pub fail_cart_sync: bool,
    /// Catalog list calls fail with HTTP 500.
    pub fail_catalog: bool,
    /// Order placement answers `success: false` with this message.
    pub reject_orders: Option<String>,
    /// Artificial latency for list calls, keyed by search term.
    pub list_delay: HashMap<String, Duration>,
}

#[derive(Debug, Default)]
pub struct FakeShopApi {
    backend: Mutex<FakeBackend>,
}

impl FakeShopApi {
    pub fn with_products(products: Vec<Product>) -> Self {
        Self {
            backend: Mutex::new(FakeBackend {
                products,
                ..FakeBackend::default()
            }),
        }
    }

    pub fn backend(&self) -> MutexGuard<'_, FakeBackend> {
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.backend().calls.clone()
    }

    fn record(&self, call: Call) -> Result<(), ApiError> {
        let mut backend = self.backend();
        backend.calls.push(call);
        if backend.fail_all {
            Err(server_error())
        } else {
            Ok(())
        }
    }
}

fn server_error() -> ApiError {
    ApiError::Status {
        status: 500,
        body: "Internal Server Error".to_string(),
    }
}

/// Build a product from its interesting fields.
pub fn product(id: &str, price: i64, min_order_quantity: u32) -> Product {
    serde_json::from_value(json!({
        "_id": id,
        "name": format!("Product {id}"),
        "price": price,
        "minOrderQuantity": min_order_quantity,
        "image": [format!("https://cdn.test/{id}.png")],
        "category": "OTC",
        "subCategory": "Pain",
    }))
    .unwrap()
}

/// Build a product in a given category.
pub fn product_in(id: &str, price: i64, category: &str) -> Product {
    let mut product = product(id, price, 1);
    category.clone_into(&mut product.category);
    product
}

fn matches(request: &ProductListRequest, product: &Product) -> bool {
    (request.category.is_empty() || request.category.contains(&product.category))
        && (request.sub_category.is_empty() || request.sub_category.contains(&product.sub_category))
        && (request.search.is_empty()
            || product
                .name
                .to_lowercase()
                .contains(&request.search.to_lowercase()))
        && (request.bestseller != Some(true) || product.bestseller)
}

impl ShopApi for FakeShopApi {
    async fn list_products(&self, request: &ProductListRequest) -> Result<ProductPage, ApiError> {
        let (result, delay) = {
            let mut backend = self.backend();
            backend.calls.push(Call::ListProducts(request.clone()));
            let delay = backend.list_delay.get(&request.search).copied();
            if backend.fail_all || backend.fail_catalog {
                (Err(server_error()), delay)
            } else {
                let mut matching: Vec<Product> = backend
                    .products
                    .iter()
                    .filter(|p| matches(request, p))
                    .cloned()
                    .collect();
                match request.sort_by {
                    SortBy::Date => matching.sort_by_key(|p| p.date),
                    SortBy::Price => matching.sort_by_key(|p| p.price),
                    SortBy::Name => matching.sort_by(|a, b| a.name.cmp(&b.name)),
                }
                if request.sort_order == SortOrder::Desc {
                    matching.reverse();
                }
                let total = matching.len() as u64;
                let limit = request.limit.max(1);
                let pages = u32::try_from(total.div_ceil(u64::from(limit))).unwrap();
                let skip = (request.page.saturating_sub(1) * limit) as usize;
                let products = matching.into_iter().skip(skip).take(limit as usize).collect();
                (
                    Ok(ProductPage {
                        products,
                        pagination: Some(PaginationInfo {
                            total,
                            pages,
                            current_page: request.page,
                            limit,
                        }),
                    }),
                    delay,
                )
            }
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn get_product(&self, id: &ProductId) -> Result<Product, ApiError> {
        self.record(Call::GetProduct(id.clone()))?;
        self.backend()
            .products
            .iter()
            .find(|p| &p.id == id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(id.to_string()))
    }

    async fn sync_cart_add(
        &self,
        _token: &AuthToken,
        id: &ProductId,
        item: &CartItem,
    ) -> Result<(), ApiError> {
        self.record(Call::CartAdd {
            id: id.clone(),
            item: *item,
        })?;
        if self.backend().fail_cart_sync {
            return Err(server_error());
        }
        Ok(())
    }

    async fn sync_cart_update(
        &self,
        _token: &AuthToken,
        id: &ProductId,
        item: Option<&CartItem>,
    ) -> Result<(), ApiError> {
        self.record(Call::CartUpdate {
            id: id.clone(),
            item: item.copied(),
        })?;
        if self.backend().fail_cart_sync {
            return Err(server_error());
        }
        Ok(())
    }

    async fn get_cart(&self, _token: &AuthToken) -> Result<CartResponse, ApiError> {
        self.record(Call::GetCart)?;
        Ok(CartResponse {
            cart_data: self.backend().cart.clone(),
        })
    }

    async fn get_addresses(&self, _token: &AuthToken) -> Result<Vec<Address>, ApiError> {
        self.record(Call::GetAddresses)?;
        Ok(self.backend().addresses.clone())
    }

    async fn save_address(&self, _token: &AuthToken, address: &Address) -> Result<(), ApiError> {
        self.record(Call::SaveAddress(address.clone()))?;
        self.backend().addresses.push(address.clone());
        Ok(())
    }

    async fn place_order(
        &self,
        _token: &AuthToken,
        method: PaymentMethod,
        order: &OrderRequest,
    ) -> Result<OrderResponse, ApiError> {
        self.record(Call::PlaceOrder {
            method,
            order: order.clone(),
        })?;
        let backend = self.backend();
        match &backend.reject_orders {
            Some(message) => Err(ApiError::Rejected(message.clone())),
            None => Ok(backend.order_response.clone()),
        }
    }

    async fn place_guest_order(&self, order: &OrderRequest) -> Result<OrderResponse, ApiError> {
        self.record(Call::PlaceGuestOrder(order.clone()))?;
        let backend = self.backend();
        match &backend.reject_orders {
            Some(message) => Err(ApiError::Rejected(message.clone())),
            None => Ok(backend.order_response.clone()),
        }
    }

    async fn verify_razorpay(
        &self,
        _token: &AuthToken,
        payload: &RazorpayVerification,
    ) -> Result<OrderResponse, ApiError> {
        self.record(Call::VerifyRazorpay(payload.clone()))?;
        Ok(OrderResponse::default())
    }

    async fn user_orders(&self, _token: &AuthToken) -> Result<Vec<Order>, ApiError> {
        self.record(Call::UserOrders)?;
        Ok(self.backend().orders.clone())
    }

    async fn settings(&self) -> Result<StoreSettings, ApiError> {
        self.record(Call::Settings)?;
        Ok(self.backend().settings.clone())
    }
}
