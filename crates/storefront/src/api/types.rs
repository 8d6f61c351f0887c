//! Wire types for the storefront HTTP API.
//!
//! Every response body is wrapped in a `{ success, message?, ... }` envelope.
//! The envelope is checked by the client before these types are decoded, so
//! the structs below only carry the payload fields.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;
use ymgs_core::{ManualPaymentType, OrderId, OrderStatus, ProductId};

use crate::cart::{CartItemData, CartRow, RawCartValue};
use crate::catalog::{SortBy, SortOrder};

// =============================================================================
// Products
// =============================================================================

/// A catalog product. Immutable from the storefront's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Flat per-unit price.
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub price: Decimal,
    /// Smallest quantity a customer may order outside a package (always >= 1).
    #[serde(
        default = "default_min_order_quantity",
        deserialize_with = "deserialize_min_order_quantity"
    )]
    pub min_order_quantity: u32,
    /// Image URLs; the first one is the primary image.
    #[serde(default)]
    pub image: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub sub_category: String,
    #[serde(default)]
    pub bestseller: bool,
    /// Package pricing table, as JSON text or a native array.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_price_list: Option<QuantityPriceList>,
    /// Creation timestamp in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<i64>,
}

const fn default_min_order_quantity() -> u32 {
    1
}

fn deserialize_min_order_quantity<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(raw.map_or(1, |n| if n >= 1.0 { n.min(f64::from(u32::MAX)) as u32 } else { 1 }))
}

/// One row of a package pricing table: `quantity` units for a flat `price`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagePrice {
    pub quantity: u32,
    pub price: Decimal,
}

/// Package pricing as delivered by the backend.
///
/// Older products store the table as JSON text, newer ones as an array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuantityPriceList {
    Encoded(String),
    Native(serde_json::Value),
}

impl QuantityPriceList {
    /// Decode the table.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the text or array does not describe a list
    /// of `{quantity, price}` rows.
    pub fn parse(&self) -> Result<Vec<PackagePrice>, serde_json::Error> {
        match self {
            Self::Encoded(text) if text.trim().is_empty() => Ok(Vec::new()),
            Self::Encoded(text) => serde_json::from_str(text),
            Self::Native(value) => Vec::<PackagePrice>::deserialize(value),
        }
    }
}

/// Price shown on a product tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayPrice {
    Flat(Decimal),
    /// Cheapest package option.
    Package { price: Decimal, quantity: u32 },
}

impl fmt::Display for DisplayPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat(price) => write!(f, "{price}"),
            Self::Package { price, quantity } => write!(f, "{price} ({quantity} units)"),
        }
    }
}

impl Product {
    /// Decoded package options, or an empty list when the product has none.
    ///
    /// # Errors
    ///
    /// Returns the JSON error for a malformed pricing table.
    pub fn package_prices(&self) -> Result<Vec<PackagePrice>, serde_json::Error> {
        self.quantity_price_list
            .as_ref()
            .map_or_else(|| Ok(Vec::new()), QuantityPriceList::parse)
    }

    /// Cheapest package option, falling back to the flat price.
    ///
    /// A malformed pricing table is logged and treated as absent.
    #[must_use]
    pub fn display_price(&self) -> DisplayPrice {
        let packages = match self.package_prices() {
            Ok(packages) => packages,
            Err(e) => {
                warn!(product_id = %self.id, error = %e, "Malformed quantity price list");
                Vec::new()
            }
        };

        packages
            .into_iter()
            .min_by(|a, b| a.price.cmp(&b.price))
            .map_or(DisplayPrice::Flat(self.price), |p| DisplayPrice::Package {
                price: p.price,
                quantity: p.quantity,
            })
    }

    /// Primary image URL.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.image.first().map(String::as_str)
    }
}

/// Body of `POST /api/product/user/list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListRequest {
    pub page: u32,
    pub limit: u32,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub sub_category: Vec<String>,
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bestseller: Option<bool>,
}

/// Pagination metadata reported with a product page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    pub total: u64,
    pub pages: u32,
    pub current_page: u32,
    pub limit: u32,
}

/// Payload of a product list response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPage {
    #[serde(default)]
    pub products: Vec<Product>,
    pub pagination: Option<PaginationInfo>,
}

/// Payload of `GET /api/product/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductResponse {
    pub product: Product,
}

// =============================================================================
// Cart
// =============================================================================

/// Body of `POST /api/cart/add` and `POST /api/cart/update`.
///
/// A removal is sent as `{itemId, quantity: 0}`; every other change carries
/// the structured entry under `cartData`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSyncRequest {
    pub item_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cart_data: Option<CartItemData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
}

/// Payload of `POST /api/cart/get`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    #[serde(default)]
    pub cart_data: BTreeMap<ProductId, RawCartValue>,
}

// =============================================================================
// Addresses
// =============================================================================

/// A delivery or billing address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub zipcode: String,
    #[serde(default)]
    pub country: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub phone: String,
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}, {}, {}, {} {}, {}",
            self.first_name,
            self.last_name,
            self.street,
            self.city,
            self.state,
            self.zipcode,
            self.country
        )
    }
}

/// Form inputs for zip codes and phone numbers are numeric on some clients.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// Payload of the address book endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressesResponse {
    #[serde(default)]
    pub addresses: Vec<Address>,
}

/// Body of `POST /api/address/save`.
#[derive(Debug, Clone, Serialize)]
pub struct SaveAddressRequest<'a> {
    pub address: &'a Address,
}

// =============================================================================
// Orders
// =============================================================================

/// Offline payment attestation attached to manual and guest orders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualPaymentDetails {
    pub payment_type: Option<ManualPaymentType>,
    #[serde(default)]
    pub card_number: String,
    #[serde(default)]
    pub card_holder_name: String,
    #[serde(default)]
    pub expiry_date: String,
    #[serde(default)]
    pub cvv: String,
    #[serde(default)]
    pub paypal_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crypto_transaction_id: Option<String>,
}

/// Body shared by every order-placement endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<Address>,
    pub items: Vec<CartRow>,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_guest: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_payment_details: Option<ManualPaymentDetails>,
}

/// Razorpay order created server-side, handed to the payment SDK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RazorpayOrder {
    pub id: String,
    /// Amount in the smallest currency unit (paise).
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
}

/// Provider callback payload forwarded to `POST /api/order/verifyRazorpay`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RazorpayVerification {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

/// Payload of any order-placement endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResponse {
    #[serde(default)]
    pub message: Option<String>,
    /// Hosted checkout URL (Stripe).
    #[serde(default)]
    pub session_url: Option<String>,
    /// Provider order (Razorpay).
    #[serde(default)]
    pub order: Option<RazorpayOrder>,
}

/// A line of a past order, as snapshotted at submission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    #[serde(rename = "_id")]
    pub id: ProductId,
    pub name: String,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub price: Decimal,
    #[serde(default)]
    pub image: Option<String>,
    pub quantity: u32,
}

/// A past order of the authenticated customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: OrderId,
    #[serde(default)]
    pub items: Vec<OrderLine>,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub amount: Decimal,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_method: String,
    /// Whether payment has been received.
    #[serde(default)]
    pub payment: bool,
    /// Placement time in epoch milliseconds.
    #[serde(default)]
    pub date: i64,
}

/// Payload of `POST /api/order/userorders`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrdersResponse {
    #[serde(default)]
    pub orders: Vec<Order>,
}

// =============================================================================
// Settings
// =============================================================================

/// Storefront contact metadata from `GET /api/order/settings`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSettings {
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub business_hours: Option<String>,
    #[serde(default)]
    pub whatsapp_number: Option<String>,
    /// Any additional keys the backend exposes.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Payload of `GET /api/order/settings`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsResponse {
    #[serde(default)]
    pub settings: StoreSettings,
}
