//! Cart normalization and pricing.
//!
//! Cart entries reach the storefront in two shapes: the legacy bare quantity
//! (`{"p1": 3}`) and the structured record
//! (`{"p1": {"quantity": 30, "selectedPrice": 45, "isPackage": true}}`).
//! Both are funnelled through [`CartEntryInput::normalize`] or
//! [`RawCartValue::normalize`] before they touch a [`Cart`], so every stored
//! [`CartItem`] has a positive quantity and every package carries its price.
//!
//! Pricing rules:
//! - a package line costs its selected price once, whatever the quantity
//! - a unit line costs the product's live price times the quantity
//! - the cart amount is the sum of line totals rounded to two places

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;
use ymgs_core::{ProductId, round_money};

use crate::api::Product;

/// Products known to the store, keyed by id.
pub type ProductIndex = BTreeMap<ProductId, Product>;

// =============================================================================
// Cart items
// =============================================================================

/// How a cart line is priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinePricing {
    /// Per-unit pricing from the live product price. A price picked in the UI
    /// is kept for the server but never used for totals.
    Unit { selected_price: Option<Decimal> },
    /// A bundle sold for a flat price.
    Package { price: Decimal },
}

/// A normalized cart entry. Quantity is always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "CartItemData", try_from = "CartItemData")]
pub struct CartItem {
    quantity: u32,
    pricing: LinePricing,
}

impl CartItem {
    /// A per-unit line. Returns `None` for a zero quantity.
    #[must_use]
    pub const fn unit(quantity: u32) -> Option<Self> {
        if quantity == 0 {
            return None;
        }
        Some(Self {
            quantity,
            pricing: LinePricing::Unit {
                selected_price: None,
            },
        })
    }

    /// A package line. Returns `None` for a zero quantity.
    #[must_use]
    pub const fn package(quantity: u32, price: Decimal) -> Option<Self> {
        if quantity == 0 {
            return None;
        }
        Some(Self {
            quantity,
            pricing: LinePricing::Package { price },
        })
    }

    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    #[must_use]
    pub const fn pricing(&self) -> LinePricing {
        self.pricing
    }

    #[must_use]
    pub const fn is_package(&self) -> bool {
        matches!(self.pricing, LinePricing::Package { .. })
    }

    /// The price chosen when the line was added, if any.
    #[must_use]
    pub const fn selected_price(&self) -> Option<Decimal> {
        match self.pricing {
            LinePricing::Unit { selected_price } => selected_price,
            LinePricing::Package { price } => Some(price),
        }
    }

    /// Line total. Unit lines need the product for its live price and are
    /// worth nothing while the product is unknown.
    #[must_use]
    pub fn total(&self, product: Option<&Product>) -> Decimal {
        match self.pricing {
            LinePricing::Package { price } => price,
            LinePricing::Unit { .. } => {
                product.map_or(Decimal::ZERO, |p| p.price * Decimal::from(self.quantity))
            }
        }
    }

    #[must_use]
    const fn with_quantity(self, quantity: u32) -> Self {
        Self { quantity, ..self }
    }
}

/// Wire form of a cart entry (`cartData` values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemData {
    pub quantity: i64,
    #[serde(
        default,
        serialize_with = "rust_decimal::serde::float_option::serialize"
    )]
    pub selected_price: Option<Decimal>,
    #[serde(default)]
    pub is_package: bool,
}

impl From<CartItem> for CartItemData {
    fn from(item: CartItem) -> Self {
        Self {
            quantity: i64::from(item.quantity),
            selected_price: item.selected_price(),
            is_package: item.is_package(),
        }
    }
}

/// Error decoding a structured entry whose quantity is not positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cart quantity must be positive (got {0})")]
pub struct NonPositiveQuantity(pub i64);

impl TryFrom<CartItemData> for CartItem {
    type Error = NonPositiveQuantity;

    fn try_from(data: CartItemData) -> Result<Self, Self::Error> {
        CartEntryInput::Item(data)
            .normalize()
            .ok_or(NonPositiveQuantity(data.quantity))
    }
}

// =============================================================================
// Ingestion
// =============================================================================

/// What a caller may hand to `add_to_cart` / `update_quantity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartEntryInput {
    /// Legacy bare quantity.
    Quantity(i64),
    /// Structured entry.
    Item(CartItemData),
}

impl From<u32> for CartEntryInput {
    fn from(quantity: u32) -> Self {
        Self::Quantity(i64::from(quantity))
    }
}

impl From<i64> for CartEntryInput {
    fn from(quantity: i64) -> Self {
        Self::Quantity(quantity)
    }
}

impl From<i32> for CartEntryInput {
    fn from(quantity: i32) -> Self {
        Self::Quantity(i64::from(quantity))
    }
}

impl From<CartItemData> for CartEntryInput {
    fn from(data: CartItemData) -> Self {
        Self::Item(data)
    }
}

impl From<CartItem> for CartEntryInput {
    fn from(item: CartItem) -> Self {
        Self::Item(item.into())
    }
}

impl CartEntryInput {
    /// Normalize to a [`CartItem`]. `None` means "no entry": the quantity was
    /// zero or negative.
    ///
    /// A package without a selected price cannot be totalled, so it is
    /// downgraded to a unit line.
    #[must_use]
    pub fn normalize(self) -> Option<CartItem> {
        match self {
            Self::Quantity(quantity) => CartItem::unit(positive_quantity(quantity)?),
            Self::Item(data) => {
                let quantity = positive_quantity(data.quantity)?;
                match (data.is_package, data.selected_price) {
                    (true, Some(price)) => CartItem::package(quantity, price),
                    (true, None) => {
                        warn!(quantity, "Package cart entry without a price, pricing per unit");
                        CartItem::unit(quantity)
                    }
                    (false, selected_price) => Some(CartItem {
                        quantity,
                        pricing: LinePricing::Unit { selected_price },
                    }),
                }
            }
        }
    }

    /// Whether this is the legacy bare-quantity form.
    #[must_use]
    pub const fn is_legacy(&self) -> bool {
        matches!(self, Self::Quantity(_))
    }
}

fn positive_quantity(quantity: i64) -> Option<u32> {
    u32::try_from(quantity).ok().filter(|q| *q > 0)
}

/// A cart value exactly as stored server-side.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawCartValue {
    /// Legacy bare quantity.
    Legacy(i64),
    /// Structured entry with any field possibly missing.
    Structured(RawCartFields),
    /// Anything else (strings, nulls, arrays).
    Unrecognized(serde_json::Value),
}

/// Structured cart fields before defaults are applied.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCartFields {
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub selected_price: Option<Decimal>,
    #[serde(default)]
    pub is_package: Option<bool>,
}

impl RawCartValue {
    /// Normalize a hydrated value, backfilling missing structured fields with
    /// quantity 1, no selected price, not a package.
    #[must_use]
    pub fn normalize(self) -> Option<CartItem> {
        match self {
            Self::Legacy(quantity) => CartEntryInput::Quantity(quantity).normalize(),
            Self::Structured(fields) => CartEntryInput::Item(CartItemData {
                quantity: fields.quantity.unwrap_or(1),
                selected_price: fields.selected_price,
                is_package: fields.is_package.unwrap_or(false),
            })
            .normalize(),
            Self::Unrecognized(value) => {
                warn!(value = %value, "Dropping unrecognized cart entry");
                None
            }
        }
    }
}

/// Raise a unit line to the product's minimum order quantity.
///
/// Returns the (possibly adjusted) item and whether it was raised. Packages
/// are never clamped.
#[must_use]
pub fn clamp_to_minimum(item: CartItem, product: &Product) -> (CartItem, bool) {
    let minimum = product.min_order_quantity.max(1);
    if !item.is_package() && item.quantity < minimum {
        (item.with_quantity(minimum), true)
    } else {
        (item, false)
    }
}

// =============================================================================
// Cart
// =============================================================================

/// Denormalized cart line for display and order submission.
///
/// Name, price, and image are read from the product when the row is built,
/// so a row reflects the current catalog price, not the price at add time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartRow {
    #[serde(rename = "_id")]
    pub id: ProductId,
    pub name: String,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub price: Decimal,
    #[serde(default)]
    pub image: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub is_package: bool,
    #[serde(
        default,
        serialize_with = "rust_decimal::serde::float_option::serialize"
    )]
    pub selected_price: Option<Decimal>,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub total: Decimal,
}

/// Cart contents keyed by product id (at most one entry per product).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    items: BTreeMap<ProductId, CartItem>,
}

impl Cart {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cart from server data, dropping entries that normalize away.
    #[must_use]
    pub fn from_raw(raw: BTreeMap<ProductId, RawCartValue>) -> Self {
        let items = raw
            .into_iter()
            .filter_map(|(id, value)| value.normalize().map(|item| (id, item)))
            .collect();
        Self { items }
    }

    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<&CartItem> {
        self.items.get(id)
    }

    /// Insert or overwrite the entry for `id`.
    pub fn set(&mut self, id: ProductId, item: CartItem) {
        self.items.insert(id, item);
    }

    pub fn remove(&mut self, id: &ProductId) -> Option<CartItem> {
        self.items.remove(id)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProductId, &CartItem)> {
        self.items.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ProductId> {
        self.items.keys()
    }

    /// Total number of units in the cart.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.items
            .values()
            .map(|item| u64::from(item.quantity()))
            .sum()
    }

    /// Line total for one product (zero when not in the cart).
    #[must_use]
    pub fn item_total(&self, id: &ProductId, products: &ProductIndex) -> Decimal {
        self.items
            .get(id)
            .map_or(Decimal::ZERO, |item| item.total(products.get(id)))
    }

    /// Sum of line totals, rounded to two decimal places.
    #[must_use]
    pub fn amount(&self, products: &ProductIndex) -> Decimal {
        let sum: Decimal = self
            .items
            .iter()
            .map(|(id, item)| item.total(products.get(id)))
            .sum();
        round_money(sum)
    }

    /// Lazily build denormalized rows. Lines whose product is unknown are
    /// skipped. Call again to restart.
    pub fn rows<'a>(&'a self, products: &'a ProductIndex) -> impl Iterator<Item = CartRow> + 'a {
        self.items.iter().filter_map(move |(id, item)| {
            let product = products.get(id)?;
            Some(CartRow {
                id: id.clone(),
                name: product.name.clone(),
                price: product.price,
                image: product.primary_image().map(str::to_owned),
                quantity: item.quantity(),
                is_package: item.is_package(),
                selected_price: item.selected_price(),
                total: item.total(Some(product)),
            })
        })
    }

    /// Apply a legacy bare-quantity add: added on top of an existing unit
    /// line, otherwise a fresh unit line.
    #[must_use]
    pub fn merge_legacy(&self, id: &ProductId, item: CartItem) -> CartItem {
        match self.items.get(id) {
            Some(existing) if !existing.is_package() => {
                existing.with_quantity(existing.quantity().saturating_add(item.quantity()))
            }
            _ => item,
        }
    }
}

/// Order total shown at checkout: nothing for an empty cart, otherwise the
/// subtotal plus the delivery fee.
#[must_use]
pub fn cart_total(subtotal: Decimal, delivery_fee: Decimal) -> Decimal {
    if subtotal.is_zero() {
        Decimal::ZERO
    } else {
        round_money(subtotal + delivery_fee)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product(id: &str, price: i64, min: u32) -> Product {
        serde_json::from_value(json!({
            "_id": id,
            "name": format!("Product {id}"),
            "price": price,
            "minOrderQuantity": min,
            "image": [format!("{id}.png")],
            "category": "OTC",
            "subCategory": "Pain Relief"
        }))
        .unwrap()
    }

    fn index(products: &[Product]) -> ProductIndex {
        products.iter().map(|p| (p.id.clone(), p.clone())).collect()
    }

    fn structured(quantity: i64, price: Option<i64>, is_package: bool) -> CartEntryInput {
        CartEntryInput::Item(CartItemData {
            quantity,
            selected_price: price.map(Decimal::from),
            is_package,
        })
    }

    #[test]
    fn test_legacy_quantity_normalizes_to_unit_line() {
        let item = CartEntryInput::from(3_u32).normalize().unwrap();
        assert_eq!(item.quantity(), 3);
        assert!(!item.is_package());
        assert_eq!(item.selected_price(), None);
    }

    #[test]
    fn test_non_positive_quantities_normalize_away() {
        assert!(CartEntryInput::from(0_u32).normalize().is_none());
        assert!(CartEntryInput::from(-2_i64).normalize().is_none());
        assert!(structured(0, Some(45), true).normalize().is_none());
    }

    #[test]
    fn test_package_without_price_is_downgraded() {
        let item = structured(30, None, true).normalize().unwrap();
        assert!(!item.is_package());
        assert_eq!(item.quantity(), 30);
    }

    #[test]
    fn test_hydration_of_legacy_and_partial_entries() {
        let raw: BTreeMap<ProductId, RawCartValue> = serde_json::from_value(json!({
            "p1": 3,
            "p2": {"quantity": 30, "selectedPrice": 45, "isPackage": true},
            "p3": {},
            "p4": 0,
            "p5": "garbage"
        }))
        .unwrap();

        let cart = Cart::from_raw(raw);

        assert_eq!(cart.len(), 3);
        let p1 = cart.get(&ProductId::from("p1")).unwrap();
        assert_eq!(p1.quantity(), 3);
        assert_eq!(p1.selected_price(), None);
        assert!(!p1.is_package());

        let p2 = cart.get(&ProductId::from("p2")).unwrap();
        assert_eq!(p2.pricing(), LinePricing::Package { price: Decimal::from(45) });

        let p3 = cart.get(&ProductId::from("p3")).unwrap();
        assert_eq!(p3.quantity(), 1);
        assert!(!p3.is_package());
        assert!(cart.get(&ProductId::from("p4")).is_none());
    }

    #[test]
    fn test_package_line_is_priced_once() {
        let products = index(&[product("p", 5, 1)]);
        let mut cart = Cart::new();
        cart.set(
            ProductId::from("p"),
            structured(30, Some(45), true).normalize().unwrap(),
        );
        assert_eq!(cart.item_total(&ProductId::from("p"), &products), Decimal::from(45));
    }

    #[test]
    fn test_unit_line_uses_live_price_not_selected_price() {
        let products = index(&[product("p", 10, 1)]);
        let mut cart = Cart::new();
        cart.set(
            ProductId::from("p"),
            structured(4, Some(7), false).normalize().unwrap(),
        );
        assert_eq!(cart.item_total(&ProductId::from("p"), &products), Decimal::from(40));
    }

    #[test]
    fn test_amount_sums_lines_and_rounds() {
        let products = index(&[product("a", 5, 1), product("b", 10, 1)]);
        let mut cart = Cart::new();
        cart.set(ProductId::from("a"), CartItem::package(30, Decimal::from(45)).unwrap());
        cart.set(ProductId::from("b"), CartItem::unit(3).unwrap());

        assert_eq!(cart.amount(&products), Decimal::new(7500, 2));
        assert_eq!(cart.count(), 33);
    }

    #[test]
    fn test_amount_rounds_fractional_prices() {
        let mut p = product("a", 0, 1);
        p.price = Decimal::new(3335, 3); // 3.335
        let products = index(&[p]);
        let mut cart = Cart::new();
        cart.set(ProductId::from("a"), CartItem::unit(1).unwrap());
        assert_eq!(cart.amount(&products), Decimal::new(334, 2));
    }

    #[test]
    fn test_unknown_product_contributes_nothing_and_has_no_row() {
        let products = ProductIndex::new();
        let mut cart = Cart::new();
        cart.set(ProductId::from("ghost"), CartItem::unit(2).unwrap());
        assert_eq!(cart.amount(&products), Decimal::ZERO);
        assert_eq!(cart.rows(&products).count(), 0);
    }

    #[test]
    fn test_rows_snapshot_product_fields() {
        let products = index(&[product("a", 20, 1)]);
        let mut cart = Cart::new();
        cart.set(ProductId::from("a"), CartItem::unit(2).unwrap());

        let rows: Vec<CartRow> = cart.rows(&products).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Product a");
        assert_eq!(rows[0].image.as_deref(), Some("a.png"));
        assert_eq!(rows[0].total, Decimal::from(40));

        // Restartable: a second pass yields the same rows.
        assert_eq!(cart.rows(&products).collect::<Vec<_>>(), rows);
    }

    #[test]
    fn test_clamp_to_minimum() {
        let p = product("a", 10, 5);
        let (item, clamped) = clamp_to_minimum(CartItem::unit(2).unwrap(), &p);
        assert!(clamped);
        assert_eq!(item.quantity(), 5);

        let (item, clamped) = clamp_to_minimum(CartItem::package(2, Decimal::from(15)).unwrap(), &p);
        assert!(!clamped);
        assert_eq!(item.quantity(), 2);
    }

    #[test]
    fn test_merge_legacy_adds_to_unit_line_only() {
        let id = ProductId::from("a");
        let mut cart = Cart::new();
        cart.set(id.clone(), CartItem::unit(2).unwrap());
        assert_eq!(cart.merge_legacy(&id, CartItem::unit(3).unwrap()).quantity(), 5);

        cart.set(id.clone(), CartItem::package(30, Decimal::from(45)).unwrap());
        let merged = cart.merge_legacy(&id, CartItem::unit(3).unwrap());
        assert_eq!(merged.quantity(), 3);
        assert!(!merged.is_package());
    }

    #[test]
    fn test_cart_item_wire_shape() {
        let item = CartItem::package(30, Decimal::from(45)).unwrap();
        assert_eq!(
            serde_json::to_value(item).unwrap(),
            json!({"quantity": 30, "selectedPrice": 45.0, "isPackage": true})
        );
        assert!(serde_json::from_value::<CartItem>(json!({"quantity": 0})).is_err());
    }

    #[test]
    fn test_cart_total_adds_fee_only_to_non_empty_cart() {
        assert_eq!(cart_total(Decimal::ZERO, Decimal::from(10)), Decimal::ZERO);
        assert_eq!(cart_total(Decimal::from(40), Decimal::from(10)), Decimal::from(50));
    }
}
