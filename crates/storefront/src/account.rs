//! Account area: saved addresses, order history and store contact settings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, instrument};
use ymgs_core::{OrderId, OrderStatus, ProductId};

use crate::api::{Address, Order, ShopApi, StoreSettings};
use crate::checkout::validate_address;
use crate::error::{Notice, ShopError, ValidationError};
use crate::session::TokenStore;
use crate::state::ShopState;

/// One purchased line of a past order, annotated with its order's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderHistoryItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub image: Option<String>,
    pub quantity: u32,
    pub status: OrderStatus,
    /// Whether the order has been paid.
    pub payment: bool,
    pub payment_method: String,
    pub date: Option<DateTime<Utc>>,
}

/// Flatten orders into lines, newest first.
#[must_use]
pub fn flatten_orders(orders: Vec<Order>) -> Vec<OrderHistoryItem> {
    let mut items: Vec<OrderHistoryItem> = orders
        .into_iter()
        .flat_map(|order| {
            let Order {
                id,
                items,
                status,
                payment,
                payment_method,
                date,
                ..
            } = order;
            let date = DateTime::from_timestamp_millis(date);
            items.into_iter().map(move |line| OrderHistoryItem {
                order_id: id.clone(),
                product_id: line.id,
                name: line.name,
                price: line.price,
                image: line.image,
                quantity: line.quantity,
                status: status.clone(),
                payment,
                payment_method: payment_method.clone(),
                date,
            })
        })
        .collect();
    // The backend lists oldest first.
    items.reverse();
    items
}

impl<A: ShopApi, S: TokenStore> ShopState<A, S> {
    /// The customer's saved addresses. `None` on failure (notice queued).
    #[instrument(skip(self))]
    pub async fn addresses(&self) -> Option<Vec<Address>> {
        self.report_err(self.try_addresses().await)
    }

    async fn try_addresses(&self) -> Result<Vec<Address>, ShopError> {
        let token = self.token().ok_or(ValidationError::LoginRequired)?;
        Ok(self.api().get_addresses(&token).await?)
    }

    /// Validate and save a new address, returning the refreshed address book.
    #[instrument(skip_all)]
    pub async fn save_address(&self, address: Address) -> Option<Vec<Address>> {
        let saved = self.report_err(self.try_save_address(&address).await)?;
        self.push_notice(Notice::success("Address saved successfully"));
        Some(saved)
    }

    async fn try_save_address(&self, address: &Address) -> Result<Vec<Address>, ShopError> {
        validate_address(address, false)?;
        let token = self.token().ok_or(ValidationError::LoginRequired)?;
        self.api().save_address(&token, address).await?;
        Ok(self.api().get_addresses(&token).await?)
    }

    /// Every purchased line across the customer's orders, newest first.
    #[instrument(skip(self))]
    pub async fn order_history(&self) -> Option<Vec<OrderHistoryItem>> {
        let orders = self.report_err(self.try_user_orders().await)?;
        debug!(orders = orders.len(), "Loaded order history");
        Some(flatten_orders(orders))
    }

    async fn try_user_orders(&self) -> Result<Vec<Order>, ShopError> {
        let token = self.token().ok_or(ValidationError::LoginRequired)?;
        Ok(self.api().user_orders(&token).await?)
    }

    /// Store contact details for the contact page.
    #[instrument(skip(self))]
    pub async fn store_settings(&self) -> Option<StoreSettings> {
        let result = self.api().settings().await.map_err(ShopError::from);
        self.report_err(result)
    }

    fn report_err<T>(&self, result: Result<T, ShopError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.report(e);
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::session::{AuthToken, MemoryTokenStore};
    use crate::state::ShopSettings;
    use crate::testing::{Call, FakeShopApi};

    fn order(id: &str, date: i64, lines: &[&str], status: &str) -> Order {
        serde_json::from_value(json!({
            "_id": id,
            "items": lines
                .iter()
                .map(|l| json!({"_id": l, "name": l, "price": "12.50", "quantity": 2}))
                .collect::<Vec<_>>(),
            "amount": 35,
            "status": status,
            "paymentMethod": "COD",
            "payment": false,
            "date": date
        }))
        .unwrap()
    }

    async fn logged_in() -> ShopState<FakeShopApi, MemoryTokenStore> {
        let state = ShopState::new(
            FakeShopApi::default(),
            MemoryTokenStore::new(),
            ShopSettings::default(),
        );
        state.login(AuthToken::new("tok").unwrap()).await;
        state
    }

    #[test]
    fn test_flatten_orders_newest_first() {
        let orders = vec![
            order("o1", 1_700_000_000_000, &["a", "b"], "Delivered"),
            order("o2", 1_710_000_000_000, &["c"], "Shipped"),
        ];

        let items = flatten_orders(orders);

        let ids: Vec<&str> = items.iter().map(|i| i.product_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(items[0].status, OrderStatus::Shipped);
        assert_eq!(items[0].order_id, OrderId::new("o2"));
        assert_eq!(items[2].payment_method, "COD");
        assert_eq!(items[0].price, Decimal::new(1250, 2));
        assert_eq!(
            items[0].date.unwrap().timestamp_millis(),
            1_710_000_000_000
        );
    }

    #[tokio::test]
    async fn test_order_history_requires_login() {
        let state = ShopState::new(
            FakeShopApi::default(),
            MemoryTokenStore::new(),
            ShopSettings::default(),
        );
        assert!(state.order_history().await.is_none());
        assert_eq!(
            state.take_notices()[0].message,
            ValidationError::LoginRequired.to_string()
        );
    }

    #[tokio::test]
    async fn test_order_history_from_backend() {
        let state = logged_in().await;
        state
            .api()
            .backend()
            .orders
            .push(order("o1", 1_700_000_000_000, &["a"], "Order Placed"));

        let history = state.order_history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, OrderStatus::OrderPlaced);
    }

    #[tokio::test]
    async fn test_save_address_validates_then_refreshes() {
        let state = logged_in().await;

        assert!(state.save_address(Address::default()).await.is_none());
        assert!(
            !state
                .api()
                .calls()
                .iter()
                .any(|c| matches!(c, Call::SaveAddress(_)))
        );

        let address = Address {
            first_name: "Asha".to_string(),
            last_name: "Rao".to_string(),
            street: "12 MG Road".to_string(),
            city: "Pune".to_string(),
            state: "MH".to_string(),
            zipcode: "411001".to_string(),
            country: "India".to_string(),
            phone: "9800000000".to_string(),
            ..Address::default()
        };
        let book = state.save_address(address.clone()).await.unwrap();
        assert_eq!(book, vec![address]);
        assert!(
            state
                .take_notices()
                .iter()
                .any(|n| n.message == "Address saved successfully")
        );
    }

    #[tokio::test]
    async fn test_store_settings() {
        let state = logged_in().await;
        state.api().backend().settings.contact_email = Some("care@ymgs.com".to_string());

        let settings = state.store_settings().await.unwrap();
        assert_eq!(settings.contact_email.as_deref(), Some("care@ymgs.com"));
    }

    #[tokio::test]
    async fn test_backend_failure_becomes_notice() {
        let state = logged_in().await;
        state.api().backend().fail_all = true;
        state.take_notices();

        assert!(state.addresses().await.is_none());
        assert_eq!(state.take_notices().len(), 1);
    }
}
