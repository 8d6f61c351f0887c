//! Session and cart synchronization against the mock backend.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use serde_json::json;
use ymgs_core::ProductId;
use ymgs_integration_tests::{MockBackend, product};
use ymgs_storefront::cart::{CartItem, CartItemData};
use ymgs_storefront::error::NoticeLevel;
use ymgs_storefront::session::{AuthToken, FileTokenStore};

async fn seeded() -> MockBackend {
    let backend = MockBackend::start().await.unwrap();
    backend.add_product(product("p1", "Ibuprofen 200mg", 15.0, "OTC", "Pain"));
    let mut packaged = product("p2", "Insulin Pen", 30.0, "Rx", "Diabetes");
    packaged["quantityPriceList"] = json!([{"quantity": 2, "price": 40}]);
    packaged["minOrderQuantity"] = json!(2);
    backend.add_product(packaged);
    backend.issue_token("tok-1");
    backend
}

fn token(raw: &str) -> AuthToken {
    AuthToken::new(raw).unwrap()
}

// =============================================================================
// Hydration
// =============================================================================

#[tokio::test]
async fn test_login_hydrates_mixed_cart_formats() {
    let backend = seeded().await;
    backend.state().carts.insert(
        "tok-1".to_string(),
        serde_json::from_value(json!({
            "p1": 3,
            "p2": {"quantity": 2, "isPackage": true, "selectedPrice": 40}
        }))
        .unwrap(),
    );
    let shop = backend.shop().unwrap();

    shop.login(token("tok-1")).await;

    assert_eq!(shop.cart_count(), 5);
    // Products were never listed; hydration fetched them by id.
    assert_eq!(shop.item_total(&ProductId::new("p1")), Decimal::from(45));
    assert_eq!(shop.item_total(&ProductId::new("p2")), Decimal::from(40));
    assert_eq!(shop.cart_amount(), Decimal::from(85));
    assert_eq!(shop.cart_total(), Decimal::from(95));

    let rows = shop.cart_items();
    let insulin = rows.iter().find(|r| r.id.as_str() == "p2").unwrap();
    assert!(insulin.is_package);
    assert_eq!(insulin.name, "Insulin Pen");
}

#[tokio::test]
async fn test_login_replaces_guest_cart() {
    let backend = seeded().await;
    backend.state().carts.insert(
        "tok-1".to_string(),
        serde_json::from_value(json!({"p1": 1})).unwrap(),
    );
    let shop = backend.shop().unwrap();
    shop.fetch_product(&ProductId::new("p2")).await;
    shop.add_to_cart(&ProductId::new("p2"), 4_u32).await;

    shop.login(token("tok-1")).await;

    let ids: Vec<String> = shop.cart().ids().map(ToString::to_string).collect();
    assert_eq!(ids, vec!["p1"]);
    // Guest adds are never sent to the backend.
    assert!(backend.requests_to("/api/cart/add").is_empty());
}

#[tokio::test]
async fn test_rejected_token_leaves_cart_empty() {
    let backend = seeded().await;
    let shop = backend.shop().unwrap();

    shop.login(token("not-issued")).await;

    assert!(shop.cart().is_empty());
    let notices = shop.take_notices();
    assert!(notices.iter().any(|n| n.level == NoticeLevel::Error));
}

// =============================================================================
// Sync
// =============================================================================

#[tokio::test]
async fn test_cart_changes_are_sent_with_token() {
    let backend = seeded().await;
    let shop = backend.shop().unwrap();
    shop.login(token("tok-1")).await;
    shop.fetch_product(&ProductId::new("p1")).await;

    shop.add_to_cart(&ProductId::new("p1"), 2_u32).await;

    let adds = backend.requests_to("/api/cart/add");
    assert_eq!(adds.len(), 1);
    assert_eq!(adds[0].token.as_deref(), Some("tok-1"));
    assert_eq!(adds[0].body["itemId"], "p1");
    assert_eq!(adds[0].body["cartData"]["quantity"], 2);
    assert_eq!(adds[0].body["cartData"]["isPackage"], false);

    shop.update_quantity(&ProductId::new("p1"), 0_u32).await;

    let updates = backend.requests_to("/api/cart/update");
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].body, json!({"itemId": "p1", "quantity": 0}));
    assert!(backend.state().carts["tok-1"].is_empty());
}

#[tokio::test]
async fn test_package_entry_round_trips_through_backend() {
    let backend = seeded().await;
    let shop = backend.shop().unwrap();
    shop.login(token("tok-1")).await;
    shop.fetch_product(&ProductId::new("p2")).await;

    let package = CartItem::package(2, Decimal::from(40)).unwrap();
    shop.add_to_cart(&ProductId::new("p2"), CartItemData::from(package))
        .await;
    shop.clear_cart();
    shop.get_user_cart(&token("tok-1")).await;

    assert_eq!(shop.cart().get(&ProductId::new("p2")), Some(&package));
    assert_eq!(shop.cart_amount(), Decimal::from(40));
}

#[tokio::test]
async fn test_minimum_quantity_raised_before_sync() {
    let backend = seeded().await;
    let shop = backend.shop().unwrap();
    shop.login(token("tok-1")).await;
    shop.fetch_product(&ProductId::new("p2")).await;

    let stored = shop.add_to_cart(&ProductId::new("p2"), 1_u32).await.unwrap();

    assert_eq!(stored.quantity(), 2);
    let adds = backend.requests_to("/api/cart/add");
    assert_eq!(adds[0].body["cartData"]["quantity"], 2);
}

// =============================================================================
// Persistence
// =============================================================================

#[tokio::test]
async fn test_session_survives_restart() {
    let backend = seeded().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("token");
    let config = backend.config();

    {
        let shop = backend
            .shop_with(&config, FileTokenStore::new(&path))
            .unwrap();
        shop.login(token("tok-1")).await;
        shop.fetch_product(&ProductId::new("p1")).await;
        shop.add_to_cart(&ProductId::new("p1"), 3_u32).await;
    }

    let shop = backend
        .shop_with(&config, FileTokenStore::new(&path))
        .unwrap();
    assert!(shop.restore_session().await);
    assert_eq!(shop.token(), Some(token("tok-1")));
    assert_eq!(shop.cart_count(), 3);

    shop.logout();
    assert!(!path.exists());
    assert!(shop.cart().is_empty());
}
