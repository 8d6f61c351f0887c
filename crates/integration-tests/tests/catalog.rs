//! Catalog queries against the mock backend over HTTP.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use serde_json::json;
use ymgs_core::ProductId;
use ymgs_integration_tests::{MockBackend, product};
use ymgs_storefront::catalog::{FilterUpdate, SortBy, SortOrder};
use ymgs_storefront::error::NoticeLevel;
use ymgs_storefront::session::MemoryTokenStore;

async fn seeded() -> MockBackend {
    let backend = MockBackend::start().await.unwrap();
    backend.add_product(product("p1", "Ibuprofen 200mg", 15.0, "OTC", "Pain"));
    backend.add_product(product("p2", "Cough Syrup", 8.5, "OTC", "Cold"));
    backend.add_product(product("p3", "Amoxicillin", 22.0, "Rx", "Antibiotic"));
    backend.add_product(product("p4", "Paracetamol 500mg", 4.0, "OTC", "Pain"));
    backend
}

fn names(products: &[ymgs_storefront::api::Product]) -> Vec<&str> {
    products.iter().map(|p| p.name.as_str()).collect()
}

// =============================================================================
// Filters
// =============================================================================

#[tokio::test]
async fn test_category_filter_and_price_sort() {
    let backend = seeded().await;
    let shop = backend.shop().unwrap();

    assert!(shop.update_filters(FilterUpdate::category(["OTC"])).await);
    assert_eq!(shop.pagination().total, 3);

    let applied = shop
        .update_filters(FilterUpdate {
            sort_by: Some(SortBy::Price),
            sort_order: Some(SortOrder::Asc),
            ..FilterUpdate::default()
        })
        .await;
    assert!(applied);
    assert_eq!(
        names(&shop.products()),
        vec!["Paracetamol 500mg", "Cough Syrup", "Ibuprofen 200mg"]
    );
    // Earlier filters survive a partial update.
    assert!(shop.filters().category.contains("OTC"));
}

#[tokio::test]
async fn test_sub_category_and_search() {
    let backend = seeded().await;
    let shop = backend.shop().unwrap();

    shop.update_filters(FilterUpdate {
        sub_category: Some(["Pain".to_string()].into()),
        ..FilterUpdate::default()
    })
    .await;
    assert_eq!(shop.products().len(), 2);

    shop.update_filters(FilterUpdate {
        sub_category: Some(std::collections::BTreeSet::new()),
        ..FilterUpdate::default()
    })
    .await;
    assert!(shop.search("cough").await);
    assert_eq!(names(&shop.products()), vec!["Cough Syrup"]);
}

// =============================================================================
// Pagination
// =============================================================================

#[tokio::test]
async fn test_pages_follow_backend_pagination() {
    let backend = seeded().await;
    let mut config = backend.config();
    config.page_size = 3;
    let shop = backend.shop_with(&config, MemoryTokenStore::new()).unwrap();

    assert!(shop.refresh_catalog().await);
    assert_eq!(shop.pagination().pages, 2);
    assert_eq!(shop.products().len(), 3);

    assert!(shop.set_page(2).await);
    assert_eq!(shop.pagination().current_page, 2);
    assert_eq!(shop.products().len(), 1);

    // Out of range: nothing is requested and the page is kept.
    assert!(!shop.set_page(3).await);
    assert!(!shop.set_page(0).await);
    assert_eq!(shop.pagination().current_page, 2);
    assert_eq!(shop.products().len(), 1);
}

#[tokio::test]
async fn test_filter_change_returns_to_first_page() {
    let backend = seeded().await;
    let mut config = backend.config();
    config.page_size = 2;
    let shop = backend.shop_with(&config, MemoryTokenStore::new()).unwrap();

    shop.refresh_catalog().await;
    assert!(shop.set_page(2).await);

    shop.update_filters(FilterUpdate::category(["OTC"])).await;
    assert_eq!(shop.pagination().current_page, 1);
}

// =============================================================================
// Products
// =============================================================================

#[tokio::test]
async fn test_featured_lists_bestsellers_only() {
    let backend = seeded().await;
    let mut best = product("p5", "Vitamin C", 6.0, "OTC", "Vitamins");
    best["bestseller"] = json!(true);
    backend.add_product(best);
    let shop = backend.shop().unwrap();

    shop.load_featured().await;

    assert_eq!(names(&shop.featured()), vec!["Vitamin C"]);
    // The main listing is untouched.
    assert!(shop.products().is_empty());
}

#[tokio::test]
async fn test_fetch_product_by_id() {
    let backend = seeded().await;
    let mut packaged = product("p6", "Insulin Pen", 30.0, "Rx", "Diabetes");
    packaged["quantityPriceList"] = json!("[{\"quantity\":5,\"price\":120}]");
    backend.add_product(packaged);
    let shop = backend.shop().unwrap();

    let found = shop.fetch_product(&ProductId::new("p6")).await.unwrap();
    assert_eq!(found.price, Decimal::from(30));
    assert_eq!(found.package_prices().unwrap()[0].quantity, 5);
    assert!(shop.product(&ProductId::new("p6")).is_some());

    assert!(shop.fetch_product(&ProductId::new("missing")).await.is_none());
    let notices = shop.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
}

#[tokio::test]
async fn test_related_products_share_category() {
    let backend = seeded().await;
    let shop = backend.shop().unwrap();
    shop.refresh_catalog().await;

    let related = shop.related_products(&ProductId::new("p1"), 4);

    assert_eq!(names(&related), vec!["Paracetamol 500mg"]);
}
