//! Cache types for backend responses.

use ymgs_core::ProductId;

use super::{Product, StoreSettings};

/// Cache key for single products and store settings.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Product(ProductId),
    Settings,
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<Product>),
    Settings(Box<StoreSettings>),
}
