//! YMGS Storefront library.
//!
//! The shop state core of the pharmacy storefront: cart normalization and
//! pricing, catalog queries, the backend HTTP client, token persistence,
//! checkout and the account area. Presentation layers drive it through
//! [`state::ShopState`].
//!
//! # Example
//!
//! ```rust,ignore
//! use ymgs_storefront::api::HttpShopApi;
//! use ymgs_storefront::config::StorefrontConfig;
//! use ymgs_storefront::session::FileTokenStore;
//! use ymgs_storefront::state::ShopState;
//!
//! let config = StorefrontConfig::from_env()?;
//! let api = HttpShopApi::new(&config)?;
//! let shop = ShopState::new(api, FileTokenStore::new(path), (&config).into());
//! shop.init().await;
//! shop.add_to_cart(&product_id, 2_u32).await;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod account;
pub mod api;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod error;
pub mod quantity;
pub mod session;
pub mod state;

#[cfg(test)]
mod testing;
