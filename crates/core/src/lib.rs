//! YMGS Core - Shared types library.
//!
//! This crate provides common types used across all storefront components:
//! - `storefront` - Shop state core, catalog queries, cart pricing, API client
//! - `cli` - Terminal front end over the storefront library
//!
//! # Architecture
//!
//! The core crate contains only types and pure helpers - no I/O, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, emails, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
