//! Cart commands.

use std::io::Write;

use clap::Subcommand;
use ymgs_core::ProductId;
use ymgs_storefront::api::ShopApi;
use ymgs_storefront::cart::{CartEntryInput, CartItem};
use ymgs_storefront::session::TokenStore;
use ymgs_storefront::state::ShopState;

use super::output::{self, CartSummary};
use crate::CliError;

#[derive(Debug, Subcommand)]
pub enum CartAction {
    /// List cart lines and totals
    Show,

    /// Add a product; repeated adds of a quantity accumulate
    Add {
        /// Product ID
        id: String,

        /// Units to add
        #[arg(long, default_value_t = 1)]
        quantity: u32,

        /// Buy the package of this many units instead
        #[arg(long, conflicts_with = "quantity")]
        package: Option<u32>,
    },

    /// Set the quantity of a line; zero or less removes it
    Update {
        /// Product ID
        id: String,

        #[arg(long, allow_negative_numbers = true)]
        quantity: i64,
    },

    /// Remove a line
    Remove {
        /// Product ID
        id: String,
    },

    /// Empty the local cart
    Clear,
}

pub async fn run<A: ShopApi, S: TokenStore>(
    shop: &ShopState<A, S>,
    action: CartAction,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match action {
        CartAction::Show => {}
        CartAction::Add {
            id,
            quantity,
            package,
        } => {
            let id = ProductId::from(id);
            let Some(input) = entry_for(shop, &id, quantity, package).await else {
                return Ok(());
            };
            shop.add_to_cart(&id, input).await;
        }
        CartAction::Update { id, quantity } => {
            let id = ProductId::from(id);
            // Minimum quantities are only enforced for products the store knows.
            shop.fetch_product(&id).await;
            shop.update_quantity(&id, quantity).await;
        }
        CartAction::Remove { id } => shop.remove_from_cart(&ProductId::from(id)).await,
        CartAction::Clear => shop.clear_cart(),
    }
    show(shop, out)
}

/// The cart entry to add: a bare quantity, or the product's package of
/// `package` units at its listed price.
async fn entry_for<A: ShopApi, S: TokenStore>(
    shop: &ShopState<A, S>,
    id: &ProductId,
    quantity: u32,
    package: Option<u32>,
) -> Option<CartEntryInput> {
    let product = shop.fetch_product(id).await?;
    let Some(units) = package else {
        return Some(quantity.into());
    };
    let price = product
        .package_prices()
        .unwrap_or_default()
        .into_iter()
        .find(|p| p.quantity == units)
        .map(|p| p.price);
    if price.is_none() {
        tracing::warn!(product_id = %id, units, "No such package for product");
    }
    CartItem::package(units, price?).map(Into::into)
}

pub fn show<A: ShopApi, S: TokenStore>(
    shop: &ShopState<A, S>,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let summary = CartSummary {
        subtotal: shop.cart_amount(),
        delivery_fee: shop.delivery_fee(),
        total: shop.cart_total(),
        currency: shop.currency(),
    };
    output::cart(out, &shop.cart_items(), summary)?;
    Ok(())
}
