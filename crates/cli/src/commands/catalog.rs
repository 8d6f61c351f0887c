//! Catalog browsing commands.

use std::io::Write;

use clap::Args;
use ymgs_core::ProductId;
use ymgs_storefront::api::ShopApi;
use ymgs_storefront::catalog::{FilterUpdate, SortBy, SortOrder};
use ymgs_storefront::session::TokenStore;
use ymgs_storefront::state::ShopState;

use super::output;
use crate::CliError;

/// Related products shown under a product.
const RELATED_LIMIT: usize = 4;

#[derive(Debug, Args)]
pub struct ProductsArgs {
    /// Category filter (repeatable)
    #[arg(long)]
    pub category: Vec<String>,

    /// Sub-category filter (repeatable)
    #[arg(long = "sub-category")]
    pub sub_category: Vec<String>,

    /// Case-insensitive name search
    #[arg(long)]
    pub search: Option<String>,

    /// Sort key: date, price or name
    #[arg(long)]
    pub sort: Option<SortBy>,

    /// Sort direction: asc or desc
    #[arg(long)]
    pub order: Option<SortOrder>,

    /// Page number
    #[arg(long)]
    pub page: Option<u32>,
}

impl ProductsArgs {
    /// Only the options given on the command line; the rest keep their
    /// current value.
    fn filter_update(&self) -> FilterUpdate {
        FilterUpdate {
            category: (!self.category.is_empty())
                .then(|| self.category.iter().cloned().collect()),
            sub_category: (!self.sub_category.is_empty())
                .then(|| self.sub_category.iter().cloned().collect()),
            search: self.search.clone(),
            sort_by: self.sort,
            sort_order: self.order,
        }
    }
}

pub async fn products<A: ShopApi, S: TokenStore>(
    shop: &ShopState<A, S>,
    args: ProductsArgs,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let update = args.filter_update();
    let fetched = if update == FilterUpdate::default() {
        shop.refresh_catalog().await
    } else {
        shop.update_filters(update).await
    };

    if let Some(page) = args.page
        && page != shop.pagination().current_page
        && !shop.set_page(page).await
    {
        output::line(out, &format!("Page {page} is out of range"))?;
        return Ok(());
    }
    if !fetched && shop.products().is_empty() {
        return Ok(());
    }

    output::products(out, &shop.products(), shop.currency())?;
    output::pagination(out, shop.pagination())?;
    Ok(())
}

pub async fn featured<A: ShopApi, S: TokenStore>(
    shop: &ShopState<A, S>,
    out: &mut impl Write,
) -> Result<(), CliError> {
    shop.load_featured().await;
    output::products(out, &shop.featured(), shop.currency())?;
    Ok(())
}

pub async fn product<A: ShopApi, S: TokenStore>(
    shop: &ShopState<A, S>,
    id: &ProductId,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let Some(product) = shop.fetch_product(id).await else {
        return Ok(());
    };
    output::product_detail(out, &product, shop.currency())?;

    if shop.products().is_empty() {
        shop.refresh_catalog().await;
    }
    let related = shop.related_products(id, RELATED_LIMIT);
    if !related.is_empty() {
        output::line(out, "\nRelated products:")?;
        output::products(out, &related, shop.currency())?;
    }
    Ok(())
}
