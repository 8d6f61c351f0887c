//! Plain-text rendering of store data.
//!
//! Everything writes to a caller-supplied [`Write`] so the shell and one-shot
//! commands share the same formatting.

use std::io::{self, Write};

use rust_decimal::Decimal;
use ymgs_core::{CurrencyCode, format_money};
use ymgs_storefront::account::OrderHistoryItem;
use ymgs_storefront::api::{Address, DisplayPrice, Product, StoreSettings};
use ymgs_storefront::cart::CartRow;
use ymgs_storefront::catalog::Pagination;
use ymgs_storefront::error::{Notice, NoticeLevel};

pub fn line(out: &mut impl Write, text: &str) -> io::Result<()> {
    writeln!(out, "{text}")
}

pub fn notices(out: &mut impl Write, notices: &[Notice]) -> io::Result<()> {
    for notice in notices {
        let tag = match notice.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warn",
            NoticeLevel::Error => "error",
        };
        writeln!(out, "[{tag}] {}", notice.message)?;
    }
    Ok(())
}

pub fn products(
    out: &mut impl Write,
    products: &[Product],
    currency: CurrencyCode,
) -> io::Result<()> {
    if products.is_empty() {
        return line(out, "No products found");
    }
    for product in products {
        writeln!(
            out,
            "{:<26} {:<40} {:>14}  {}/{}",
            product.id.as_str(),
            product.name,
            price_label(product.display_price(), currency),
            product.category,
            product.sub_category
        )?;
    }
    Ok(())
}

fn price_label(price: DisplayPrice, currency: CurrencyCode) -> String {
    match price {
        DisplayPrice::Flat(price) => format_money(price, currency),
        DisplayPrice::Package { price, quantity } => {
            format!("{} / {quantity}", format_money(price, currency))
        }
    }
}

pub fn pagination(out: &mut impl Write, pagination: Pagination) -> io::Result<()> {
    writeln!(
        out,
        "Page {} of {} ({} products)",
        pagination.current_page,
        pagination.pages.max(1),
        pagination.total
    )
}

pub fn product_detail(
    out: &mut impl Write,
    product: &Product,
    currency: CurrencyCode,
) -> io::Result<()> {
    writeln!(out, "{} ({})", product.name, product.id)?;
    writeln!(out, "  Category: {} / {}", product.category, product.sub_category)?;
    writeln!(out, "  Price: {}", format_money(product.price, currency))?;
    writeln!(out, "  Minimum order: {}", product.min_order_quantity)?;
    // Malformed tables show no packages.
    for package in product.package_prices().unwrap_or_default() {
        writeln!(
            out,
            "  Package: {} units for {}",
            package.quantity,
            format_money(package.price, currency)
        )?;
    }
    if let Some(image) = product.primary_image() {
        writeln!(out, "  Image: {image}")?;
    }
    if !product.description.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", product.description)?;
    }
    Ok(())
}

/// Cart totals shown under the cart lines.
#[derive(Debug, Clone, Copy)]
pub struct CartSummary {
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
    pub currency: CurrencyCode,
}

pub fn cart(out: &mut impl Write, rows: &[CartRow], summary: CartSummary) -> io::Result<()> {
    if rows.is_empty() {
        return line(out, "Your cart is empty");
    }
    for row in rows {
        let pricing = match (row.is_package, row.selected_price) {
            (true, Some(price)) => format!(
                "package of {} at {}",
                row.quantity,
                format_money(price, summary.currency)
            ),
            _ => format!(
                "{} x {}",
                row.quantity,
                format_money(row.price, summary.currency)
            ),
        };
        writeln!(
            out,
            "{:<26} {:<40} {:<28} {:>14}",
            row.id.as_str(),
            row.name,
            pricing,
            format_money(row.total, summary.currency)
        )?;
    }
    writeln!(out, "Subtotal: {}", format_money(summary.subtotal, summary.currency))?;
    writeln!(out, "Delivery: {}", format_money(summary.delivery_fee, summary.currency))?;
    writeln!(out, "Total:    {}", format_money(summary.total, summary.currency))
}

pub fn addresses(out: &mut impl Write, addresses: &[Address]) -> io::Result<()> {
    if addresses.is_empty() {
        return line(out, "No saved addresses");
    }
    for (index, address) in addresses.iter().enumerate() {
        writeln!(out, "{:>3}. {address} ({})", index + 1, address.phone)?;
    }
    Ok(())
}

pub fn orders(
    out: &mut impl Write,
    items: &[OrderHistoryItem],
    currency: CurrencyCode,
) -> io::Result<()> {
    if items.is_empty() {
        return line(out, "No orders yet");
    }
    for item in items {
        let date = item
            .date
            .map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d").to_string());
        writeln!(
            out,
            "{date}  {:<40} x{:<4} {:>14}  {:<18} {} ({})",
            item.name,
            item.quantity,
            format_money(item.price, currency),
            item.status.label(),
            item.payment_method,
            if item.payment { "paid" } else { "unpaid" }
        )?;
    }
    Ok(())
}

pub fn settings(out: &mut impl Write, settings: &StoreSettings) -> io::Result<()> {
    let fields = [
        ("Email", &settings.contact_email),
        ("Phone", &settings.contact_phone),
        ("WhatsApp", &settings.whatsapp_number),
        ("Address", &settings.address),
        ("Hours", &settings.business_hours),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            writeln!(out, "{label:<9} {value}")?;
        }
    }
    Ok(())
}
