//! Money helpers using decimal arithmetic.
//!
//! All cart and order amounts are `rust_decimal::Decimal`. Amounts shown to
//! the customer or submitted with an order are rounded to two places with
//! midpoint-away-from-zero ("standard") rounding.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of decimal places used for every displayed or submitted amount.
pub const MONEY_SCALE: u32 = 2;

/// Round an amount to two decimal places using standard rounding.
///
/// ```
/// use rust_decimal::Decimal;
/// use ymgs_core::round_money;
///
/// assert_eq!(round_money(Decimal::new(10005, 3)), Decimal::new(1001, 2));
/// ```
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Format an amount for display (e.g., `"₹ 40.00"`).
#[must_use]
pub fn format_money(amount: Decimal, currency: CurrencyCode) -> String {
    format!("{} {:.2}", currency.symbol(), round_money(amount))
}

/// ISO 4217 currency codes accepted by the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
    EUR,
    GBP,
}

impl CurrencyCode {
    /// Display symbol for the currency.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::INR => "₹",
            Self::USD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INR" => Ok(Self::INR),
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            _ => Err(format!("unsupported currency: {s}")),
        }
    }
}
