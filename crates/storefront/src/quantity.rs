//! Quantity selector for the product page.

use crate::api::Product;

/// A quantity input that never goes below the product's minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantitySelector {
    min: u32,
    value: u32,
}

impl QuantitySelector {
    #[must_use]
    pub const fn new(min: u32) -> Self {
        let min = if min == 0 { 1 } else { min };
        Self { min, value: min }
    }

    /// Start at the product's minimum order quantity.
    #[must_use]
    pub const fn for_product(product: &Product) -> Self {
        Self::new(product.min_order_quantity)
    }

    #[must_use]
    pub const fn value(&self) -> u32 {
        self.value
    }

    #[must_use]
    pub const fn min(&self) -> u32 {
        self.min
    }

    pub const fn increment(&mut self) {
        self.value = self.value.saturating_add(1);
    }

    /// Step down, stopping at the minimum.
    pub const fn decrement(&mut self) {
        if self.value > self.min {
            self.value -= 1;
        }
    }

    /// Set a typed-in value. Values below the minimum are ignored; returns
    /// whether the value was accepted.
    pub const fn set(&mut self, value: u32) -> bool {
        if value >= self.min {
            self.value = value;
            true
        } else {
            false
        }
    }
}
