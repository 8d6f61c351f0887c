//! Status and method enums for orders and payments.

use serde::{Deserialize, Serialize};

/// Order lifecycle status as reported by the order service.
///
/// The backend stores free-form labels; the well-known ones are mapped to
/// variants and anything else is preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    #[default]
    OrderPlaced,
    Packing,
    Shipped,
    OutForDelivery,
    Delivered,
    Other(String),
}

impl OrderStatus {
    /// Display label, identical to the backend's wire value.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::OrderPlaced => "Order Placed",
            Self::Packing => "Packing",
            Self::Shipped => "Shipped",
            Self::OutForDelivery => "Out for delivery",
            Self::Delivered => "Delivered",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for OrderStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Order Placed" => Self::OrderPlaced,
            "Packing" => Self::Packing,
            "Shipped" => Self::Shipped,
            "Out for delivery" => Self::OutForDelivery,
            "Delivered" => Self::Delivered,
            _ => Self::Other(s),
        }
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.label().to_owned()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// How a registered customer pays for an order.
///
/// Each method maps to its own order-placement endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash on delivery.
    #[default]
    Cod,
    /// Offline payment attested by the customer; a representative follows up.
    Manual,
    /// Hosted Stripe checkout session.
    Stripe,
    /// Razorpay checkout, verified after the provider callback.
    Razorpay,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cod => write!(f, "cod"),
            Self::Manual => write!(f, "manual"),
            Self::Stripe => write!(f, "stripe"),
            Self::Razorpay => write!(f, "razorpay"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cod" => Ok(Self::Cod),
            "manual" => Ok(Self::Manual),
            "stripe" => Ok(Self::Stripe),
            "razorpay" => Ok(Self::Razorpay),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}

/// Instrument declared for a manual (offline) payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualPaymentType {
    CreditCard,
    DebitCard,
    Paypal,
    Crypto,
}

impl ManualPaymentType {
    /// Whether this payment type needs full card details.
    #[must_use]
    pub const fn is_card(self) -> bool {
        matches!(self, Self::CreditCard | Self::DebitCard)
    }
}

impl std::str::FromStr for ManualPaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit_card" => Ok(Self::CreditCard),
            "debit_card" => Ok(Self::DebitCard),
            "paypal" => Ok(Self::Paypal),
            "crypto" => Ok(Self::Crypto),
            _ => Err(format!("invalid manual payment type: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_roundtrips_unknown_labels() {
        let status: OrderStatus = serde_json::from_str("\"Returned to sender\"").unwrap();
        assert_eq!(status, OrderStatus::Other("Returned to sender".to_string()));
        assert_eq!(
            serde_json::to_string(&status).unwrap(),
            "\"Returned to sender\""
        );
    }

    #[test]
    fn test_order_status_known_label() {
        let status: OrderStatus = serde_json::from_str("\"Out for delivery\"").unwrap();
        assert_eq!(status, OrderStatus::OutForDelivery);
    }

    #[test]
    fn test_manual_payment_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&ManualPaymentType::CreditCard).unwrap(),
            "\"credit_card\""
        );
        assert!(ManualPaymentType::DebitCard.is_card());
        assert!(!ManualPaymentType::Paypal.is_card());
        assert_eq!("crypto".parse::<ManualPaymentType>(), Ok(ManualPaymentType::Crypto));
    }

    #[test]
    fn test_payment_method_parse() {
        assert_eq!("razorpay".parse::<PaymentMethod>(), Ok(PaymentMethod::Razorpay));
        assert!("bitcoin".parse::<PaymentMethod>().is_err());
    }
}
