//! Unified error handling with Sentry integration.
//!
//! No error leaves a state-mutating store operation. Each one is logged,
//! captured to Sentry when it points at the backend, and converted into a
//! [`Notice`] for the presentation layer.

use thiserror::Error;
use ymgs_core::EmailError;

use crate::api::ApiError;
use crate::session::StorageError;

/// Input rejected before any network call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please fill in the {0} field")]
    MissingField(&'static str),

    #[error("Invalid email address: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Your cart is empty")]
    EmptyCart,

    #[error("Please select an address or add a new one")]
    NoAddressSelected,

    #[error("Please select a payment type")]
    MissingPaymentType,

    #[error("Please enter your PayPal email")]
    MissingPaypalEmail,

    #[error("Please fill in all card details")]
    IncompleteCardDetails,

    #[error("Please log in to continue")]
    LoginRequired,
}

/// Application-level error type for the shop state core.
#[derive(Debug, Error)]
pub enum ShopError {
    /// Input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Backend call failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Backend data had an unusable shape.
    #[error("Unexpected data: {0}")]
    DataShape(String),

    /// Durable token storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ShopError {
    /// Whether the error should be captured to Sentry.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        match self {
            Self::Api(err) => err.is_server_error(),
            Self::DataShape(_) | Self::Storage(_) => true,
            Self::Validation(_) => false,
        }
    }

    /// Log the error, capture it to Sentry when warranted, and produce the
    /// notice shown to the customer.
    #[must_use]
    pub fn report(&self) -> Notice {
        if self.is_server_error() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Shop operation failed"
            );
        } else {
            tracing::warn!(error = %self, "Shop operation rejected");
        }
        Notice::from(self)
    }
}

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// A user-visible, non-blocking message (a "toast").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<&ShopError> for Notice {
    fn from(err: &ShopError) -> Self {
        // Don't expose internal error details to customers
        match err {
            ShopError::Validation(e) => Self::error(e.to_string()),
            ShopError::Api(ApiError::Rejected(message)) => Self::error(message.clone()),
            ShopError::Api(ApiError::Unauthorized) => {
                Self::error("Your session has expired, please log in again")
            }
            ShopError::Api(ApiError::NotFound(_)) => Self::error("Not found"),
            ShopError::Api(_) => Self::error("Could not reach the store, please try again"),
            ShopError::DataShape(_) => Self::error("Received unexpected data from the store"),
            ShopError::Storage(_) => Self::warning("Could not save your login on this device"),
        }
    }
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "p1")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages() {
        let err = ValidationError::MissingField("street");
        assert_eq!(err.to_string(), "Please fill in the street field");
        assert_eq!(
            ValidationError::MissingPaymentType.to_string(),
            "Please select a payment type"
        );
    }

    #[test]
    fn test_notice_hides_internal_details() {
        let err = ShopError::Api(ApiError::Status {
            status: 500,
            body: "stack trace at line 42".to_string(),
        });
        let notice = Notice::from(&err);
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(!notice.message.contains("stack trace"));
    }

    #[test]
    fn test_rejected_message_is_shown() {
        let err = ShopError::Api(ApiError::Rejected("Product out of stock".to_string()));
        assert_eq!(Notice::from(&err).message, "Product out of stock");
    }

    #[test]
    fn test_server_error_classification() {
        assert!(!ShopError::Validation(ValidationError::EmptyCart).is_server_error());
        assert!(ShopError::DataShape("bad".to_string()).is_server_error());
        assert!(!ShopError::Api(ApiError::Unauthorized).is_server_error());
    }
}
