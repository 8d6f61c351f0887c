//! Checkout: form validation and order placement.
//!
//! Everything is validated before a request is built. The submitted amount
//! is the cart subtotal plus the delivery fee, and the submitted items are
//! the cart rows priced at submission time.

use tracing::{info, instrument, warn};
use ymgs_core::{Email, ManualPaymentType, PaymentMethod};

use crate::api::{
    Address, ManualPaymentDetails, OrderRequest, RazorpayOrder, RazorpayVerification, ShopApi,
};
use crate::cart::CartRow;
use crate::error::{Notice, ShopError, ValidationError, add_breadcrumb};
use crate::session::TokenStore;
use crate::state::ShopState;

/// Recorded when a crypto payment is attested without a transaction id.
pub const DEFAULT_CRYPTO_TRANSACTION_ID: &str = "User didn't enter transaction ID";

/// Check that every required address field is filled in.
///
/// Guest orders also need a well-formed email, since it is the only way to
/// reach the customer. A registered customer's email is checked only if
/// given.
///
/// # Errors
///
/// Returns the first missing field, or an invalid email.
pub fn validate_address(address: &Address, require_email: bool) -> Result<(), ValidationError> {
    let required = [
        ("first name", &address.first_name),
        ("last name", &address.last_name),
        ("street", &address.street),
        ("city", &address.city),
        ("state", &address.state),
        ("zipcode", &address.zipcode),
        ("country", &address.country),
        ("phone", &address.phone),
    ];
    if let Some((field, _)) = required.into_iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(ValidationError::MissingField(field));
    }

    if address.email.trim().is_empty() {
        if require_email {
            return Err(ValidationError::MissingField("email"));
        }
    } else {
        Email::parse(&address.email)?;
    }
    Ok(())
}

/// Check manual payment details for the declared payment type.
///
/// Returns the details to submit; a crypto attestation without a
/// transaction id gets [`DEFAULT_CRYPTO_TRANSACTION_ID`].
///
/// # Errors
///
/// Returns an error when the payment type is missing or its details are
/// incomplete.
pub fn validate_manual_payment(
    mut details: ManualPaymentDetails,
) -> Result<ManualPaymentDetails, ValidationError> {
    let payment_type = details
        .payment_type
        .ok_or(ValidationError::MissingPaymentType)?;

    match payment_type {
        ManualPaymentType::Paypal => {
            if details.paypal_email.trim().is_empty() {
                return Err(ValidationError::MissingPaypalEmail);
            }
            Email::parse(&details.paypal_email)?;
        }
        ManualPaymentType::CreditCard | ManualPaymentType::DebitCard => {
            let card_fields = [
                &details.card_number,
                &details.card_holder_name,
                &details.expiry_date,
                &details.cvv,
            ];
            if card_fields.iter().any(|f| f.trim().is_empty()) {
                return Err(ValidationError::IncompleteCardDetails);
            }
        }
        ManualPaymentType::Crypto => {
            let missing = details
                .crypto_transaction_id
                .as_deref()
                .is_none_or(|id| id.trim().is_empty());
            if missing {
                details.crypto_transaction_id = Some(DEFAULT_CRYPTO_TRANSACTION_ID.to_string());
            }
        }
    }
    Ok(details)
}

/// Billing address for a guest order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingChoice {
    SameAsDelivery,
    Separate(Address),
}

/// A registered customer's checkout form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkout {
    /// Saved or newly entered delivery address.
    pub address: Option<Address>,
    pub method: PaymentMethod,
    /// Required when `method` is [`PaymentMethod::Manual`].
    pub manual_payment: Option<ManualPaymentDetails>,
}

/// A guest checkout form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestCheckout {
    pub address: Address,
    pub billing: BillingChoice,
    /// Manual payment attestation, if paying manually.
    pub manual_payment: Option<ManualPaymentDetails>,
}

/// What the presentation layer should do after a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// The order is placed and the cart was cleared.
    Placed { message: Option<String> },
    /// Continue at the hosted payment page.
    Redirect(String),
    /// Open the Razorpay checkout for this order, then call
    /// [`ShopState::verify_razorpay`] with the provider callback.
    AwaitingRazorpay(RazorpayOrder),
}

impl<A: ShopApi, S: TokenStore> ShopState<A, S> {
    /// Priced cart lines to submit. Lines whose product is unknown cannot be
    /// priced and are left out, so an order is only placed when at least one
    /// line remains.
    fn order_items(&self) -> Result<Vec<CartRow>, ShopError> {
        let items = self.cart_items();
        if items.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }
        let skipped = self.cart().len().saturating_sub(items.len());
        if skipped > 0 {
            warn!(skipped, "Cart lines without product data left out of order");
        }
        Ok(items)
    }

    /// Place an order for the current cart as the logged-in customer.
    ///
    /// Returns `None` when validation or the request failed; the reason is
    /// queued as a notice.
    #[instrument(skip_all, fields(method = %checkout.method))]
    pub async fn place_order(&self, checkout: Checkout) -> Option<CheckoutOutcome> {
        match self.try_place_order(checkout).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                self.report(e);
                None
            }
        }
    }

    async fn try_place_order(&self, checkout: Checkout) -> Result<CheckoutOutcome, ShopError> {
        let token = self.token().ok_or(ValidationError::LoginRequired)?;
        let items = self.order_items()?;
        let address = checkout
            .address
            .ok_or(ValidationError::NoAddressSelected)?;
        validate_address(&address, false)?;

        let manual_payment_details = match checkout.method {
            PaymentMethod::Manual => Some(validate_manual_payment(
                checkout.manual_payment.unwrap_or_default(),
            )?),
            _ => None,
        };

        let order = OrderRequest {
            address,
            billing_address: None,
            items,
            amount: self.order_amount(),
            is_guest: None,
            manual_payment_details,
        };
        let method = checkout.method.to_string();
        add_breadcrumb("checkout", "Placing order", Some(&[("method", method.as_str())]));

        let response = self
            .api()
            .place_order(&token, checkout.method, &order)
            .await?;

        match checkout.method {
            PaymentMethod::Cod | PaymentMethod::Manual => {
                self.clear_cart();
                let text = if checkout.method == PaymentMethod::Manual {
                    "Order placed successfully. Our representative will contact you shortly."
                } else {
                    "Order placed successfully"
                };
                self.push_notice(Notice::success(text));
                info!(amount = %order.amount, "Order placed");
                Ok(CheckoutOutcome::Placed {
                    message: response.message,
                })
            }
            PaymentMethod::Stripe => response
                .session_url
                .map(CheckoutOutcome::Redirect)
                .ok_or_else(|| ShopError::DataShape("Stripe response without session_url".into())),
            PaymentMethod::Razorpay => response
                .order
                .map(CheckoutOutcome::AwaitingRazorpay)
                .ok_or_else(|| ShopError::DataShape("Razorpay response without order".into())),
        }
    }

    /// Place an order without an account. No token is sent.
    #[instrument(skip_all)]
    pub async fn place_guest_order(&self, checkout: GuestCheckout) -> Option<CheckoutOutcome> {
        match self.try_place_guest_order(checkout).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                self.report(e);
                None
            }
        }
    }

    async fn try_place_guest_order(
        &self,
        checkout: GuestCheckout,
    ) -> Result<CheckoutOutcome, ShopError> {
        let items = self.order_items()?;
        validate_address(&checkout.address, true)?;
        let billing_address = match checkout.billing {
            BillingChoice::SameAsDelivery => checkout.address.clone(),
            BillingChoice::Separate(billing) => {
                validate_address(&billing, true)?;
                billing
            }
        };
        let manual_payment_details = checkout
            .manual_payment
            .map(validate_manual_payment)
            .transpose()?;

        let order = OrderRequest {
            address: checkout.address,
            billing_address: Some(billing_address),
            items,
            amount: self.order_amount(),
            is_guest: Some(true),
            manual_payment_details,
        };
        add_breadcrumb("checkout", "Placing guest order", None);

        let response = self.api().place_guest_order(&order).await?;

        self.clear_cart();
        self.push_notice(Notice::success(
            "Order placed successfully! One of our representatives will get in touch with you \
             within 24 hours via call or email",
        ));
        info!(amount = %order.amount, "Guest order placed");
        Ok(CheckoutOutcome::Placed {
            message: response.message,
        })
    }

    /// Forward the Razorpay callback for verification; the cart is cleared
    /// once the backend confirms payment. Returns whether it did.
    #[instrument(skip_all, fields(order_id = %payload.razorpay_order_id))]
    pub async fn verify_razorpay(&self, payload: RazorpayVerification) -> bool {
        let Some(token) = self.token() else {
            self.report(ValidationError::LoginRequired.into());
            return false;
        };
        match self.api().verify_razorpay(&token, &payload).await {
            Ok(_) => {
                self.clear_cart();
                self.push_notice(Notice::success("Payment verified"));
                info!("Razorpay payment verified");
                true
            }
            Err(e) => {
                self.report(e.into());
                false
            }
        }
    }
}
