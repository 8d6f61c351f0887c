//! Session, checkout and account commands.

use std::io::Write;

use clap::Args;
use ymgs_core::{ManualPaymentType, PaymentMethod};
use ymgs_storefront::api::{Address, ManualPaymentDetails, RazorpayVerification, ShopApi};
use ymgs_storefront::checkout::{BillingChoice, Checkout, CheckoutOutcome, GuestCheckout};
use ymgs_storefront::session::{AuthToken, TokenStore};
use ymgs_storefront::state::ShopState;

use super::{cart, output};
use crate::CliError;

#[derive(Debug, Clone, Args)]
pub struct AddressArgs {
    #[arg(long, default_value = "")]
    pub first_name: String,
    #[arg(long, default_value = "")]
    pub last_name: String,
    #[arg(long, default_value = "")]
    pub email: String,
    #[arg(long, default_value = "")]
    pub street: String,
    #[arg(long, default_value = "")]
    pub city: String,
    #[arg(long, default_value = "")]
    pub state: String,
    #[arg(long, default_value = "")]
    pub zipcode: String,
    #[arg(long, default_value = "")]
    pub country: String,
    #[arg(long, default_value = "")]
    pub phone: String,
}

impl From<AddressArgs> for Address {
    fn from(args: AddressArgs) -> Self {
        Self {
            first_name: args.first_name,
            last_name: args.last_name,
            email: args.email,
            street: args.street,
            city: args.city,
            state: args.state,
            zipcode: args.zipcode,
            country: args.country,
            phone: args.phone,
        }
    }
}

/// Offline payment attestation for `--method manual` and guest orders.
#[derive(Debug, Clone, Args)]
pub struct ManualPaymentArgs {
    /// credit_card, debit_card, paypal or crypto
    #[arg(long)]
    pub payment_type: Option<ManualPaymentType>,
    #[arg(long, default_value = "")]
    pub card_number: String,
    #[arg(long, default_value = "")]
    pub card_holder: String,
    #[arg(long, default_value = "")]
    pub expiry: String,
    #[arg(long, default_value = "")]
    pub cvv: String,
    #[arg(long, default_value = "")]
    pub paypal_email: String,
    #[arg(long)]
    pub transaction_id: Option<String>,
}

impl ManualPaymentArgs {
    fn into_details(self) -> Option<ManualPaymentDetails> {
        let payment_type = self.payment_type?;
        Some(ManualPaymentDetails {
            payment_type: Some(payment_type),
            card_number: self.card_number,
            card_holder_name: self.card_holder,
            expiry_date: self.expiry,
            cvv: self.cvv,
            paypal_email: self.paypal_email,
            crypto_transaction_id: self.transaction_id,
        })
    }
}

#[derive(Debug, Args)]
pub struct CheckoutArgs {
    /// cod, manual, stripe or razorpay
    #[arg(long, default_value = "cod")]
    pub method: PaymentMethod,

    /// Saved address number, as listed by `addresses`
    #[arg(long)]
    pub address: Option<usize>,

    #[command(flatten)]
    pub manual: ManualPaymentArgs,
}

#[derive(Debug, Args)]
pub struct GuestCheckoutArgs {
    #[command(flatten)]
    pub address: AddressArgs,

    #[command(flatten)]
    pub manual: ManualPaymentArgs,
}

#[derive(Debug, Args)]
pub struct RazorpayArgs {
    #[arg(long)]
    pub order_id: String,
    #[arg(long)]
    pub payment_id: String,
    #[arg(long)]
    pub signature: String,
}

pub async fn login<A: ShopApi, S: TokenStore>(
    shop: &ShopState<A, S>,
    token: &str,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let Some(token) = AuthToken::new(token) else {
        output::line(out, "Token must not be empty")?;
        return Ok(());
    };
    shop.login(token).await;
    output::line(out, "Logged in")?;
    cart::show(shop, out)
}

pub fn logout<A: ShopApi, S: TokenStore>(
    shop: &ShopState<A, S>,
    out: &mut impl Write,
) -> Result<(), CliError> {
    shop.logout();
    output::line(out, "Logged out")?;
    Ok(())
}

pub async fn checkout<A: ShopApi, S: TokenStore>(
    shop: &ShopState<A, S>,
    args: CheckoutArgs,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let address = match args.address {
        Some(number) if shop.is_logged_in() => {
            let Some(book) = shop.addresses().await else {
                return Ok(());
            };
            let Some(address) = number.checked_sub(1).and_then(|i| book.get(i)).cloned() else {
                output::line(out, &format!("No saved address number {number}"))?;
                return Ok(());
            };
            Some(address)
        }
        _ => None,
    };
    let manual_payment = args.manual.into_details();
    let outcome = shop
        .place_order(Checkout {
            address,
            method: args.method,
            manual_payment,
        })
        .await;
    print_outcome(out, outcome)
}

pub async fn guest_checkout<A: ShopApi, S: TokenStore>(
    shop: &ShopState<A, S>,
    args: GuestCheckoutArgs,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let outcome = shop
        .place_guest_order(GuestCheckout {
            address: args.address.into(),
            billing: BillingChoice::SameAsDelivery,
            manual_payment: args.manual.into_details(),
        })
        .await;
    print_outcome(out, outcome)
}

fn print_outcome(out: &mut impl Write, outcome: Option<CheckoutOutcome>) -> Result<(), CliError> {
    match outcome {
        None => {}
        Some(CheckoutOutcome::Placed { message }) => {
            if let Some(message) = message {
                output::line(out, &message)?;
            }
        }
        Some(CheckoutOutcome::Redirect(url)) => {
            output::line(out, &format!("Complete payment at {url}"))?;
        }
        Some(CheckoutOutcome::AwaitingRazorpay(order)) => {
            output::line(
                out,
                &format!(
                    "Razorpay order {} for {} {} (minor units). After paying, run \
                     `ymgs verify-razorpay --order-id {} --payment-id <id> --signature <sig>`",
                    order.id, order.amount, order.currency, order.id
                ),
            )?;
        }
    }
    Ok(())
}

pub async fn verify_razorpay<A: ShopApi, S: TokenStore>(
    shop: &ShopState<A, S>,
    args: RazorpayArgs,
) -> Result<(), CliError> {
    shop.verify_razorpay(RazorpayVerification {
        razorpay_order_id: args.order_id,
        razorpay_payment_id: args.payment_id,
        razorpay_signature: args.signature,
    })
    .await;
    Ok(())
}

pub async fn orders<A: ShopApi, S: TokenStore>(
    shop: &ShopState<A, S>,
    out: &mut impl Write,
) -> Result<(), CliError> {
    if let Some(items) = shop.order_history().await {
        output::orders(out, &items, shop.currency())?;
    }
    Ok(())
}

pub async fn addresses<A: ShopApi, S: TokenStore>(
    shop: &ShopState<A, S>,
    out: &mut impl Write,
) -> Result<(), CliError> {
    if let Some(book) = shop.addresses().await {
        output::addresses(out, &book)?;
    }
    Ok(())
}

pub async fn save_address<A: ShopApi, S: TokenStore>(
    shop: &ShopState<A, S>,
    args: AddressArgs,
    out: &mut impl Write,
) -> Result<(), CliError> {
    if let Some(book) = shop.save_address(args.into()).await {
        output::addresses(out, &book)?;
    }
    Ok(())
}

pub async fn settings<A: ShopApi, S: TokenStore>(
    shop: &ShopState<A, S>,
    out: &mut impl Write,
) -> Result<(), CliError> {
    if let Some(settings) = shop.store_settings().await {
        output::settings(out, &settings)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn manual(payment_type: Option<ManualPaymentType>) -> ManualPaymentArgs {
        ManualPaymentArgs {
            payment_type,
            card_number: String::new(),
            card_holder: String::new(),
            expiry: String::new(),
            cvv: String::new(),
            paypal_email: "buyer@example.com".to_string(),
            transaction_id: None,
        }
    }

    #[test]
    fn test_manual_details_need_a_payment_type() {
        assert!(manual(None).into_details().is_none());

        let details = manual(Some(ManualPaymentType::Paypal)).into_details().unwrap();
        assert_eq!(details.payment_type, Some(ManualPaymentType::Paypal));
        assert_eq!(details.paypal_email, "buyer@example.com");
    }

    #[test]
    fn test_razorpay_outcome_prints_verify_hint() {
        let mut buf = Vec::new();
        let order = ymgs_storefront::api::RazorpayOrder {
            id: "order_9A".to_string(),
            amount: 7500,
            currency: "INR".to_string(),
            receipt: None,
        };
        print_outcome(&mut buf, Some(CheckoutOutcome::AwaitingRazorpay(order))).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("--order-id order_9A"));
    }
}
