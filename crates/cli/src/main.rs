//! YMGS storefront CLI.
//!
//! Browse the catalog, manage the cart, log in, check out and review orders
//! against a live backend from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Browse
//! ymgs products --category OTC --sort price --order asc
//! ymgs product 65f0c1d2e3
//!
//! # Session
//! ymgs login --token "$YMGS_TOKEN"
//! ymgs cart add 65f0c1d2e3 --quantity 2
//! ymgs checkout --method cod --address 1
//!
//! # Interactive session sharing one cart
//! ymgs shell
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

mod commands;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use secrecy::ExposeSecret;
use tracing::warn;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use ymgs_storefront::api::{ApiError, HttpShopApi};
use ymgs_storefront::config::{ConfigError, StorefrontConfig};
use ymgs_storefront::session::{FileTokenStore, MemoryTokenStore, TokenStore};
use ymgs_storefront::state::{ShopSettings, ShopState};

use commands::account::{AddressArgs, CheckoutArgs, GuestCheckoutArgs, RazorpayArgs};
use commands::cart::CartAction;
use commands::catalog::ProductsArgs;

#[derive(Parser)]
#[command(name = "ymgs")]
#[command(about = "YMGS pharmacy storefront from the terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// A line typed into `ymgs shell`.
#[derive(Parser)]
#[command(name = "ymgs", no_binary_name = true, disable_version_flag = true)]
pub(crate) struct ShellLine {
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// List catalog products
    Products(ProductsArgs),

    /// Show the best-seller strip
    Featured,

    /// Show one product with its package prices
    Product {
        /// Product ID
        id: String,
    },

    /// Show or change the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },

    /// Start a session with a backend token
    Login {
        /// Token issued by the backend login endpoint
        #[arg(long)]
        token: String,
    },

    /// End the session and forget the stored token
    Logout,

    /// Place an order for the cart as the logged-in customer
    Checkout(CheckoutArgs),

    /// Place an order for the cart without an account
    GuestCheckout(GuestCheckoutArgs),

    /// Confirm a Razorpay payment after checkout
    VerifyRazorpay(RazorpayArgs),

    /// List purchased items, newest first
    Orders,

    /// List saved addresses
    Addresses,

    /// Add an address to the address book
    SaveAddress(AddressArgs),

    /// Show store contact details
    Settings,

    /// Interactive session; carts persist between commands
    Shell,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("could not create API client: {0}")]
    Api(#[from] ApiError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("{e}");
            std::process::exit(1);
        }
    };

    let _sentry_guard = init_sentry(&config);
    init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(cli, &config).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

/// Initialize Sentry if a DSN is configured.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;
    let guard = sentry::init((
        dsn.expose_secret(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));
    Some(guard)
}

/// Warnings and errors become Sentry events, everything else breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        _ => sentry_tracing::EventFilter::Breadcrumb,
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ymgs_storefront=warn,ymgs_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

async fn run(cli: Cli, config: &StorefrontConfig) -> Result<(), CliError> {
    let api = HttpShopApi::new(config)?;
    let settings = ShopSettings::from(config);

    if let Some(path) = &config.token_file {
        dispatch(ShopState::new(api, FileTokenStore::new(path), settings), cli.command).await
    } else {
        warn!("No data directory available, the session will not be saved");
        dispatch(ShopState::new(api, MemoryTokenStore::new(), settings), cli.command).await
    }
}

async fn dispatch<S: TokenStore>(
    shop: ShopState<HttpShopApi, S>,
    command: Commands,
) -> Result<(), CliError> {
    if matches!(command, Commands::Shell) {
        commands::shell::run(&shop).await
    } else {
        shop.restore_session().await;
        execute(&shop, command).await
    }
}

/// Run one command against the store, then print any notices it queued.
async fn execute<S: TokenStore>(
    shop: &ShopState<HttpShopApi, S>,
    command: Commands,
) -> Result<(), CliError> {
    let mut out = std::io::stdout().lock();
    match command {
        Commands::Products(args) => commands::catalog::products(shop, args, &mut out).await?,
        Commands::Featured => commands::catalog::featured(shop, &mut out).await?,
        Commands::Product { id } => commands::catalog::product(shop, &id.into(), &mut out).await?,
        Commands::Cart { action } => commands::cart::run(shop, action, &mut out).await?,
        Commands::Login { token } => commands::account::login(shop, &token, &mut out).await?,
        Commands::Logout => commands::account::logout(shop, &mut out)?,
        Commands::Checkout(args) => commands::account::checkout(shop, args, &mut out).await?,
        Commands::GuestCheckout(args) => {
            commands::account::guest_checkout(shop, args, &mut out).await?;
        }
        Commands::VerifyRazorpay(args) => commands::account::verify_razorpay(shop, args).await?,
        Commands::Orders => commands::account::orders(shop, &mut out).await?,
        Commands::Addresses => commands::account::addresses(shop, &mut out).await?,
        Commands::SaveAddress(args) => {
            commands::account::save_address(shop, args, &mut out).await?;
        }
        Commands::Settings => commands::account::settings(shop, &mut out).await?,
        Commands::Shell => commands::output::line(&mut out, "Already in the shell")?,
    }
    commands::output::notices(&mut out, &shop.take_notices())?;
    Ok(())
}
