//! Cartwright CLI - drive the cart subsystem from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart of the user in CART_USER_ID
//! cart-cli show
//!
//! # Add a product from the catalog
//! cart-cli add 12
//!
//! # Row controls
//! cart-cli inc 12
//! cart-cli dec 12
//! cart-cli remove 12
//! cart-cli set 12 4
//!
//! # Empty the cart without the confirmation prompt
//! cart-cli --user 7 clear --yes
//!
//! # Re-read the cart before payment
//! cart-cli checkout
//! ```
//!
//! # Environment Variables
//!
//! - `CART_API_URL` - Cart service base URL (required)
//! - `CART_USER_ID` - Signed-in user, unless `--user` is given
//! - `SENTRY_DSN` - Enables error reporting when set

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod terminal;

#[derive(Parser)]
#[command(name = "cart-cli")]
#[command(author, version, about = "Cartwright cart tools")]
struct Cli {
    /// User ID to act as (overrides `CART_USER_ID`)
    #[arg(short, long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the cart
    Show,
    /// Add one unit of a product from the catalog
    Add {
        /// Product ID
        product_id: i32,
    },
    /// Increase a line's quantity by one
    Inc {
        /// Product ID
        product_id: i32,
    },
    /// Decrease a line's quantity by one (removes the line at zero)
    Dec {
        /// Product ID
        product_id: i32,
    },
    /// Remove a line
    Remove {
        /// Product ID
        product_id: i32,
    },
    /// Set a line's quantity
    Set {
        /// Product ID
        product_id: i32,

        /// New quantity (0 removes the line)
        quantity: u32,
    },
    /// Empty the cart
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Re-read the cart and proceed to payment
    Checkout,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(
    config: &cartwright_storefront::CartConfig,
) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cartwright_storefront::CartConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt::init();
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(2);
        }
    };

    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cartwright_storefront=info,cartwright_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = commands::cart::run(cli.command, cli.user, config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}
