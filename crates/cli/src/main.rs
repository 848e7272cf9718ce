//! Subasa CLI - the storefront from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Put products into the local catalog snapshot
//! subasa catalog seed products.json
//!
//! # Sign in and fill the cart
//! subasa login u1
//! subasa cart add p1 --size M --quantity 2
//! subasa cart inc p1--M --hold 1500
//!
//! # Check out and come back from the provider
//! subasa checkout --name An --phone 0901234567 --address "1 Le Loi" --method momo
//! subasa resume "http://localhost:5173/checkout?resultCode=0&orderId=ORDER1"
//! ```
//!
//! # Environment Variables
//!
//! - `SUBASA_GATEWAY_URL` - Payment server base URL (required)
//! - `SUBASA_DATA_DIR` - Device storage and catalog snapshot directory
//! - `SUBASA_RETURN_URL` - Checkout return page, used by a bare `resume`

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use subasa_core::PaymentMethod;

mod commands;
mod context;

use commands::cart::Step;
use context::Context;

#[derive(Parser)]
#[command(name = "subasa")]
#[command(author, version, about = "Subasa Sports storefront CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in as a user (switches to that user's cart)
    Login {
        /// User id from the identity provider
        user_id: String,
    },
    /// Sign out (switches to the guest cart)
    Logout,
    /// Inspect and edit the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Place orders for cart lines
    Checkout {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        phone: String,

        #[arg(short, long)]
        address: String,

        /// `cod`, `momo`, `vnpay` or `stripe`
        #[arg(short, long, default_value = "cod")]
        method: PaymentMethod,

        /// Only check out these line keys (default: every line)
        #[arg(long = "only")]
        only: Vec<String>,
    },
    /// Handle the URL the payment provider sent you back to
    Resume {
        /// Return URL; defaults to `SUBASA_RETURN_URL`
        url: Option<String>,
    },
    /// Manage the local catalog snapshot
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// List lines and totals
    Show,
    /// Add a product
    Add {
        product_id: String,

        #[arg(short, long, default_value = "")]
        color: String,

        #[arg(short, long, default_value = "")]
        size: String,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Add one unit to a line
    Inc {
        line_key: String,

        /// Keep the button pressed for this many milliseconds
        #[arg(long)]
        hold: Option<u64>,
    },
    /// Remove one unit from a line
    Dec {
        line_key: String,

        /// Keep the button pressed for this many milliseconds
        #[arg(long)]
        hold: Option<u64>,
    },
    /// Set a line's quantity
    Set {
        line_key: String,

        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a line
    Remove { line_key: String },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum CatalogAction {
    /// Write products from a JSON array file into the snapshot
    Seed { file: String },
    /// List products shown to shoppers
    List,
}

#[tokio::main]
async fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "subasa=info,subasa_storefront=warn".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::open()?;
    match cli.command {
        Commands::Login { user_id } => commands::account::login(&ctx, &user_id)?,
        Commands::Logout => commands::account::logout(&ctx)?,
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&ctx)?,
            CartAction::Add {
                product_id,
                color,
                size,
                quantity,
            } => commands::cart::add(&ctx, &product_id, &color, &size, quantity).await?,
            CartAction::Inc { line_key, hold } => {
                commands::cart::step(&ctx, &line_key, Step::Up, hold).await?;
            }
            CartAction::Dec { line_key, hold } => {
                commands::cart::step(&ctx, &line_key, Step::Down, hold).await?;
            }
            CartAction::Set { line_key, quantity } => commands::cart::set(&ctx, &line_key, quantity)?,
            CartAction::Remove { line_key } => commands::cart::remove(&ctx, &line_key)?,
            CartAction::Clear => commands::cart::clear(&ctx)?,
        },
        Commands::Checkout {
            name,
            phone,
            address,
            method,
            only,
        } => {
            let customer = subasa_core::CustomerInfo::new(name, phone, address);
            commands::checkout::submit(&ctx, customer, method, &only).await?;
        }
        Commands::Resume { url } => commands::checkout::resume(&ctx, url.as_deref()).await?,
        Commands::Catalog { action } => match action {
            CatalogAction::Seed { file } => commands::catalog::seed(&ctx, &file).await?,
            CatalogAction::List => commands::catalog::list(&ctx).await?,
        },
    }
    Ok(())
}
