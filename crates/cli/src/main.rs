//! Colando CLI - Database migrations, back office and a terminal cart.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! colando migrate
//!
//! # Coupons
//! colando coupon create BEMVINDO10 --kind percentage --value 10
//! colando seed coupons seeds/coupons.yaml
//!
//! # Orders and draft orders
//! colando order list --status paid
//! colando draft status <uuid> in_production
//!
//! # Shop from the terminal against a running storefront
//! colando cart add 12
//! colando cart checkout
//!
//! # Customer account
//! colando wishlist toggle 12 --user <uuid>
//! colando history list --user <uuid>
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `coupon` - Create, list and deactivate coupons
//! - `seed` - Load coupons from a YAML file
//! - `order` / `draft` - Inspect and advance orders
//! - `cart` - Terminal shopping cart backed by the storefront API
//! - `wishlist` / `history` - A customer's saved products and past orders

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use colando_core::cart::Customization;
use colando_core::{DraftOrderId, UserId};

mod client;
mod commands;
mod storage;

use client::{ApiClient, DEFAULT_API_URL};
use commands::cart::CartContext;
use commands::coupon::DiscountArg;
use storage::DEFAULT_CART_FILE;

#[derive(Parser)]
#[command(name = "colando")]
#[command(author, version, about = "Colando CLI tools")]
struct Cli {
    /// Storefront base URL used by cart commands
    #[arg(long, global = true, env = "COLANDO_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// File the terminal cart is kept in
    #[arg(long, global = true, env = "COLANDO_CART_FILE", default_value = DEFAULT_CART_FILE)]
    cart_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Manage discount coupons
    Coupon {
        #[command(subcommand)]
        action: CouponAction,
    },
    /// Seed database from files
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Inspect and update orders
    Order {
        #[command(subcommand)]
        action: OrderAction,
    },
    /// Inspect and update draft (customization) orders
    Draft {
        #[command(subcommand)]
        action: DraftAction,
    },
    /// Terminal shopping cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// A customer's saved products
    Wishlist {
        /// Customer id
        #[arg(long, env = "COLANDO_USER_ID")]
        user: UserId,

        #[command(subcommand)]
        action: WishlistAction,
    },
    /// A customer's past orders
    History {
        /// Customer id
        #[arg(long, env = "COLANDO_USER_ID")]
        user: UserId,

        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand)]
enum WishlistAction {
    /// List saved products
    Show,
    /// Save a product
    Add { product_id: i32 },
    /// Forget a product
    Remove { product_id: i32 },
    /// Save a product, or forget it if already saved
    Toggle { product_id: i32 },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List orders, newest first
    List,
    /// Show an order with its items
    Show { id: i32 },
}

#[derive(Subcommand)]
enum CouponAction {
    /// Create a coupon
    Create {
        /// Coupon code (stored upper-case)
        code: String,

        #[arg(short, long, value_enum)]
        kind: DiscountArg,

        /// Percentage points or amount in reais
        #[arg(short, long)]
        value: Option<Decimal>,

        /// Expiration timestamp (RFC 3339)
        #[arg(short, long)]
        expires_at: Option<DateTime<Utc>>,

        /// Create switched off
        #[arg(long)]
        inactive: bool,
    },
    /// List all coupons
    List,
    /// Switch a coupon off
    Deactivate { code: String },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert coupons from a YAML file
    Coupons {
        /// Path to the YAML file
        file: String,
    },
}

#[derive(Subcommand)]
enum OrderAction {
    /// List orders, newest first
    List {
        #[arg(short, long)]
        status: Option<String>,
    },
    /// Set an order's status
    Status {
        id: i32,
        status: String,

        /// Carrier tracking code
        #[arg(short, long)]
        tracking: Option<String>,
    },
}

#[derive(Subcommand)]
enum DraftAction {
    /// Create a draft order for a product
    Create {
        product_id: i32,

        #[arg(short, long, default_value = "photo")]
        personalization: String,
    },
    /// List draft orders, newest first
    List {
        #[arg(short, long)]
        status: Option<String>,
    },
    /// Set a draft order's status
    Status { id: String, status: String },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart and its totals
    Show,
    /// Add a product
    Add {
        product_id: i32,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Uploaded artwork URL
        #[arg(long)]
        design_url: Option<String>,

        /// Theme name
        #[arg(long)]
        theme: Option<String>,

        /// Personalized text
        #[arg(long)]
        text: Option<String>,
    },
    /// Set a line's quantity (0 removes it)
    Qty {
        item: String,

        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a line
    Remove { item: String },
    /// Empty the cart
    Clear,
    /// Apply a coupon code
    Coupon { code: String },
    /// Remove the applied coupon
    Uncoupon,
    /// Quote shipping to a CEP and select an option
    Shipping {
        postal_code: String,

        /// Option id to select instead of the cheapest
        #[arg(short, long)]
        option: Option<i64>,
    },
    /// Open a checkout session and print the payment URL
    Checkout {
        /// Pay for a draft order instead of the cart
        #[arg(long)]
        draft: Option<DraftOrderId>,

        /// Customer id to attach to the order
        #[arg(long)]
        user: Option<UserId>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Coupon { action } => match action {
            CouponAction::Create {
                code,
                kind,
                value,
                expires_at,
                inactive,
            } => {
                commands::coupon::create(&code, kind, value, expires_at, inactive).await?;
            }
            CouponAction::List => commands::coupon::list().await?,
            CouponAction::Deactivate { code } => commands::coupon::deactivate(&code).await?,
        },
        Commands::Seed { target } => match target {
            SeedTarget::Coupons { file } => commands::seed::coupons(&file).await?,
        },
        Commands::Order { action } => match action {
            OrderAction::List { status } => commands::order::list(status.as_deref()).await?,
            OrderAction::Status {
                id,
                status,
                tracking,
            } => commands::order::set_status(id, &status, tracking.as_deref()).await?,
        },
        Commands::Draft { action } => match action {
            DraftAction::Create {
                product_id,
                personalization,
            } => {
                commands::draft::create(product_id, &personalization).await?;
            }
            DraftAction::List { status } => commands::draft::list(status.as_deref()).await?,
            DraftAction::Status { id, status } => {
                commands::draft::set_status(&id, &status).await?;
            }
        },
        Commands::Cart { action } => {
            let ctx = CartContext {
                cart_file: cli.cart_file,
                api: ApiClient::new(&cli.api_url)?,
            };
            run_cart(&ctx, action).await?;
        }
        Commands::Wishlist { user, action } => {
            use commands::account;

            let api = ApiClient::new(&cli.api_url)?;
            match action {
                WishlistAction::Show => account::show_wishlist(&api, user).await?,
                WishlistAction::Add { product_id } => {
                    account::add_to_wishlist(&api, user, product_id).await?;
                }
                WishlistAction::Remove { product_id } => {
                    account::remove_from_wishlist(&api, user, product_id).await?;
                }
                WishlistAction::Toggle { product_id } => {
                    account::toggle_wishlist(&api, user, product_id).await?;
                }
            }
        }
        Commands::History { user, action } => {
            use commands::account;

            let api = ApiClient::new(&cli.api_url)?;
            match action {
                HistoryAction::List => account::list_orders(&api, user).await?,
                HistoryAction::Show { id } => account::show_order(&api, user, id).await?,
            }
        }
    }
    Ok(())
}

async fn run_cart(
    ctx: &CartContext,
    action: CartAction,
) -> Result<(), commands::cart::CartCommandError> {
    use commands::cart;

    match action {
        CartAction::Show => cart::show(ctx).await,
        CartAction::Add {
            product_id,
            quantity,
            design_url,
            theme,
            text,
        } => {
            let customization = (design_url.is_some() || theme.is_some() || text.is_some())
                .then_some(Customization {
                    design_url,
                    theme_name: theme,
                    text,
                });
            cart::add(ctx, product_id, customization, quantity.max(1)).await
        }
        CartAction::Qty { item, quantity } => cart::set_quantity(ctx, &item, quantity),
        CartAction::Remove { item } => cart::remove(ctx, &item),
        CartAction::Clear => cart::clear(ctx),
        CartAction::Coupon { code } => cart::apply_coupon(ctx, &code).await,
        CartAction::Uncoupon => cart::remove_coupon(ctx),
        CartAction::Shipping {
            postal_code,
            option,
        } => cart::shipping(ctx, &postal_code, option).await,
        CartAction::Checkout { draft, user } => cart::checkout(ctx, draft, user).await,
    }
}
