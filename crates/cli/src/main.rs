//! Food ordering CLI - sign in, browse, manage the cart and follow orders.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (password may also come from FOOD_PASSWORD)
//! food login -e asha@example.in
//!
//! # Browse
//! food restaurants
//! food menu 3
//! food search paneer
//!
//! # Cart
//! food cart add 42 -q 2
//! food cart set 7 3
//! food cart show
//!
//! # Place and follow an order
//! food checkout -a "12 MG Road, Bengaluru" -p online --wait
//! food orders track 1001
//! ```
//!
//! The session is kept in `FOOD_SESSION_FILE` between invocations.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use food_client::{ClientConfig, FoodClient};
use food_client_core::{CartLineId, Email, FoodItemId, OrderId, PaymentMethod, RestaurantId, Role};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "food")]
#[command(author, version, about = "Food ordering client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(short, long)]
        email: Email,

        #[arg(short, long, env = "FOOD_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account
    Signup {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: Email,

        #[arg(short, long, env = "FOOD_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long)]
        phone: Option<String>,

        /// Account role (`customer`, `owner`, `admin`)
        #[arg(short, long, default_value = "customer")]
        role: Role,
    },
    /// Confirm an account with the emailed one-time code
    VerifyOtp {
        #[arg(short, long)]
        email: Email,

        #[arg(short, long)]
        otp: String,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Update profile fields
    Profile {
        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        email: Option<Email>,

        #[arg(long)]
        phone: Option<String>,
    },
    /// List restaurants
    Restaurants,
    /// Show a restaurant's menu
    Menu { restaurant_id: RestaurantId },
    /// Search food items by name
    Search { name: String },
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Place an order for the current cart
    Checkout {
        /// Delivery address
        #[arg(short, long)]
        address: String,

        /// Notes for the restaurant
        #[arg(short, long)]
        notes: Option<String>,

        /// Payment method (`cod`, `online`)
        #[arg(short, long, default_value = "cod")]
        payment: PaymentMethod,

        /// Wait for an online payment to be confirmed
        #[arg(short, long)]
        wait: bool,
    },
    /// Order history and tracking
    Orders {
        #[command(subcommand)]
        action: OrderAction,
    },
    /// Online payments
    Pay {
        #[command(subcommand)]
        action: PayAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart with a price breakdown
    Show,
    /// Add a food item
    Add {
        food_item_id: FoodItemId,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set a line's quantity (below 1 removes it)
    Set {
        line_id: CartLineId,

        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a line
    Remove { line_id: CartLineId },
}

#[derive(Subcommand)]
enum OrderAction {
    /// List past orders
    List,
    /// Show one order
    Show { order_id: OrderId },
    /// Follow an order until it is delivered or cancelled
    Track { order_id: OrderId },
}

#[derive(Subcommand)]
enum PayAction {
    /// Get the payment page for an order
    Start { order_id: OrderId },
    /// Wait for an order's payment to be confirmed
    Verify { order_id: OrderId },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
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

    tracing::debug!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    // Logs go to stderr so command output on stdout stays clean
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(2);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    if let Err(e) = run(cli, config).await {
        tracing::debug!(error = ?e, "command failed");
        tracing::error!("Command failed: {}", e.user_message());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: ClientConfig) -> food_client::Result<()> {
    let client = FoodClient::from_config(config)?;
    client.start().await;

    match cli.command {
        Commands::Login { email, password } => {
            commands::auth::login(&client, email, password).await?;
        }
        Commands::Signup {
            name,
            email,
            password,
            phone,
            role,
        } => commands::auth::signup(&client, name, email, password, phone, role).await?,
        Commands::VerifyOtp { email, otp } => {
            commands::auth::verify_otp(&client, &email, &otp).await?;
        }
        Commands::Logout => commands::auth::logout(&client).await,
        Commands::Whoami => commands::auth::whoami(&client).await?,
        Commands::Profile { name, email, phone } => {
            commands::auth::profile(&client, name, email, phone).await?;
        }
        Commands::Restaurants => commands::catalog::restaurants(&client).await?,
        Commands::Menu { restaurant_id } => commands::catalog::menu(&client, restaurant_id).await?,
        Commands::Search { name } => commands::catalog::search(&client, &name).await?,
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&client).await?,
            CartAction::Add {
                food_item_id,
                quantity,
            } => commands::cart::add(&client, food_item_id, quantity).await?,
            CartAction::Set { line_id, quantity } => {
                commands::cart::set(&client, line_id, quantity).await?;
            }
            CartAction::Remove { line_id } => commands::cart::remove(&client, line_id).await?,
        },
        Commands::Checkout {
            address,
            notes,
            payment,
            wait,
        } => commands::orders::checkout(&client, address, notes, payment, wait).await?,
        Commands::Orders { action } => match action {
            OrderAction::List => commands::orders::list(&client).await?,
            OrderAction::Show { order_id } => commands::orders::show(&client, order_id).await?,
            OrderAction::Track { order_id } => commands::orders::track(&client, order_id).await?,
        },
        Commands::Pay { action } => match action {
            PayAction::Start { order_id } => commands::orders::pay(&client, order_id).await?,
            PayAction::Verify { order_id } => commands::orders::verify(&client, order_id).await,
        },
    }
    Ok(())
}
