//! JDP CLI - drive the client SDK from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Browse the catalog, filtered and sorted
//! jdp catalog --collection lingots --sort price-asc
//!
//! # Manage the shop cart
//! jdp cart add ref-napoleon-20f
//! jdp cart list
//!
//! # Sign in and show the current user
//! jdp login -e camille@example.fr -p secret123
//! jdp whoami
//!
//! # Create a payment intent for the cart or a one-click plan
//! jdp checkout init shop
//! jdp checkout init oneclick --plan premium
//! ```
//!
//! Configuration comes from the `JDP_*` environment variables (see
//! `jdp_client::config`). Set `JDP_MOCK=true` to run against fixtures.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use jdp_client::{AppState, ClientConfig};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "jdp")]
#[command(author, version, about = "JDP client command line")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List shop references
    Catalog {
        /// Only references in this collection
        #[arg(short, long)]
        collection: Option<String>,

        /// Sort order (`default`, `price-asc`, `price-desc`, `name-asc`, `name-desc`, `newest`)
        #[arg(short, long, default_value = "default")]
        sort: String,

        /// Ignore the cached catalog
        #[arg(long)]
        refresh: bool,
    },
    /// List subscription plans
    Plans,
    /// Manage the shop cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Sign in
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },
    /// Sign out and forget every user-scoped state
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List news
    News {
        /// `article`, `video` or `brief`
        #[arg(short, long)]
        kind: Option<String>,

        /// Load every page up to this one
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },
    /// List webinars and replays
    Webinars,
    /// Manage news bookmarks
    Bookmarks {
        #[command(subcommand)]
        action: BookmarkAction,
    },
    /// Payment intents
    Checkout {
        #[command(subcommand)]
        action: CheckoutAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart and its totals
    List,
    /// Add a reference by id
    Add { id: String },
    /// Remove a reference by id
    Remove { id: String },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum BookmarkAction {
    /// List bookmarked slugs
    List,
    /// Bookmark or un-bookmark a news slug
    Toggle { slug: String },
}

#[derive(Subcommand)]
enum CheckoutAction {
    /// Create the provider intent for a basket
    Init {
        #[command(subcommand)]
        basket: CheckoutBasket,
    },
}

#[derive(Subcommand)]
enum CheckoutBasket {
    /// Pay the shop cart
    Shop,
    /// Subscribe to a plan in one click
    Oneclick {
        #[arg(short, long)]
        plan: String,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
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

fn init_tracing() {
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "jdp_client=info,jdp_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Configuration is needed for Sentry, which must start before tracing.
    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::new(config)?;

    match cli.command {
        Commands::Catalog {
            collection,
            sort,
            refresh,
        } => commands::shop::catalog(&state, collection.as_deref(), &sort, refresh).await?,
        Commands::Plans => commands::shop::plans(&state).await?,
        Commands::Cart { action } => match action {
            CartAction::List => commands::shop::cart_list(&state),
            CartAction::Add { id } => commands::shop::cart_add(&state, &id).await?,
            CartAction::Remove { id } => commands::shop::cart_remove(&state, &id),
            CartAction::Clear => commands::shop::cart_clear(&state),
        },
        Commands::Login { email, password } => {
            commands::account::login(&state, &email, password.into()).await?;
        }
        Commands::Logout => commands::account::logout(&state).await,
        Commands::Whoami => commands::account::whoami(&state).await?,
        Commands::News { kind, page } => commands::content::news(&state, kind.as_deref(), page).await?,
        Commands::Webinars => commands::content::webinars(&state).await?,
        Commands::Bookmarks { action } => match action {
            BookmarkAction::List => commands::content::bookmarks(&state).await?,
            BookmarkAction::Toggle { slug } => commands::content::toggle_bookmark(&state, &slug).await?,
        },
        Commands::Checkout {
            action: CheckoutAction::Init { basket },
        } => match basket {
            CheckoutBasket::Shop => commands::checkout::init_shop(&state).await?,
            CheckoutBasket::Oneclick { plan } => commands::checkout::init_oneclick(&state, &plan).await?,
        },
    }
    Ok(())
}
