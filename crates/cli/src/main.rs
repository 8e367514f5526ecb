//! Ginvoice CLI - drive the offline-first sync core from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in and pull the business snapshot
//! gv login -e owner@shop.com --pin 1234
//! gv pull
//!
//! # Rename the business (only changed fields are pushed)
//! gv profile set --name "Test Business Updated"
//!
//! # Record and void sales
//! gv sale create -p sneakers -u Pair -q 2 -c "Walk-in"
//! gv sale delete <transaction-id>
//!
//! # Profit and loss, all time or for a period
//! gv report --low-stock 5
//! gv report --period 7d
//! gv report --period 2026-10
//! ```
//!
//! # Commands
//!
//! - `status` - Show local state and connectivity
//! - `pull` - Replace the local snapshot with the server's
//! - `login` / `logout` - Manage the device session
//! - `profile set` - Edit business settings
//! - `sale`, `product`, `expense` - Record or delete business data
//! - `report` - Sales summary and low-stock list

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use ginvoice_sync::{LogFormat, ReportPeriod, SyncConfig};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "gv")]
#[command(author, version, about = "Ginvoice offline-first sync CLI")]
struct Cli {
    /// Treat the device as offline regardless of the reachability check
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show local state and connectivity
    Status,
    /// Pull the canonical snapshot from the server
    Pull,
    /// Push anything left stale by an interrupted sync
    Sync,
    /// Sign this device in
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Shop PIN
        #[arg(long, env = "GINVOICE_PIN", hide_env_values = true)]
        pin: String,
    },
    /// Forget all local data on this device
    Logout,
    /// Business settings
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Sales
    Sale {
        #[command(subcommand)]
        action: SaleAction,
    },
    /// Catalog
    Product {
        #[command(subcommand)]
        action: ProductAction,
    },
    /// Expenditures
    Expense {
        #[command(subcommand)]
        action: ExpenseAction,
    },
    /// Profit and loss summary
    Report {
        /// `all`, `today`, `<n>d` (today and the n-1 days before) or `YYYY-MM`
        #[arg(short, long, default_value = "all")]
        period: ReportPeriod,

        /// Also list products at or below this many base units
        #[arg(long)]
        low_stock: Option<Decimal>,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Change one or more business profile fields
    Set {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
}

#[derive(Subcommand)]
enum SaleAction {
    /// Record a single-line sale
    Create {
        /// Product id
        #[arg(short, long)]
        product: String,

        /// Unit to sell in (defaults to the base unit)
        #[arg(short, long)]
        unit: Option<String>,

        /// Quantity in the selected unit
        #[arg(short, long)]
        quantity: Decimal,

        #[arg(short, long, default_value = "Walk-in Customer")]
        customer: String,
    },
    /// Void a sale and return its stock
    Delete { id: String },
}

#[derive(Subcommand)]
enum ProductAction {
    /// Remove a product from the catalog
    Delete { id: String },
}

#[derive(Subcommand)]
enum ExpenseAction {
    /// Record an expenditure
    Record {
        #[arg(short, long)]
        amount: Decimal,

        #[arg(short, long, default_value = "General")]
        category: String,

        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Delete an expenditure
    Delete { id: String },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &SyncConfig) -> Option<sentry::ClientInitGuard> {
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
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing(config: &SyncConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ginvoice_sync=info,gv=info".into());

    let json = config.log_format == LogFormat::Json;
    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_target(false));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
#[allow(clippy::print_stderr)]
async fn main() {
    let cli = Cli::parse();

    let config = match SyncConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    // Sentry must be up before the subscriber so the layer has a client.
    let _sentry_guard = init_sentry(&config);
    init_tracing(&config);

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, &config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &SyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Commands::Report { period, low_stock } = cli.command {
        commands::report::print(config, period, low_stock).await?;
        return Ok(());
    }

    let workspace = commands::open(config, cli.offline).await?;

    match cli.command {
        Commands::Status => commands::session::status(&workspace).await,
        Commands::Pull => commands::session::pull(&workspace).await?,
        Commands::Sync => commands::session::sync(&workspace).await?,
        Commands::Login { email, pin } => {
            commands::session::login(&workspace, &config.session_file(), &email, pin).await?;
        }
        Commands::Logout => {
            commands::session::logout(&workspace, &config.session_file()).await?;
        }
        Commands::Profile { action } => match action {
            ProfileAction::Set {
                name,
                address,
                phone,
                email,
            } => {
                let edits = commands::settings::ProfileEdits {
                    name,
                    address,
                    phone,
                    email,
                };
                commands::settings::set(&workspace, edits).await?;
            }
        },
        Commands::Sale { action } => match action {
            SaleAction::Create {
                product,
                unit,
                quantity,
                customer,
            } => {
                commands::records::sell(&workspace, &product, unit.as_deref(), quantity, &customer)
                    .await?;
            }
            SaleAction::Delete { id } => commands::records::delete_sale(&workspace, &id).await?,
        },
        Commands::Product { action } => match action {
            ProductAction::Delete { id } => {
                commands::records::delete_product(&workspace, &id).await?;
            }
        },
        Commands::Expense { action } => match action {
            ExpenseAction::Record {
                amount,
                category,
                description,
            } => {
                commands::records::record_expense(&workspace, amount, &category, &description)
                    .await?;
            }
            ExpenseAction::Delete { id } => {
                commands::records::delete_expense(&workspace, &id).await?;
            }
        },
        Commands::Report { .. } => {}
    }
    Ok(())
}
