//! Threadline CLI - database migrations, catalog seeding and order tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations (shop schema and session store)
//! tl-cli migrate
//!
//! # Load categories, sizes and products from YAML
//! tl-cli seed catalog data/catalog.yaml
//!
//! # List unpaid card orders matching a customer
//! tl-cli orders list --unpaid --method card --search asha
//!
//! # Order detail with line items
//! tl-cli orders show 12
//!
//! # Flip the paid flag by hand
//! tl-cli orders mark-paid 12 13
//! tl-cli orders mark-unpaid 14
//! ```
//!
//! All commands read `SHOP_DATABASE_URL` (or `DATABASE_URL`) from the
//! environment or a `.env` file.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use threadline_core::PaymentMethod;

mod commands;

#[derive(Parser)]
#[command(name = "tl-cli")]
#[command(author, version, about = "Threadline CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the database from files
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Inspect and update orders
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert categories, sizes, products and stock from a YAML file
    Catalog {
        /// Path to the catalog YAML file
        file: String,
    },
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List orders, newest first
    List {
        /// Only paid orders
        #[arg(long, conflicts_with = "unpaid")]
        paid: bool,

        /// Only unpaid orders
        #[arg(long)]
        unpaid: bool,

        /// Payment method (`cod` or `card`)
        #[arg(short, long)]
        method: Option<PaymentMethod>,

        /// Match against customer name, mobile or email
        #[arg(short, long)]
        search: Option<String>,

        /// Maximum number of orders to show
        #[arg(short, long, default_value_t = 50)]
        limit: i64,
    },
    /// Show one order with its items
    Show {
        /// Order id
        id: i32,
    },
    /// Mark orders as paid
    MarkPaid {
        /// Order ids
        #[arg(required = true)]
        ids: Vec<i32>,
    },
    /// Mark orders as unpaid
    MarkUnpaid {
        /// Order ids
        #[arg(required = true)]
        ids: Vec<i32>,
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
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Catalog { file } => commands::seed::catalog(&file).await?,
        },
        Commands::Orders { action } => match action {
            OrdersAction::List {
                paid,
                unpaid,
                method,
                search,
                limit,
            } => {
                let paid = match (paid, unpaid) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                };
                commands::orders::list(paid, method, search, limit).await?;
            }
            OrdersAction::Show { id } => commands::orders::show(id).await?,
            OrdersAction::MarkPaid { ids } => commands::orders::set_paid(&ids, true).await?,
            OrdersAction::MarkUnpaid { ids } => commands::orders::set_paid(&ids, false).await?,
        },
    }
    Ok(())
}
