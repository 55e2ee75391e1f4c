//! Orderdesk CLI - Database migrations and fulfillment tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! od-cli migrate
//!
//! # Move an order to the next fulfillment status
//! od-cli orders set-status 42 processing
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `orders set-status` - Advance an order along its fulfillment path

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use orderdesk_core::{OrderId, OrderStatus};

mod commands;

#[derive(Parser)]
#[command(name = "od-cli")]
#[command(author, version, about = "Orderdesk CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Manage orders
    Orders {
        #[command(subcommand)]
        action: OrderAction,
    },
}

#[derive(Subcommand)]
enum OrderAction {
    /// Advance an order to its next status (processing, shipped, delivered)
    SetStatus {
        /// Order ID
        order_id: OrderId,

        /// Target status
        status: OrderStatus,
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
        Commands::Orders { action } => match action {
            OrderAction::SetStatus { order_id, status } => {
                commands::orders::set_status(order_id, status).await?;
            }
        },
    }
    Ok(())
}
