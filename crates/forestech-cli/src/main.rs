//! Forestech CLI - operator front end for the Forestech backend services.
//!
//! Wires the core library the same way the desktop shell does: one API
//! instance, a background startup probe, and a console stand-in for the
//! notification surface.

mod console;
mod handlers;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use forestech_core::models::MovementType;
use forestech_core::{BackendConfig, ForestechApi};
use tracing::{debug, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "forestech")]
#[command(about = "Command-line client for the Forestech backend services")]
struct Args {
    /// Gateway URL (overrides FORESTECH_API_URL)
    #[arg(long, global = true)]
    gateway: Option<String>,

    /// Print records as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe the backend health endpoint
    Health,

    /// List the records of a resource
    List {
        resource: Resource,

        /// Free-text search (products and vehicles only)
        #[arg(long)]
        search: Option<String>,

        /// Movement type filter (movements only)
        #[arg(long = "type", value_enum)]
        movement_type: Option<MovementKind>,
    },

    /// Show the stock of a product
    Stock {
        product_id: String,

        /// Include the weighted average price
        #[arg(long)]
        valued: bool,
    },

    /// Cancel an invoice
    CancelInvoice { id: String },

    /// Follow connection status and notifications until Ctrl-C
    Watch,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Resource {
    Products,
    Vehicles,
    Suppliers,
    Movements,
    Invoices,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum MovementKind {
    Entrada,
    Salida,
}

impl From<MovementKind> for MovementType {
    fn from(kind: MovementKind) -> Self {
        match kind {
            MovementKind::Entrada => MovementType::Entrada,
            MovementKind::Salida => MovementType::Salida,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase())),
        )
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let config = match &args.gateway {
        Some(gateway) => BackendConfig::for_gateway(gateway)?,
        None => BackendConfig::from_env()?,
    };
    debug!("Gateway: {}", config.gateway_url);

    let api = ForestechApi::builder().config(config).build().await?;
    let mut feed = api
        .take_notification_feed()
        .ok_or_else(|| anyhow::anyhow!("notification feed already taken"))?;

    let outcome = match args.command {
        Command::Health => handlers::health(&api).await,
        Command::List {
            resource,
            search,
            movement_type,
        } => {
            handlers::list(
                &api,
                resource,
                search.as_deref(),
                movement_type.map(Into::into),
                args.json,
            )
            .await
        }
        Command::Stock { product_id, valued } => {
            handlers::stock(&api, &product_id, valued, args.json).await
        }
        Command::CancelInvoice { id } => handlers::cancel_invoice(&api, &id).await,
        Command::Watch => return handlers::watch(&api, feed).await,
    };

    console::flush_notifications(&mut feed);
    outcome
}
