use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use storefront_pipeline::application::delivery::DeliveryOrchestrator;
use storefront_pipeline::application::orders::OrderReader;
use storefront_pipeline::application::payments::PaymentMonitor;
use storefront_pipeline::application::tracking::TrackingDispatcher;
use storefront_pipeline::config::Settings;
use storefront_pipeline::domain::ports::Backend;
use storefront_pipeline::domain::product::SerialKey;
use storefront_pipeline::infrastructure::in_memory::InMemoryStore;
use storefront_pipeline::infrastructure::notifier::LogNotifier;
use storefront_pipeline::infrastructure::webhook::WebhookDeliveryClient;
use storefront_pipeline::interfaces::csv::serial_reader::SerialReader;
use storefront_pipeline::interfaces::fixture::Fixture;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// JSON file with products, variants, orders, serials and payments to seed the store with
    #[arg(long, global = true)]
    fixture: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Report the on-chain status of a receive address
    Track {
        #[arg(long)]
        currency: String,
        #[arg(long)]
        address: String,
        /// Ignore confirmed transactions older than this unix timestamp
        #[arg(long)]
        since: Option<i64>,
    },
    /// Deliver a paid order
    Deliver {
        #[arg(long)]
        order: Uuid,
    },
    /// Re-run delivery for an order that has none
    Retrigger {
        #[arg(long)]
        order: Uuid,
    },
    /// Poll a crypto payment once and deliver when it confirms
    CheckPayment {
        #[arg(long)]
        payment: Uuid,
    },
    /// Import serial keys from a `serial[,variant_id]` CSV file
    ImportSerials {
        #[arg(long)]
        product: Uuid,
        #[arg(long)]
        variant: Option<Uuid>,
        input: PathBuf,
    },
}

#[derive(Serialize)]
struct ImportReport {
    imported: usize,
    available: usize,
}

fn open_backend(db_path: Option<PathBuf>) -> Result<Backend> {
    #[cfg(feature = "storage-rocksdb")]
    if let Some(db_path) = db_path {
        let store = storefront_pipeline::infrastructure::rocksdb::RocksDBStore::open(db_path)
            .into_diagnostic()?;
        return Ok(Backend::from_store(store));
    }

    #[cfg(not(feature = "storage-rocksdb"))]
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }

    Ok(Backend::from_store(InMemoryStore::new()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env().into_diagnostic()?;

    let backend = open_backend(cli.db_path)?;
    if let Some(path) = cli.fixture {
        let file = File::open(path).into_diagnostic()?;
        Fixture::from_reader(file)
            .into_diagnostic()?
            .seed(&backend)
            .await
            .into_diagnostic()?;
    }

    let orchestrator = || -> Result<DeliveryOrchestrator> {
        let fulfiller = WebhookDeliveryClient::new(&settings.delivery).into_diagnostic()?;
        Ok(DeliveryOrchestrator::new(
            backend.clone(),
            Arc::new(fulfiller),
            Arc::new(LogNotifier),
            settings.delivery.clone(),
        ))
    };

    match cli.command {
        Command::Track {
            currency,
            address,
            since,
        } => {
            let dispatcher =
                TrackingDispatcher::from_settings(&settings.tracker).into_diagnostic()?;
            let status = dispatcher.track_address_status(&address, &currency, since).await;
            print_json(&status)?;
        }
        Command::Deliver { order } => {
            let outcome = orchestrator()?.deliver_product(order).await.into_diagnostic()?;
            print_json(&outcome)?;
        }
        Command::Retrigger { order } => {
            let outcome = orchestrator()?.retrigger_delivery(order).await.into_diagnostic()?;
            print_json(&outcome)?;
        }
        Command::CheckPayment { payment } => {
            let dispatcher =
                TrackingDispatcher::from_settings(&settings.tracker).into_diagnostic()?;
            let monitor = PaymentMonitor::new(
                backend.payments.clone(),
                backend.orders.clone(),
                OrderReader::new(backend.orders.clone(), settings.order_ttl),
                Arc::new(dispatcher),
                Arc::new(orchestrator()?),
            );
            let check = monitor.check_payment(payment).await.into_diagnostic()?;
            print_json(&check)?;
        }
        Command::ImportSerials {
            product,
            variant,
            input,
        } => {
            let file = File::open(input).into_diagnostic()?;
            let serials: Vec<SerialKey> = SerialReader::new(file)
                .serials(product, variant)
                .collect::<Result<_, _>>()
                .into_diagnostic()?;
            let imported = backend.inventory.add_serials(serials).await.into_diagnostic()?;
            let available = backend
                .inventory
                .available_serials(product, variant)
                .await
                .into_diagnostic()?;
            print_json(&ImportReport { imported, available })?;
        }
    }

    Ok(())
}
