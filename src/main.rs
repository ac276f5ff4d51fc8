use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use ulid::Ulid;

use slotledger::compactor;
use slotledger::config::{AppConfig, parse_slot_kind};
use slotledger::engine::Engine;
use slotledger::model::*;
use slotledger::store::{BookingStore, MemoryStore, QuoteCatalog, SlotStore, StaticDirectory};
use slotledger::time::Window;

#[derive(Parser)]
#[command(name = "slotledger", about = "Booking and availability ledger for a single-provider clinic")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Declare an open slot.
    AddSlot {
        date: NaiveDate,
        start: String,
        end: String,
        /// inHour, outOfHour or standard; derived from the window if omitted.
        #[arg(long)]
        kind: Option<String>,
    },
    /// Create a booking. Leave out both times for a full-day booking.
    Book {
        #[arg(long)]
        service: String,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        customer: Option<Ulid>,
        /// Create directly as confirmed.
        #[arg(long)]
        confirm: bool,
    },
    Confirm { id: Ulid },
    Cancel { id: Ulid },
    Delete { id: Ulid },
    /// Show slots and bookings on a date.
    List { date: NaiveDate },
    /// Report overlaps, orphaned slots and unbacked bookings on a date.
    Audit { date: NaiveDate },
    /// Rewrite the WAL now.
    Compact,
}

#[derive(Serialize)]
struct DayListing {
    slots: Vec<AvailabilitySlot>,
    bookings: Vec<Booking>,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();
    slotledger::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let store = Arc::new(MemoryStore::open(&config.wal_path())?);
    info!("data_dir: {}", config.data_dir.display());

    let engine = Engine::new(
        store.clone(),
        store.clone(),
        Arc::new(StaticDirectory::new()),
        Arc::new(QuoteCatalog::new(&config.quote_tag, &config.quote_services)),
        config.engine.clone(),
    );

    let background = tokio::spawn(compactor::run_compactor(
        store.clone(),
        config.compact_threshold,
        config.compact_interval,
    ));

    match cli.command {
        Command::AddSlot { date, start, end, kind } => {
            let window = Window::parse(&start, &end)?;
            let kind = match kind {
                Some(k) => Some(parse_slot_kind(&k).ok_or_else(|| format!("unknown slot kind: {k}"))?),
                None => None,
            };
            print_json(&engine.add_slot(date, window, kind).await?)?;
        }
        Command::Book { service, date, start, end, customer, confirm } => {
            let outcome = engine
                .create(NewBooking {
                    customer_id: customer.unwrap_or_else(Ulid::new),
                    service_name: service,
                    date,
                    window_start: start,
                    window_end: end,
                    status: if confirm { BookingStatus::Confirmed } else { BookingStatus::Pending },
                })
                .await?;
            if let Some(reason) = &outcome.downgraded {
                eprintln!("stored as pending: {reason}");
            }
            print_json(&outcome.booking)?;
        }
        Command::Confirm { id } => print_json(&engine.confirm(id).await?)?,
        Command::Cancel { id } => print_json(&engine.cancel(id).await?)?,
        Command::Delete { id } => print_json(&engine.delete(id).await?)?,
        Command::List { date } => {
            let slots = SlotStore::find(&*store, &SlotFilter::on(date)).await?;
            let bookings = BookingStore::find(&*store, &BookingFilter { date: Some(date), status: None }).await?;
            print_json(&DayListing { slots, bookings })?;
        }
        Command::Audit { date } => print_json(&engine.audit(date).await?)?,
        Command::Compact => {
            store.compact().await?;
            info!("WAL compacted");
        }
    }

    background.abort();
    compactor::compact_if_due(&store, config.compact_threshold).await;
    Ok(())
}
