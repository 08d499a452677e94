//! Innkeep CLI
//!
//! Operates the reservation coordinator against PostgreSQL. Results are
//! printed to stdout as JSON; logs go to stderr.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use innkeep_common::{
    BookingId, Money, PaymentMethod, ReservationError, RoomId, RoomStatus, StayRange, UserId,
};
use innkeep_coordinator::{CoordinatorConfig, ReservationCoordinator, ReserveRequest, RetryPolicy};
use innkeep_store::PgReservationStore;

#[derive(Parser, Debug)]
#[command(name = "innkeep")]
#[command(about = "Concurrent-safe hotel room reservations")]
struct Cli {
    /// PostgreSQL URL (overrides DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,

    /// Row lock timeout in milliseconds (overrides INNKEEP_LOCK_TIMEOUT_MS)
    #[arg(long)]
    lock_timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create tables and indexes
    Migrate,
    /// Add a room to the inventory
    AddRoom {
        /// Room number, e.g. "101"
        number: String,
        #[arg(long, default_value = "AVAILABLE", value_parser = parse_room_status)]
        status: RoomStatus,
    },
    /// Book a room and record its payment
    Reserve {
        #[arg(long)]
        room: i64,
        #[arg(long)]
        user: i64,
        /// First night, YYYY-MM-DD
        #[arg(long)]
        check_in: NaiveDate,
        /// Departure day, YYYY-MM-DD
        #[arg(long)]
        check_out: NaiveDate,
        #[arg(long)]
        amount: Decimal,
        #[arg(long, default_value = "CREDIT_CARD", value_parser = parse_payment_method)]
        method: PaymentMethod,
        /// Retry lock and pool timeouts with backoff
        #[arg(long)]
        retry: bool,
    },
    /// Cancel a booking and refund its payments
    Cancel {
        booking: i64,
        /// Retry lock and pool timeouts with backoff
        #[arg(long)]
        retry: bool,
    },
    /// Show a booking with its payments and audit trail
    ShowBooking { booking: i64 },
    /// Show a room with its bookings
    ShowRoom { room: i64 },
    /// Force a room into a status
    SetRoomStatus {
        room: i64,
        #[arg(value_parser = parse_room_status)]
        status: RoomStatus,
    },
}

fn parse_room_status(s: &str) -> Result<RoomStatus, String> {
    RoomStatus::parse(&s.to_ascii_uppercase()).map_err(|_| {
        format!("unknown room status '{s}' (expected available, occupied, maintenance or cleaning)")
    })
}

fn parse_payment_method(s: &str) -> Result<PaymentMethod, String> {
    PaymentMethod::parse(&s.to_ascii_uppercase().replace('-', "_")).map_err(|_| {
        format!(
            "unknown payment method '{s}' (expected credit-card, debit-card, paypal or bank-transfer)"
        )
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = CoordinatorConfig::from_env();
    if let Some(url) = cli.database_url.clone() {
        config.store.database_url = url;
    }
    if let Some(ms) = cli.lock_timeout_ms {
        config.store.lock_timeout = std::time::Duration::from_millis(ms);
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let store = PgReservationStore::connect(&config.store).await?;
    let coordinator = ReservationCoordinator::new(store);
    let retry = RetryPolicy::new(&config.retry);

    match run(&coordinator, &retry, cli.command).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            let output = json!({
                "error": e.error_code(),
                "message": e.to_string(),
                "retryable": e.is_retryable(),
            });
            eprintln!("{}", serde_json::to_string_pretty(&output)?);
            std::process::exit(if e.is_business_rejection() { 1 } else { 2 });
        }
    }
}

async fn run(
    coordinator: &ReservationCoordinator<PgReservationStore>,
    retry: &RetryPolicy,
    command: Command,
) -> Result<serde_json::Value, ReservationError> {
    let output = match command {
        Command::Migrate => {
            coordinator.store().migrate().await?;
            info!("Schema up to date");
            json!({ "migrated": true })
        }
        Command::AddRoom { number, status } => {
            json!(coordinator.add_room(&number, status).await?)
        }
        Command::Reserve {
            room,
            user,
            check_in,
            check_out,
            amount,
            method,
            retry: with_retry,
        } => {
            let request = ReserveRequest {
                room_id: RoomId::new(room),
                user_id: UserId::new(user),
                stay: StayRange::new(check_in, check_out)?,
                amount: Money::new(amount),
                payment_method: method,
            };
            let reservation = if with_retry {
                retry.run(move || coordinator.reserve(request.clone())).await?
            } else {
                coordinator.reserve(request).await?
            };
            json!(reservation)
        }
        Command::Cancel {
            booking,
            retry: with_retry,
        } => {
            let booking_id = BookingId::new(booking);
            let cancellation = if with_retry {
                retry.run(move || coordinator.cancel(booking_id)).await?
            } else {
                coordinator.cancel(booking_id).await?
            };
            json!(cancellation)
        }
        Command::ShowBooking { booking } => {
            let booking_id = BookingId::new(booking);
            json!({
                "booking": coordinator.booking(booking_id).await?,
                "payments": coordinator.payments_for_booking(booking_id).await?,
                "logs": coordinator.logs_for_booking(booking_id).await?,
            })
        }
        Command::ShowRoom { room } => {
            let room_id = RoomId::new(room);
            json!({
                "room": coordinator.room(room_id).await?,
                "bookings": coordinator.bookings_for_room(room_id).await?,
            })
        }
        Command::SetRoomStatus { room, status } => {
            json!(
                coordinator
                    .override_room_status(RoomId::new(room), status)
                    .await?
            )
        }
    };
    Ok(output)
}
