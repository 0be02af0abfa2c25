//! deskbot - unattended desk reservation bot
//!
//! Command-line entry point: parses arguments, loads and validates the
//! configuration, wires the application context and dispatches to the
//! requested mode.

mod context;

use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{Local, NaiveDate};
use clap::Parser;
use deskbot_core::BookingService;
use deskbot_domain::{BookOutcome, Booking};
use deskbot_infra::scheduling::BookingSchedulerConfig;
use deskbot_infra::BookingScheduler;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::context::AppContext;

#[derive(Debug, Parser)]
#[command(
    name = "deskbot",
    version,
    about = "Unattended desk reservation for a flex-office booking platform",
    after_help = "Without options, books a desk RESERVATION_DAYS_AHEAD days out and lists \
                  upcoming bookings."
)]
struct Cli {
    /// Run as a daemon: daily booking job plus optional reminder
    #[arg(long, conflicts_with_all = ["show", "recurring", "date"])]
    schedule: bool,

    /// List upcoming bookings and vacation periods
    #[arg(long, conflicts_with_all = ["recurring", "date"])]
    show: bool,

    /// Book the configured weekdays for the coming weeks
    /// (default horizon: RECURRING_WEEKS)
    #[arg(long, value_name = "WEEKS", num_args = 0..=1, conflicts_with = "date")]
    recurring: Option<Option<u32>>,

    /// Book one specific date
    #[arg(long, value_name = "YYYY-MM-DD")]
    date: Option<NaiveDate>,

    /// Book even when the date falls within a vacation period
    #[arg(long, requires = "date")]
    force: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging first so configuration loading is visible
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // A missing .env is fine; the config loader probes its own paths
    if let Ok(path) = dotenvy::dotenv() {
        info!(path = %path.display(), "loaded .env");
    }

    let cli = Cli::parse();

    let config = deskbot_infra::config::load().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    let ctx = AppContext::new(&config).context("failed to initialize")?;

    if cli.schedule {
        return run_daemon(&config, ctx.service).await;
    }

    if cli.show {
        show_bookings(&ctx.service).await?;
        return Ok(());
    }

    if let Some(weeks) = cli.recurring {
        run_recurring(&ctx.service, weeks).await?;
        show_bookings(&ctx.service).await?;
        return Ok(());
    }

    // Single-date booking: an explicit --date or the configured days-ahead
    let date = cli.date.unwrap_or_else(|| {
        Local::now().date_naive() + chrono::Duration::days(i64::from(config.reservation.days_ahead))
    });
    book_single(&ctx.service, date, cli.force).await?;
    show_bookings(&ctx.service).await?;
    Ok(())
}

async fn book_single(
    service: &Arc<BookingService>,
    date: NaiveDate,
    force: bool,
) -> anyhow::Result<()> {
    match service.book_single(date, force).await? {
        BookOutcome::Created => println!("Booked a desk for {date}"),
        BookOutcome::AlreadyExisted => println!("{date} is already booked, nothing to do"),
        BookOutcome::Failed => bail!("could not book any desk for {date}"),
    }
    Ok(())
}

async fn run_recurring(
    service: &Arc<BookingService>,
    weeks: Option<u32>,
) -> anyhow::Result<()> {
    let outcome = service.run_recurring(weeks).await?;
    let stats = outcome.statistics;

    println!("Summary:");
    println!("  created:         {}", stats.created);
    println!("  already existed: {}", stats.already_existed);
    println!("  failed:          {}", stats.failed);
    Ok(())
}

async fn show_bookings(service: &Arc<BookingService>) -> anyhow::Result<()> {
    let bookings = service.show_bookings().await?;

    if bookings.is_empty() {
        println!("No upcoming bookings");
    } else {
        println!("Upcoming bookings ({}):", bookings.len());
        for booking in &bookings {
            println!("  {}", format_booking(booking));
        }
    }

    let today = Local::now().date_naive();
    println!("{}", service.calendar().summary(today));
    Ok(())
}

fn format_booking(booking: &Booking) -> String {
    let desk = booking.desk.as_ref().and_then(|d| d.name.as_deref()).unwrap_or("unknown desk");
    let space = booking
        .space
        .as_ref()
        .and_then(|s| s.name.as_deref())
        .map(|name| format!(" - {name}"))
        .unwrap_or_default();
    format!("{} ({}): {desk}{space}", booking.date, booking.moment)
}

async fn run_daemon(
    config: &deskbot_domain::BotConfig,
    service: Arc<BookingService>,
) -> anyhow::Result<()> {
    info!(
        booking_time = %config.reservation.time,
        "starting scheduler, press Ctrl+C to stop"
    );

    let scheduler_config = BookingSchedulerConfig {
        booking_time: config.reservation.time,
        reminder_time: config.notification.daily_reminder_time,
        ..Default::default()
    };

    let mut scheduler = BookingScheduler::with_config(scheduler_config, service);
    scheduler.start().await.context("failed to start scheduler")?;
    scheduler.run_until_interrupted().await.context("scheduler did not stop cleanly")?;
    Ok(())
}
