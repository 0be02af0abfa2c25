//! Top-level booking orchestration
//!
//! `BookingService` sequences one invocation: connect, optionally cancel
//! bookings overlapping vacations, plan and book, report. Collaborators are
//! injected at construction and live for one process run.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use deskbot_domain::{
    BookOutcome, Booking, DeskbotError, ReservationConfig, Result, VacationCalendar,
};
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use super::planner::{book_with_failover, PlanOutcome, ReservationPlanner};
use super::ports::{BookingGateway, Notifier};

/// Look-ahead window when scanning existing bookings (vacation auto-cancel,
/// the bookings listing).
const UPCOMING_WINDOW_DAYS: u32 = 90;

/// Orchestrates booking runs against injected collaborators.
pub struct BookingService {
    gateway: Arc<dyn BookingGateway>,
    notifier: Arc<dyn Notifier>,
    calendar: VacationCalendar,
    reservation: ReservationConfig,
    auto_cancel_vacations: bool,
    pacing: Duration,
    identity: OnceCell<String>,
}

impl BookingService {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn BookingGateway>,
        notifier: Arc<dyn Notifier>,
        calendar: VacationCalendar,
        reservation: ReservationConfig,
        auto_cancel_vacations: bool,
    ) -> Self {
        Self {
            gateway,
            notifier,
            calendar,
            reservation,
            auto_cancel_vacations,
            pacing: Duration::from_millis(500),
            identity: OnceCell::new(),
        }
    }

    /// Override the planner's inter-date pacing delay (tests set zero).
    #[must_use]
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Establish the session: verify the token once per service lifetime.
    ///
    /// # Errors
    /// Returns `DeskbotError::Auth` when the token is rejected and cannot
    /// be refreshed.
    pub async fn connect(&self) -> Result<&str> {
        let user_id = self
            .identity
            .get_or_try_init(|| async {
                let user_id = self.gateway.verify_identity().await?;
                info!(%user_id, "authenticated against booking platform");
                Ok::<_, DeskbotError>(user_id)
            })
            .await?;
        Ok(user_id.as_str())
    }

    /// Book one specific date against the favorite-desk fallback list.
    ///
    /// Vacation dates are refused unless `force` is set.
    ///
    /// # Errors
    /// `InvalidInput` for a refused vacation date, `NotFound` when no desk
    /// candidate exists, `Auth` on terminal authentication failure.
    pub async fn book_single(&self, date: NaiveDate, force: bool) -> Result<BookOutcome> {
        self.connect().await?;

        if self.calendar.is_vacation_day(date) {
            if !force {
                return Err(DeskbotError::InvalidInput(format!(
                    "{date} falls within a configured vacation period; pass --force to book anyway"
                )));
            }
            warn!(%date, "booking a vacation date because --force was given");
        }

        let candidates = self.gateway.favorite_desks().await?;
        if candidates.is_empty() {
            return Err(DeskbotError::NotFound(
                "no favorite desk and no booking history to rank desks from".into(),
            ));
        }

        let outcome = book_with_failover(self.gateway.as_ref(), &candidates, date).await?;
        match outcome {
            BookOutcome::Created => info!(%date, "booking created"),
            BookOutcome::AlreadyExisted => info!(%date, "already booked, nothing to do"),
            BookOutcome::Failed => warn!(%date, "could not book any candidate"),
        }
        Ok(outcome)
    }

    /// Full recurring run: connect, auto-cancel vacation bookings when
    /// enabled, plan and book, then report.
    ///
    /// A success notification goes out only when the run created at least
    /// one new booking; idempotent no-ops alone stay silent.
    ///
    /// # Errors
    /// `Auth` on terminal authentication failure, `NotFound` when no desk
    /// candidate can be resolved. Per-date failures are reflected in the
    /// returned statistics, never as an error.
    pub async fn run_recurring(&self, weeks: Option<u32>) -> Result<PlanOutcome> {
        self.connect().await?;

        let weeks = weeks.unwrap_or(self.reservation.recurring_weeks);

        if self.auto_cancel_vacations && !self.calendar.is_empty() {
            self.cancel_vacation_bookings().await?;
        }

        let mut planner =
            ReservationPlanner::new(self.gateway.clone(), self.calendar.clone())
                .with_pacing(self.pacing);
        let outcome = planner.book_recurring(&self.reservation.days_of_week, weeks).await?;

        let stats = outcome.statistics;
        if stats.created > 0 {
            self.notifier
                .send_booking_success(stats.created, weeks, &outcome.created_dates)
                .await;
        }

        Ok(outcome)
    }

    /// Cancel existing bookings that fall inside vacation periods,
    /// continuing past individual cancellation failures.
    ///
    /// # Errors
    /// Only the initial bookings fetch can fail; per-booking cancellation
    /// failures are logged and skipped.
    pub async fn cancel_vacation_bookings(&self) -> Result<Vec<Booking>> {
        let today = Local::now().date_naive();
        let window: Vec<NaiveDate> = (0..UPCOMING_WINDOW_DAYS)
            .map(|i| today + chrono::Duration::days(i64::from(i)))
            .collect();

        let bookings = self.gateway.bookings_for_dates(&window).await?;
        let to_cancel: Vec<Booking> = self
            .calendar
            .bookings_to_cancel(&bookings)
            .into_iter()
            .filter(|b| b.active)
            .cloned()
            .collect();

        if to_cancel.is_empty() {
            return Ok(Vec::new());
        }

        info!(count = to_cancel.len(), "cancelling bookings that fall on vacation days");

        let mut cancelled = Vec::new();
        for booking in to_cancel {
            match self.gateway.cancel_booking(&booking.id).await {
                Ok(true) => {
                    info!(booking_id = %booking.id, date = %booking.date, "booking cancelled");
                    cancelled.push(booking);
                }
                Ok(false) => {
                    warn!(booking_id = %booking.id, date = %booking.date, "platform refused cancellation");
                }
                Err(err) => {
                    error!(booking_id = %booking.id, date = %booking.date, error = %err, "cancellation failed");
                }
            }
        }

        if !cancelled.is_empty() {
            self.notifier.send_vacation_cancellation(&cancelled).await;
        }
        Ok(cancelled)
    }

    /// Upcoming active bookings, sorted by date, for the CLI listing.
    ///
    /// # Errors
    /// Propagates gateway failures.
    pub async fn show_bookings(&self) -> Result<Vec<Booking>> {
        self.connect().await?;

        let today = Local::now().date_naive();
        let window: Vec<NaiveDate> = (0..UPCOMING_WINDOW_DAYS)
            .map(|i| today + chrono::Duration::days(i64::from(i)))
            .collect();

        let mut bookings: Vec<Booking> = self
            .gateway
            .bookings_for_dates(&window)
            .await?
            .into_iter()
            .filter(|b| b.active)
            .collect();
        bookings.sort_by_key(|b| b.date);
        Ok(bookings)
    }

    /// Send the daily digest of today's bookings.
    ///
    /// # Errors
    /// Propagates gateway failures; notification delivery itself never
    /// fails the call.
    pub async fn daily_reminder(&self) -> Result<()> {
        self.connect().await?;

        let today = Local::now().date_naive();
        let bookings: Vec<Booking> = self
            .gateway
            .bookings_for_dates(&[today])
            .await?
            .into_iter()
            .filter(|b| b.active)
            .collect();

        self.notifier.send_daily_reminder(&bookings).await;
        Ok(())
    }

    /// The vacation calendar this service was configured with.
    #[must_use]
    pub fn calendar(&self) -> &VacationCalendar {
        &self.calendar
    }
}
