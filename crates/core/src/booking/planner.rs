//! Recurring reservation planning and execution
//!
//! A planner instance lives for exactly one run: it computes the target date
//! set from the weekday/week grid, filters vacation days, resolves the desk
//! ranking once, then drives sequential per-date booking attempts with
//! candidate failover.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Local, NaiveDate, Weekday};
use deskbot_domain::{
    BookOutcome, DeskCandidate, DeskbotError, Moment, Result, RunStatistics, VacationCalendar,
};
use tracing::{info, warn};

use super::ports::BookingGateway;

/// Fixed pause between dates so a run does not burst the remote API.
const DEFAULT_PACING: Duration = Duration::from_millis(500);

/// Observable run phase. A planner never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Planning,
    Executing,
    Done,
    DoneWithErrors,
}

/// Result of one recurring run: the counters plus the dates that gained a
/// new booking (carried separately so notifications can list them).
#[derive(Debug, Clone, Default)]
pub struct PlanOutcome {
    pub statistics: RunStatistics,
    pub created_dates: Vec<NaiveDate>,
}

/// Drives one recurring booking run. Construct fresh per invocation; no
/// state survives a run.
pub struct ReservationPlanner {
    gateway: Arc<dyn BookingGateway>,
    calendar: VacationCalendar,
    pacing: Duration,
    phase: RunPhase,
}

impl ReservationPlanner {
    #[must_use]
    pub fn new(gateway: Arc<dyn BookingGateway>, calendar: VacationCalendar) -> Self {
        Self { gateway, calendar, pacing: DEFAULT_PACING, phase: RunPhase::Idle }
    }

    /// Override the inter-date pacing delay (tests set zero).
    #[must_use]
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    #[must_use]
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Book the configured weekdays for the next `weeks_ahead` weeks,
    /// starting from today.
    ///
    /// # Errors
    /// Returns `DeskbotError::Auth` when authentication is exhausted
    /// mid-run (terminal), or `DeskbotError::NotFound` when no desk
    /// candidate can be resolved at all. Per-date failures are not errors;
    /// they land in the statistics.
    pub async fn book_recurring(
        &mut self,
        days_of_week: &[Weekday],
        weeks_ahead: u32,
    ) -> Result<PlanOutcome> {
        let today = Local::now().date_naive();
        self.book_recurring_from(today, days_of_week, weeks_ahead).await
    }

    /// Same as [`book_recurring`](Self::book_recurring) with an explicit
    /// "today" for deterministic planning.
    pub async fn book_recurring_from(
        &mut self,
        today: NaiveDate,
        days_of_week: &[Weekday],
        weeks_ahead: u32,
    ) -> Result<PlanOutcome> {
        self.phase = RunPhase::Planning;
        let mut outcome = PlanOutcome::default();

        let targets = plan_dates(today, days_of_week, weeks_ahead);
        let targets = self.calendar.filter_out(&targets);
        if targets.is_empty() {
            info!("nothing to book: empty plan");
            self.phase = RunPhase::Done;
            return Ok(outcome);
        }

        // One ranking snapshot per run: every date targets the same list.
        let candidates = self.gateway.favorite_desks().await?;
        if candidates.is_empty() {
            self.phase = RunPhase::DoneWithErrors;
            return Err(DeskbotError::NotFound(
                "no favorite desk and no booking history to rank desks from".into(),
            ));
        }

        info!(
            dates = targets.len(),
            candidates = candidates.len(),
            first_choice = %candidates[0].display_name,
            "executing booking plan"
        );

        self.phase = RunPhase::Executing;
        for (index, &date) in targets.iter().enumerate() {
            if index > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }

            let result = book_with_failover(self.gateway.as_ref(), &candidates, date).await?;
            if result == BookOutcome::Created {
                outcome.created_dates.push(date);
            }
            outcome.statistics.record(result);
        }

        let stats = outcome.statistics;
        info!(
            created = stats.created,
            already_existed = stats.already_existed,
            failed = stats.failed,
            "booking run finished"
        );

        self.phase = if stats.has_failures() { RunPhase::DoneWithErrors } else { RunPhase::Done };
        Ok(outcome)
    }
}

/// Try candidates most-preferred first for one date; stop at the first
/// settled outcome. A candidate's hard failure falls through to the next
/// one; exhausting the list yields `Failed` without aborting the run.
///
/// # Errors
/// Only `DeskbotError::Auth` propagates: a rejected token is terminal for
/// the whole run, everything else is a per-candidate failure.
pub async fn book_with_failover(
    gateway: &dyn BookingGateway,
    candidates: &[DeskCandidate],
    date: NaiveDate,
) -> Result<BookOutcome> {
    for candidate in candidates {
        match gateway.book_desk(candidate, date, &Moment::full_day()).await {
            Ok(BookOutcome::Failed) => {
                warn!(%date, desk = %candidate.display_name, "candidate failed, trying next");
            }
            Ok(outcome) => {
                info!(%date, desk = %candidate.display_name, ?outcome, "date settled");
                return Ok(outcome);
            }
            Err(err @ DeskbotError::Auth(_)) => return Err(err),
            Err(err) => {
                warn!(%date, desk = %candidate.display_name, error = %err, "candidate errored, trying next");
            }
        }
    }

    warn!(%date, "all candidates exhausted for date");
    Ok(BookOutcome::Failed)
}

/// Compute the target dates for a weekday/week grid.
///
/// For each week `w` and weekday `d`, the date is the next occurrence of
/// `d` strictly after `today`, shifted by `w` weeks: an offset of 0 is
/// always pushed to 7, so the current day is never part of a plan. Output
/// is de-duplicated and strictly increasing.
#[must_use]
pub fn plan_dates(today: NaiveDate, days_of_week: &[Weekday], weeks_ahead: u32) -> Vec<NaiveDate> {
    let today_index = i64::from(today.weekday().number_from_monday());

    let mut dates = BTreeSet::new();
    for week in 0..i64::from(weeks_ahead) {
        for &day in days_of_week {
            let mut offset =
                (i64::from(day.number_from_monday()) - today_index).rem_euclid(7);
            if offset == 0 {
                offset = 7;
            }
            dates.insert(today + chrono::Duration::days(offset + week * 7));
        }
    }
    dates.into_iter().collect()
}
