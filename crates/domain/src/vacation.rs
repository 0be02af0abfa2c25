//! Vacation periods and the calendar built from them
//!
//! The calendar is parsed once per run from a textual specification
//! (`VACATION_DATES`) and stays immutable afterwards. Membership is a union
//! test over the stored periods: overlapping or adjacent periods are kept
//! as-is, never merged.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::types::Booking;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive date range during which no booking should be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VacationPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl VacationPeriod {
    /// Single day when `start == end`.
    #[must_use]
    pub fn single(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of calendar days covered, bounds included.
    #[must_use]
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Set of vacation periods with point and batch membership queries.
#[derive(Debug, Clone, Default)]
pub struct VacationCalendar {
    periods: Vec<VacationPeriod>,
}

impl VacationCalendar {
    /// Parse a comma-separated specification of `DATE` and `START:END`
    /// tokens (ISO dates). Malformed tokens are skipped with a warning;
    /// parsing never fails.
    #[must_use]
    pub fn from_spec(spec: &str) -> Self {
        let mut periods = Vec::new();

        for token in spec.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }

            let parsed = match token.split_once(':') {
                Some((start, end)) => {
                    let start = NaiveDate::parse_from_str(start.trim(), DATE_FORMAT);
                    let end = NaiveDate::parse_from_str(end.trim(), DATE_FORMAT);
                    match (start, end) {
                        (Ok(start), Ok(end)) if start <= end => {
                            Some(VacationPeriod { start, end })
                        }
                        (Ok(start), Ok(end)) => {
                            warn!(token, %start, %end, "vacation range ends before it starts, skipping");
                            None
                        }
                        _ => None,
                    }
                }
                None => NaiveDate::parse_from_str(token, DATE_FORMAT)
                    .ok()
                    .map(VacationPeriod::single),
            };

            match parsed {
                Some(period) => periods.push(period),
                None => {
                    warn!(token, "skipping malformed vacation token, expected YYYY-MM-DD or YYYY-MM-DD:YYYY-MM-DD");
                }
            }
        }

        if !periods.is_empty() {
            info!(count = periods.len(), "vacation periods configured");
        }

        Self { periods }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    /// True iff the date falls within any stored period, bounds inclusive.
    #[must_use]
    pub fn is_vacation_day(&self, date: NaiveDate) -> bool {
        self.periods.iter().any(|p| p.contains(date))
    }

    /// Order-preserving subsequence of `dates` excluding vacation days.
    #[must_use]
    pub fn filter_out(&self, dates: &[NaiveDate]) -> Vec<NaiveDate> {
        if self.periods.is_empty() {
            return dates.to_vec();
        }

        let mut kept = Vec::with_capacity(dates.len());
        let mut excluded = 0usize;
        for &date in dates {
            if self.is_vacation_day(date) {
                excluded += 1;
                debug!(%date, "excluding vacation day from plan");
            } else {
                kept.push(date);
            }
        }

        if excluded > 0 {
            info!(excluded, "vacation days excluded from plan");
        }
        kept
    }

    /// Bookings whose date is a vacation day (auto-cancel candidates).
    #[must_use]
    pub fn bookings_to_cancel<'a>(&self, bookings: &'a [Booking]) -> Vec<&'a Booking> {
        if self.periods.is_empty() {
            return Vec::new();
        }
        bookings.iter().filter(|b| self.is_vacation_day(b.date)).collect()
    }

    /// Periods whose end is not before `today`.
    #[must_use]
    pub fn upcoming_periods(&self, today: NaiveDate) -> Vec<VacationPeriod> {
        self.periods.iter().copied().filter(|p| p.end >= today).collect()
    }

    /// Human-readable listing of upcoming periods for the CLI.
    #[must_use]
    pub fn summary(&self, today: NaiveDate) -> String {
        if self.periods.is_empty() {
            return "No vacation periods configured".to_string();
        }

        let upcoming = self.upcoming_periods(today);
        if upcoming.is_empty() {
            return "No upcoming vacation periods".to_string();
        }

        let mut lines = vec!["Upcoming vacation periods:".to_string()];
        for period in upcoming {
            if period.start == period.end {
                lines.push(format!("  - {}", period.start));
            } else {
                lines.push(format!(
                    "  - {} to {} ({} days)",
                    period.start,
                    period.end,
                    period.days()
                ));
            }
        }
        lines.join("\n")
    }
}
