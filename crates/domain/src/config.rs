//! Application configuration structures
//!
//! Loaded by the infra config loader from environment variables or a flat
//! key=value file; validated once at startup before anything talks to the
//! network.

use chrono::{NaiveTime, Weekday};

use crate::errors::{DeskbotError, Result};

/// Complete bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub api: ApiConfig,
    pub auth: AuthConfig,
    pub reservation: ReservationConfig,
    pub vacation: VacationConfig,
    pub notification: NotificationConfig,
}

/// Remote platform endpoint and optional location filters.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base API URL, e.g. `https://booking.example.com/api`
    pub base_url: String,
    pub site_id: Option<String>,
    pub floor_id: Option<String>,
    pub zone_id: Option<String>,
}

/// Credentials as loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// Reservation timing parameters.
#[derive(Debug, Clone)]
pub struct ReservationConfig {
    /// Daily execution time for the scheduled job
    pub time: NaiveTime,
    /// Days ahead for the single-booking mode
    pub days_ahead: u32,
    /// Weekdays targeted by recurring runs
    pub days_of_week: Vec<Weekday>,
    /// Horizon of a recurring run, in weeks
    pub recurring_weeks: u32,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            time: NaiveTime::from_hms_opt(9, 0, 0).expect("valid default time"),
            days_ahead: 7,
            days_of_week: Vec::new(),
            recurring_weeks: 4,
        }
    }
}

/// Vacation handling parameters.
#[derive(Debug, Clone, Default)]
pub struct VacationConfig {
    /// Raw `DATE` / `START:END` comma list, parsed into a `VacationCalendar`
    pub dates: String,
    /// Cancel existing bookings that fall inside vacation periods
    pub auto_cancel: bool,
}

/// Operator notification parameters.
#[derive(Debug, Clone, Default)]
pub struct NotificationConfig {
    pub webhook_url: Option<String>,
    /// When set, the daemon registers a separate daily-reminder job
    pub daily_reminder_time: Option<NaiveTime>,
}

impl BotConfig {
    /// Fail-fast startup validation.
    ///
    /// # Errors
    /// Returns `DeskbotError::Config` with a corrective message when the
    /// token or base URL is missing. Malformed vacation tokens are NOT
    /// checked here; the calendar skips them individually with a warning.
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(DeskbotError::Config(
                "DESKBOT_BASE_URL is not set; point it at the platform API root".into(),
            ));
        }

        match self.auth.access_token.as_deref() {
            Some(token) if !token.trim().is_empty() => {}
            _ => {
                return Err(DeskbotError::Config(
                    "DESKBOT_TOKEN is not set; obtain one via the SSO login flow \
                     and add it to the configuration"
                        .into(),
                ))
            }
        }

        Ok(())
    }

    /// The credential pair, once `validate()` has passed.
    ///
    /// # Errors
    /// Returns `DeskbotError::Config` if no access token is configured.
    pub fn credential(&self) -> Result<crate::types::Credential> {
        let access_token = self
            .auth
            .access_token
            .clone()
            .ok_or_else(|| DeskbotError::Config("no access token configured".into()))?;
        Ok(crate::types::Credential::new(access_token, self.auth.refresh_token.clone()))
    }
}

/// Parse a comma-separated `1..7` weekday list (1 = Monday, ISO numbering).
///
/// # Errors
/// Returns `DeskbotError::Config` on any non-integer or out-of-range entry;
/// unlike vacation tokens, a bad weekday list fails the whole run.
pub fn parse_days_of_week(spec: &str) -> Result<Vec<Weekday>> {
    let mut days = Vec::new();
    for token in spec.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let number: u8 = token.parse().map_err(|_| {
            DeskbotError::Config(format!(
                "invalid RESERVATION_DAYS_OF_WEEK entry '{token}': \
                 use comma-separated integers 1-7 (1 = Monday)"
            ))
        })?;
        let day = match number {
            1 => Weekday::Mon,
            2 => Weekday::Tue,
            3 => Weekday::Wed,
            4 => Weekday::Thu,
            5 => Weekday::Fri,
            6 => Weekday::Sat,
            7 => Weekday::Sun,
            _ => {
                return Err(DeskbotError::Config(format!(
                    "RESERVATION_DAYS_OF_WEEK entry '{number}' out of range 1-7"
                )))
            }
        };
        if !days.contains(&day) {
            days.push(day);
        }
    }
    Ok(days)
}

/// Parse an `HH:MM` wall-clock time.
///
/// # Errors
/// Returns `DeskbotError::Config` when the value does not parse.
pub fn parse_wall_clock(key: &str, value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| DeskbotError::Config(format!("invalid {key} '{value}': expected HH:MM")))
}
