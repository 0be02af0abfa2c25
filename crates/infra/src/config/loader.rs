//! Configuration loader
//!
//! Builds a [`BotConfig`] from process environment variables and a flat
//! key=value file, per-key: the environment wins, the file fills the gaps.
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./deskbot.env` (current working directory)
//! 2. `./config/deskbot.env`
//! 3. `~/.config/deskbot/deskbot.env`
//!
//! The file format is the same flat `KEY=VALUE` file the token store
//! rewrites, so a refreshed token is picked up on the next run.

use std::collections::HashMap;
use std::path::PathBuf;

use deskbot_domain::{
    parse_days_of_week, parse_wall_clock, ApiConfig, AuthConfig, BotConfig, DeskbotError,
    NotificationConfig, ReservationConfig, Result, VacationConfig,
};
use tracing::{debug, info};

const DEFAULT_FILE_NAME: &str = "deskbot.env";

/// Load configuration from the environment and the first config file found.
///
/// # Errors
/// Returns `DeskbotError::Config` on malformed values (non-integer counts,
/// bad `HH:MM` times, out-of-range weekday lists). A missing file is not an
/// error; missing required keys surface later through
/// [`BotConfig::validate`].
pub fn load() -> Result<BotConfig> {
    let file_values = match probe_config_paths() {
        Some(path) => {
            info!(path = %path.display(), "loading configuration file");
            let contents = std::fs::read_to_string(&path).map_err(|err| {
                DeskbotError::Config(format!("failed to read {}: {err}", path.display()))
            })?;
            parse_env_file(&contents)
        }
        None => {
            debug!("no configuration file found, using environment only");
            HashMap::new()
        }
    };

    build(&file_values)
}

/// Parse flat `KEY=VALUE` content: `#` comments and blank lines ignored,
/// values taken verbatim after the first `=`.
#[must_use]
pub fn parse_env_file(contents: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            values.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    values
}

/// Probe the standard config file locations, first hit wins.
#[must_use]
pub fn probe_config_paths() -> Option<PathBuf> {
    candidate_paths().into_iter().find(|path| path.exists())
}

/// Locations the token store should write refreshed credentials to: the
/// config file in use when one exists, the working-directory default
/// otherwise.
#[must_use]
pub fn token_store_paths() -> Vec<PathBuf> {
    match probe_config_paths() {
        Some(path) => vec![path],
        None => vec![PathBuf::from(DEFAULT_FILE_NAME)],
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut candidates = vec![
        PathBuf::from(DEFAULT_FILE_NAME),
        PathBuf::from("config").join(DEFAULT_FILE_NAME),
    ];
    if let Some(home) = std::env::var_os("HOME") {
        candidates.push(PathBuf::from(home).join(".config").join("deskbot").join(DEFAULT_FILE_NAME));
    }
    candidates
}

fn build(file_values: &HashMap<String, String>) -> Result<BotConfig> {
    let get = |key: &str| -> Option<String> {
        std::env::var(key)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| file_values.get(key).cloned().filter(|value| !value.trim().is_empty()))
    };

    let api = ApiConfig {
        base_url: get("DESKBOT_BASE_URL").unwrap_or_default(),
        site_id: get("DESKBOT_SITE_ID"),
        floor_id: get("DESKBOT_FLOOR_ID"),
        zone_id: get("DESKBOT_ZONE_ID"),
    };

    let auth = AuthConfig {
        access_token: get("DESKBOT_TOKEN"),
        refresh_token: get("DESKBOT_REFRESH_TOKEN"),
    };

    let reservation = ReservationConfig {
        time: match get("RESERVATION_TIME") {
            Some(value) => parse_wall_clock("RESERVATION_TIME", &value)?,
            None => ReservationConfig::default().time,
        },
        days_ahead: parse_int(get("RESERVATION_DAYS_AHEAD"), "RESERVATION_DAYS_AHEAD", 7)?,
        days_of_week: parse_days_of_week(&get("RESERVATION_DAYS_OF_WEEK").unwrap_or_default())?,
        recurring_weeks: parse_int(get("RECURRING_WEEKS"), "RECURRING_WEEKS", 4)?,
    };

    let vacation = VacationConfig {
        dates: get("VACATION_DATES").unwrap_or_default(),
        auto_cancel: parse_bool(get("AUTO_CANCEL_VACATIONS"), true),
    };

    let notification = NotificationConfig {
        webhook_url: get("NOTIFICATION_WEBHOOK_URL"),
        daily_reminder_time: match get("DAILY_REMINDER_TIME") {
            Some(value) => Some(parse_wall_clock("DAILY_REMINDER_TIME", &value)?),
            None => None,
        },
    };

    Ok(BotConfig { api, auth, reservation, vacation, notification })
}

fn parse_int(value: Option<String>, key: &str, default: u32) -> Result<u32> {
    match value {
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .map_err(|_| DeskbotError::Config(format!("invalid {key} '{raw}': expected an integer"))),
        None => Ok(default),
    }
}

/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off`
/// (case-insensitive).
fn parse_bool(value: Option<String>, default: bool) -> bool {
    value
        .map(|raw| matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{NaiveTime, Weekday};
    use once_cell::sync::Lazy;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ALL_KEYS: &[&str] = &[
        "DESKBOT_BASE_URL",
        "DESKBOT_TOKEN",
        "DESKBOT_REFRESH_TOKEN",
        "DESKBOT_SITE_ID",
        "DESKBOT_FLOOR_ID",
        "DESKBOT_ZONE_ID",
        "RESERVATION_TIME",
        "RESERVATION_DAYS_AHEAD",
        "RESERVATION_DAYS_OF_WEEK",
        "RECURRING_WEEKS",
        "VACATION_DATES",
        "AUTO_CANCEL_VACATIONS",
        "DAILY_REMINDER_TIME",
        "NOTIFICATION_WEBHOOK_URL",
    ];

    fn clear_env() {
        for key in ALL_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn file_values_fill_in_for_missing_env() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let file = parse_env_file(
            "# deskbot configuration\n\
             DESKBOT_BASE_URL=https://booking.example.com/api\n\
             DESKBOT_TOKEN=file-token\n\
             RESERVATION_TIME=03:05\n\
             RESERVATION_DAYS_OF_WEEK=1,3,5\n\
             RECURRING_WEEKS=6\n\
             AUTO_CANCEL_VACATIONS=false\n",
        );

        let config = build(&file).unwrap();
        assert_eq!(config.api.base_url, "https://booking.example.com/api");
        assert_eq!(config.auth.access_token.as_deref(), Some("file-token"));
        assert_eq!(config.reservation.time, NaiveTime::from_hms_opt(3, 5, 0).unwrap());
        assert_eq!(
            config.reservation.days_of_week,
            vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]
        );
        assert_eq!(config.reservation.recurring_weeks, 6);
        assert!(!config.vacation.auto_cancel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn environment_wins_over_file() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("DESKBOT_TOKEN", "env-token");

        let file = parse_env_file("DESKBOT_TOKEN=file-token\nDESKBOT_BASE_URL=https://x/api\n");
        let config = build(&file).unwrap();
        assert_eq!(config.auth.access_token.as_deref(), Some("env-token"));

        clear_env();
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let config = build(&HashMap::new()).unwrap();
        assert_eq!(config.reservation.time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(config.reservation.days_ahead, 7);
        assert_eq!(config.reservation.recurring_weeks, 4);
        assert!(config.reservation.days_of_week.is_empty());
        assert!(config.vacation.auto_cancel);
        assert!(config.notification.webhook_url.is_none());
        assert!(config.notification.daily_reminder_time.is_none());
        // Required keys are missing, so validation must fail fast
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_numbers_fail_fast() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let file = parse_env_file("RECURRING_WEEKS=often\n");
        let err = build(&file).unwrap_err();
        assert!(matches!(err, DeskbotError::Config(_)));
        assert!(err.to_string().contains("RECURRING_WEEKS"));
    }

    #[test]
    fn malformed_weekday_list_fails_fast() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let file = parse_env_file("RESERVATION_DAYS_OF_WEEK=1,2,9\n");
        assert!(matches!(build(&file), Err(DeskbotError::Config(_))));
    }

    #[test]
    fn env_file_parsing_ignores_comments_and_garbage() {
        let values = parse_env_file(
            "# comment\n\
             \n\
             not a key value line\n\
             KEY = spaced value \n\
             URL=https://example.com/?a=b=c\n",
        );
        assert_eq!(values.get("KEY").map(String::as_str), Some("spaced value"));
        // Everything after the first '=' belongs to the value
        assert_eq!(values.get("URL").map(String::as_str), Some("https://example.com/?a=b=c"));
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn bool_parsing_accepts_common_forms() {
        assert!(parse_bool(Some("1".into()), false));
        assert!(parse_bool(Some("TRUE".into()), false));
        assert!(parse_bool(Some("yes".into()), false));
        assert!(parse_bool(Some("on".into()), false));
        assert!(!parse_bool(Some("0".into()), true));
        assert!(!parse_bool(Some("off".into()), true));
        assert!(parse_bool(None, true));
        assert!(!parse_bool(None, false));
    }
}
