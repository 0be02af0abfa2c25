//! Domain types and models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Access/refresh token pair issued by the booking platform.
///
/// Created out-of-band by the SSO acquisition flow or loaded from storage at
/// startup. Without a refresh token, an authentication failure is terminal:
/// there is no retry path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token sent on every API call
    pub access_token: String,

    /// Refresh token for obtaining new access tokens
    /// Optional because the platform does not always hand one out
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Credential {
    #[must_use]
    pub fn new(access_token: String, refresh_token: Option<String>) -> Self {
        Self { access_token, refresh_token }
    }

    /// Whether a refresh attempt is even possible.
    #[must_use]
    pub fn has_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Half-day slot on the booking platform. A full-day booking requests both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Moment {
    Morning,
    Afternoon,
}

impl Moment {
    /// Both half-day slots, i.e. a full-day booking.
    #[must_use]
    pub fn full_day() -> [Moment; 2] {
        [Moment::Morning, Moment::Afternoon]
    }
}

impl std::fmt::Display for Moment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Moment::Morning => write!(f, "morning"),
            Moment::Afternoon => write!(f, "afternoon"),
        }
    }
}

/// Desk reference as returned by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeskRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Space reference as returned by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A single desk/date/moment reservation record ("affectation" in platform
/// terms). Owned by the remote service; deskbot only reads these and requests
/// creation or deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub date: NaiveDate,
    pub moment: Moment,
    pub active: bool,
    #[serde(default)]
    pub desk: Option<DeskRef>,
    #[serde(default)]
    pub space: Option<SpaceRef>,
}

/// A bookable desk/space pair, ordered most-preferred first.
///
/// Either a user-declared favorite or inferred from booking frequency.
/// Recomputed fresh every planning run, never cached across runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeskCandidate {
    pub desk_id: String,
    pub space_id: String,
    pub display_name: String,
}

/// Outcome of a single booking attempt.
///
/// `Failed` covers both remote rejections (desk taken, validation error) and
/// transport failures for that one call; the caller decides whether to fall
/// through to another candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookOutcome {
    /// A new booking was created
    Created,
    /// An active booking already covered that date; no mutation was issued
    AlreadyExisted,
    /// The attempt failed for this candidate
    Failed,
}

impl BookOutcome {
    /// True when the date needs no further candidates.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, BookOutcome::Created | BookOutcome::AlreadyExisted)
    }
}

/// Per-run booking counters, reset at the start of each planning run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub created: u32,
    pub already_existed: u32,
    pub failed: u32,
}

impl RunStatistics {
    pub fn record(&mut self, outcome: BookOutcome) {
        match outcome {
            BookOutcome::Created => self.created += 1,
            BookOutcome::AlreadyExisted => self.already_existed += 1,
            BookOutcome::Failed => self.failed += 1,
        }
    }

    /// Total dates the run attempted (excludes vacation-filtered dates,
    /// which never enter the statistics at all).
    #[must_use]
    pub fn total(&self) -> u32 {
        self.created + self.already_existed + self.failed
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}
