//! Port interfaces for the booking flow
//!
//! These traits enable dependency injection and testing by abstracting
//! external dependencies (the remote booking platform, credential storage,
//! operator notifications).

use async_trait::async_trait;
use chrono::NaiveDate;
use deskbot_domain::{BookOutcome, Booking, Credential, DeskCandidate, Moment, Result};

/// Single point of contact with the remote booking platform.
///
/// Implementations own the authentication contract: a call that hits an
/// authorization failure may perform at most one token refresh followed by
/// one retry of the original request before surfacing `DeskbotError::Auth`.
#[async_trait]
pub trait BookingGateway: Send + Sync {
    /// Confirm the current access token by querying the caller's own
    /// profile.
    ///
    /// # Returns
    /// The caller's user id, cached by implementations for the run.
    ///
    /// # Errors
    /// Returns `DeskbotError::Auth` when the token is rejected and cannot be
    /// refreshed.
    async fn verify_identity(&self) -> Result<String>;

    /// Preference-ordered desk candidates: explicit favorites when the
    /// platform reports any, otherwise a frequency ranking over recent
    /// bookings. Deterministic given the same remote data.
    async fn favorite_desks(&self) -> Result<Vec<DeskCandidate>>;

    /// All bookings of the caller for the given dates.
    async fn bookings_for_dates(&self, dates: &[NaiveDate]) -> Result<Vec<Booking>>;

    /// True if at least one *active* booking exists on that date; with
    /// `desk_id` the match is restricted to that desk.
    async fn has_booking_on_date(&self, date: NaiveDate, desk_id: Option<&str>) -> Result<bool>;

    /// Book a desk for one date, idempotently: an active booking already on
    /// that date yields `AlreadyExisted` without issuing a creation
    /// mutation.
    ///
    /// # Errors
    /// Only authentication exhaustion is an `Err`; remote rejections and
    /// transport failures for the single call come back as
    /// `Ok(BookOutcome::Failed)`.
    async fn book_desk(
        &self,
        candidate: &DeskCandidate,
        date: NaiveDate,
        moments: &[Moment],
    ) -> Result<BookOutcome>;

    /// Cancel one booking; returns the platform's success flag.
    async fn cancel_booking(&self, booking_id: &str) -> Result<bool>;
}

/// Abstraction over where credentials live.
///
/// Injected into the gateway so booking logic never touches filesystem
/// paths; substituting an in-memory store is enough for tests.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Load the persisted credential, if any.
    async fn load(&self) -> Result<Option<Credential>>;

    /// Persist the credential. Must be atomic with respect to concurrent
    /// readers: either the fully-old or fully-new pair is observed, never a
    /// mix. A failure here never invalidates the in-memory credential.
    async fn save(&self, credential: &Credential) -> Result<()>;
}

/// Operator-facing notifications.
///
/// Delivery failures are logged by implementations and never propagated;
/// every method is therefore infallible from the caller's point of view.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// A recurring run created `count` new bookings over `weeks` weeks.
    async fn send_booking_success(&self, count: u32, weeks: u32, dates: &[NaiveDate]);

    /// The access token expired and could not be refreshed.
    async fn send_token_expired_alert(&self, message: &str);

    /// Existing bookings were cancelled because they fell on vacation days.
    async fn send_vacation_cancellation(&self, bookings: &[Booking]);

    /// Daily digest of today's bookings.
    async fn send_daily_reminder(&self, bookings: &[Booking]);
}
