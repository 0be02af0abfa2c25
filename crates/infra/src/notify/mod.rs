//! Operator notifications
//!
//! Webhook delivery of booking reports and token alerts. Delivery failures
//! are logged and never propagated: a dead webhook must not fail a booking
//! run.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use deskbot_core::Notifier;
use deskbot_domain::Booking;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, warn};

use crate::http::HttpClient;

const WEBHOOK_TIMEOUT_SECS: u64 = 10;

const COLOR_SUCCESS: u32 = 0x00FF00;
const COLOR_ERROR: u32 = 0xFF0000;
const COLOR_INFO: u32 = 0xFFA500;

/// Posts Discord/Slack-compatible embed payloads to a configured webhook.
pub struct WebhookNotifier {
    webhook_url: String,
    http: HttpClient,
}

impl WebhookNotifier {
    /// # Errors
    /// Returns an error when the underlying HTTP client cannot be built.
    pub fn new(webhook_url: impl Into<String>) -> deskbot_domain::Result<Self> {
        let http =
            HttpClient::builder().timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS)).build()?;
        Ok(Self { webhook_url: webhook_url.into(), http })
    }

    async fn post_embed(&self, title: &str, description: String, color: u32) {
        let payload = json!({
            "embeds": [{
                "title": title,
                "description": description,
                "color": color,
                "timestamp": Utc::now().to_rfc3339(),
            }]
        });

        let builder = self.http.request(Method::POST, &self.webhook_url).json(&payload);
        match self.http.send(builder).await {
            Ok(response) if response.status().is_success() => {
                debug!(title, "notification delivered");
            }
            Ok(response) => {
                warn!(title, status = %response.status(), "webhook rejected notification");
            }
            Err(err) => {
                warn!(title, error = %err, "failed to deliver notification");
            }
        }
    }

    fn format_bookings(bookings: &[Booking]) -> String {
        bookings
            .iter()
            .map(|booking| {
                let desk = booking
                    .desk
                    .as_ref()
                    .and_then(|d| d.name.as_deref())
                    .unwrap_or("unknown desk");
                format!("- {} ({}): {desk}", booking.date, booking.moment)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_booking_success(&self, count: u32, weeks: u32, dates: &[NaiveDate]) {
        let date_list =
            dates.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
        let description = format!(
            "{count} booking(s) created over the next {weeks} week(s)\nDates: {date_list}"
        );
        self.post_embed("Desk bookings created", description, COLOR_SUCCESS).await;
    }

    async fn send_token_expired_alert(&self, message: &str) {
        let description = format!(
            "The access token expired and could not be refreshed.\n\n\
             Error: {message}\n\n\
             Re-run the SSO login flow and update the configured token."
        );
        self.post_embed("Access token expired", description, COLOR_ERROR).await;
    }

    async fn send_vacation_cancellation(&self, bookings: &[Booking]) {
        let description = format!(
            "{} booking(s) cancelled because they fall within vacation periods:\n{}",
            bookings.len(),
            Self::format_bookings(bookings)
        );
        self.post_embed("Vacation bookings cancelled", description, COLOR_INFO).await;
    }

    async fn send_daily_reminder(&self, bookings: &[Booking]) {
        let description = if bookings.is_empty() {
            "No desk booked for today.".to_string()
        } else {
            format!("Today's bookings:\n{}", Self::format_bookings(bookings))
        };
        self.post_embed("Daily desk reminder", description, COLOR_INFO).await;
    }
}

/// No-op notifier used when no webhook is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn send_booking_success(&self, count: u32, weeks: u32, _dates: &[NaiveDate]) {
        debug!(count, weeks, "booking success (no webhook configured)");
    }

    async fn send_token_expired_alert(&self, message: &str) {
        warn!(message, "token expired (no webhook configured)");
    }

    async fn send_vacation_cancellation(&self, bookings: &[Booking]) {
        debug!(count = bookings.len(), "vacation cancellations (no webhook configured)");
    }

    async fn send_daily_reminder(&self, bookings: &[Booking]) {
        debug!(count = bookings.len(), "daily reminder (no webhook configured)");
    }
}
