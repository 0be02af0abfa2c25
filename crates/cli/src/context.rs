//! Application context wiring
//!
//! Builds the collaborator graph for one process run: token store,
//! notifier, gateway and booking service. Nothing here is a global; every
//! collaborator is constructed once and injected explicitly.

use std::sync::Arc;

use deskbot_core::{BookingService, Notifier, TokenStore};
use deskbot_domain::{BotConfig, Result, VacationCalendar};
use deskbot_infra::config::token_store_paths;
use deskbot_infra::{BookingApiClient, EnvFileTokenStore, NullNotifier, WebhookNotifier};
use tracing::{debug, info};

/// Fully wired application context.
pub struct AppContext {
    pub service: Arc<BookingService>,
}

impl AppContext {
    /// Wire up collaborators from a validated configuration.
    ///
    /// # Errors
    /// Propagates construction failures (HTTP client build, missing
    /// credential).
    pub fn new(config: &BotConfig) -> Result<Self> {
        let calendar = VacationCalendar::from_spec(&config.vacation.dates);

        let notifier: Arc<dyn Notifier> = match config.notification.webhook_url.as_deref() {
            Some(url) => {
                debug!("webhook notifications enabled");
                Arc::new(WebhookNotifier::new(url)?)
            }
            None => Arc::new(NullNotifier),
        };

        // The loader already merged the token from env/file; the store is
        // only needed for writing refreshed tokens back.
        let token_store: Arc<dyn TokenStore> =
            Arc::new(EnvFileTokenStore::new(token_store_paths()));
        let credential = config.credential()?;
        if credential.has_refresh() {
            info!("refresh token available for automatic renewal");
        }

        let gateway = Arc::new(BookingApiClient::new(
            config.api.base_url.clone(),
            credential,
            token_store,
            notifier.clone(),
        )?);

        let service = Arc::new(BookingService::new(
            gateway,
            notifier,
            calendar,
            config.reservation.clone(),
            config.vacation.auto_cancel,
        ));

        Ok(Self { service })
    }
}
