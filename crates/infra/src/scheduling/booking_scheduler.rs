//! Daily booking scheduler for unattended operation.
//!
//! Wraps a cron scheduler with explicit lifecycle management: join handles
//! are tracked, cancellation is explicit, and every asynchronous operation
//! is wrapped in a timeout. The daemon entry point blocks on a coarse
//! polling loop and reacts to SIGINT between polls, never mid-request.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveTime, Timelike};
use deskbot_core::BookingService;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Configuration for the booking scheduler.
#[derive(Debug, Clone)]
pub struct BookingSchedulerConfig {
    /// Wall-clock time of the daily booking run.
    pub booking_time: NaiveTime,
    /// Optional wall-clock time of the daily reminder.
    pub reminder_time: Option<NaiveTime>,
    /// Timeout applied to a single job execution.
    pub job_timeout: Duration,
    /// Timeout for starting the underlying scheduler.
    pub start_timeout: Duration,
    /// Timeout for stopping the scheduler.
    pub stop_timeout: Duration,
    /// Timeout for awaiting the monitor task join handle.
    pub join_timeout: Duration,
    /// Wake-up interval of the blocking daemon loop.
    pub poll_interval: Duration,
}

impl Default for BookingSchedulerConfig {
    fn default() -> Self {
        Self {
            booking_time: NaiveTime::from_hms_opt(9, 0, 0).expect("valid default time"),
            reminder_time: None,
            job_timeout: Duration::from_secs(300),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_secs(60),
        }
    }
}

/// Daily booking scheduler with explicit lifecycle management.
pub struct BookingScheduler {
    scheduler: Option<JobScheduler>,
    config: BookingSchedulerConfig,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
    service: Arc<BookingService>,
}

impl BookingScheduler {
    /// Create a scheduler with a custom configuration.
    pub fn with_config(config: BookingSchedulerConfig, service: Arc<BookingService>) -> Self {
        Self {
            scheduler: None,
            config,
            monitor_handle: None,
            cancellation: CancellationToken::new(),
            service,
        }
    }

    /// Start the scheduler, spawning the monitoring task.
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let scheduler_instance = self.build_scheduler().await?;
        let start_timeout = self.config.start_timeout;

        let start_result = tokio::time::timeout(start_timeout, scheduler_instance.start())
            .await
            .map_err(|_| SchedulerError::Timeout { seconds: start_timeout.as_secs() })?;
        start_result.map_err(|source| SchedulerError::StartFailed(source.to_string()))?;

        self.scheduler = Some(scheduler_instance);

        let cancel = self.cancellation.clone();
        let handle = tokio::spawn(async move {
            cancel.cancelled().await;
            debug!("booking scheduler monitor cancelled");
        });
        self.monitor_handle = Some(handle);

        info!(booking_time = %self.config.booking_time, "booking scheduler started");
        Ok(())
    }

    /// Stop the scheduler and wait for the monitor task to finish.
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();

        let mut scheduler = match self.scheduler.take() {
            Some(scheduler) => scheduler,
            None => return Err(SchedulerError::NotRunning),
        };

        let stop_timeout = self.config.stop_timeout;
        let stop_result =
            tokio::time::timeout(stop_timeout, async move { scheduler.shutdown().await })
                .await
                .map_err(|_| SchedulerError::Timeout { seconds: stop_timeout.as_secs() })?;
        stop_result.map_err(|source| SchedulerError::StopFailed(source.to_string()))?;

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { seconds: join_timeout.as_secs() })?
                .map_err(|err| SchedulerError::TaskJoinFailed(err.to_string()))?;
        }

        info!("booking scheduler stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    /// Returns true when a scheduler instance is active.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Block until interrupted, waking at the configured poll interval.
    /// SIGINT triggers a clean stop, checked between polls.
    pub async fn run_until_interrupted(&mut self) -> SchedulerResult<()> {
        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(err) = result {
                        warn!(error = %err, "failed to listen for interrupt, stopping");
                    } else {
                        info!("interrupt received, shutting down");
                    }
                    break;
                }
                () = tokio::time::sleep(self.config.poll_interval) => {
                    debug!("scheduler heartbeat");
                }
            }
        }
        self.stop().await
    }

    async fn build_scheduler(&self) -> SchedulerResult<JobScheduler> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|source| SchedulerError::CreationFailed(source.to_string()))?;

        let booking_job = self.booking_job()?;
        scheduler
            .add(booking_job)
            .await
            .map_err(|source| SchedulerError::JobRegistrationFailed(source.to_string()))?;

        if let Some(reminder_time) = self.config.reminder_time {
            let reminder_job = self.reminder_job(reminder_time)?;
            scheduler
                .add(reminder_job)
                .await
                .map_err(|source| SchedulerError::JobRegistrationFailed(source.to_string()))?;
        }

        Ok(scheduler)
    }

    fn booking_job(&self) -> SchedulerResult<Job> {
        let cron = cron_expression(self.config.booking_time);
        let service = self.service.clone();
        let job_timeout = self.config.job_timeout;

        debug!(%cron, "registering daily booking job");
        Job::new_async(cron.as_str(), move |_id, _lock| {
            let service = service.clone();
            Box::pin(async move {
                info!("scheduled booking run triggered");
                match tokio::time::timeout(job_timeout, service.run_recurring(None)).await {
                    Ok(Ok(outcome)) => {
                        let stats = outcome.statistics;
                        info!(
                            created = stats.created,
                            already_existed = stats.already_existed,
                            failed = stats.failed,
                            "scheduled booking run finished"
                        );
                    }
                    Ok(Err(err)) => {
                        error!(error = %err, "scheduled booking run failed");
                    }
                    Err(_) => {
                        warn!(timeout_secs = job_timeout.as_secs(), "scheduled booking run timed out");
                    }
                }
            })
        })
        .map_err(|source| SchedulerError::JobRegistrationFailed(source.to_string()))
    }

    fn reminder_job(&self, reminder_time: NaiveTime) -> SchedulerResult<Job> {
        let cron = cron_expression(reminder_time);
        let service = self.service.clone();
        let job_timeout = self.config.job_timeout;

        debug!(%cron, "registering daily reminder job");
        Job::new_async(cron.as_str(), move |_id, _lock| {
            let service = service.clone();
            Box::pin(async move {
                match tokio::time::timeout(job_timeout, service.daily_reminder()).await {
                    Ok(Ok(())) => debug!("daily reminder sent"),
                    Ok(Err(err)) => error!(error = %err, "daily reminder failed"),
                    Err(_) => warn!("daily reminder timed out"),
                }
            })
        })
        .map_err(|source| SchedulerError::JobRegistrationFailed(source.to_string()))
    }
}

impl Drop for BookingScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("BookingScheduler dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}

/// Six-field cron expression firing daily at the given wall-clock time.
fn cron_expression(time: NaiveTime) -> String {
    format!("0 {} {} * * *", time.minute(), time.hour())
}
