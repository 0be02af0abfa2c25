//! Wall-clock scheduling for unattended runs.

mod booking_scheduler;
mod error;

pub use booking_scheduler::{BookingScheduler, BookingSchedulerConfig};
pub use error::{SchedulerError, SchedulerResult};
