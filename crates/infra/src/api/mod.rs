//! Remote booking platform integration (GraphQL).

mod client;
mod types;

pub use client::BookingApiClient;
