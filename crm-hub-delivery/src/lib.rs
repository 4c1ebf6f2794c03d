//! Campaign delivery
//!
//! Sends a campaign's message to every audience member recorded at
//! submission and settles the campaign in `COMPLETED` or `FAILED`.
//! Runs as a background task fed through [`DeliveryQueue`].

pub mod channel;
pub mod error;
pub mod worker;

pub use channel::{DeliveryChannel, LogChannel, Message};
pub use error::DeliveryError;
pub use worker::{DeliveryJob, DeliveryQueue, DeliveryReport, DeliveryWorker, QUEUE_CAPACITY};
