//! Delivery error types

use crm_hub_core::CoreError;
use crm_hub_storage::StorageError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Campaign {0} not found")]
    CampaignNotFound(Uuid),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] CoreError),

    #[error("Delivery queue is closed")]
    QueueClosed,

    #[error("Delivery queue is full")]
    QueueFull,
}
