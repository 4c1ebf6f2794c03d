//! Outbound message channels

use async_trait::async_trait;
use crm_hub_core::{Campaign, Customer};
use uuid::Uuid;

use crate::DeliveryError;

/// One personalised campaign message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub campaign_id: Uuid,
    pub customer_id: Uuid,
    pub recipient: String,
    pub body: String,
}

impl Message {
    pub fn personalized(campaign: &Campaign, customer: &Customer) -> Self {
        Self {
            campaign_id: campaign.id,
            customer_id: customer.id,
            recipient: customer.email.clone(),
            body: format!("Hi {}, here's 10% off on your next order!", customer.name),
        }
    }
}

/// Transport for campaign messages
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn send(&self, message: &Message) -> Result<(), DeliveryError>;
}

/// Writes each message to the log and reports success
#[derive(Debug, Default)]
pub struct LogChannel;

#[async_trait]
impl DeliveryChannel for LogChannel {
    async fn send(&self, message: &Message) -> Result<(), DeliveryError> {
        tracing::info!(
            campaign = %message.campaign_id,
            recipient = %message.recipient,
            "{}",
            message.body
        );
        Ok(())
    }
}
