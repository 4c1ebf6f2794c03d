//! Background delivery worker

use crm_hub_core::{CampaignStatus, CoreError};
use crm_hub_storage::{CampaignStorage, CustomerStorage, Storage};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::{DeliveryChannel, DeliveryError, Message};

/// A submitted campaign and the audience resolved at submission
#[derive(Debug, Clone)]
pub struct DeliveryJob {
    pub campaign_id: Uuid,
    pub recipients: Vec<Uuid>,
}

/// Outcome of one delivery run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: u64,
    pub failed: u64,
    pub status: CampaignStatus,
}

/// Jobs a spawned worker will hold before `enqueue` reports the queue full
pub const QUEUE_CAPACITY: usize = 1024;

/// Handle for enqueueing jobs on a running worker
#[derive(Debug, Clone)]
pub struct DeliveryQueue {
    tx: mpsc::Sender<DeliveryJob>,
}

impl DeliveryQueue {
    /// A queue holding at most `capacity` pending jobs, and its receiving end
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<DeliveryJob>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Hand a job to the worker without waiting for room
    pub fn enqueue(&self, job: DeliveryJob) -> Result<(), DeliveryError> {
        self.tx.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::QueueFull,
            TrySendError::Closed(_) => DeliveryError::QueueClosed,
        })
    }
}

/// Moves campaigns from PROCESSING to a terminal state
pub struct DeliveryWorker {
    storage: Arc<dyn Storage>,
    channel: Arc<dyn DeliveryChannel>,
}

impl DeliveryWorker {
    pub fn new(storage: Arc<dyn Storage>, channel: Arc<dyn DeliveryChannel>) -> Self {
        Self { storage, channel }
    }

    /// Start the worker loop on the current tokio runtime
    pub fn spawn(self) -> DeliveryQueue {
        self.spawn_with_capacity(QUEUE_CAPACITY)
    }

    pub fn spawn_with_capacity(self, capacity: usize) -> DeliveryQueue {
        let (queue, mut rx) = DeliveryQueue::bounded(capacity);

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let campaign_id = job.campaign_id;
                match self.run_job(job).await {
                    Ok(report) => tracing::info!(
                        "Campaign {} finished as {} ({} sent, {} failed)",
                        campaign_id,
                        report.status,
                        report.sent,
                        report.failed
                    ),
                    Err(e) => {
                        tracing::error!("Delivery of campaign {} failed: {}", campaign_id, e);
                        self.mark_failed(campaign_id).await;
                    }
                }
            }
            tracing::debug!("Delivery queue closed, worker exiting");
        });

        queue
    }

    /// Deliver one campaign and persist its terminal state
    pub async fn run_job(&self, job: DeliveryJob) -> Result<DeliveryReport, DeliveryError> {
        let mut campaign = CampaignStorage::get_by_id(self.storage.as_ref(), job.campaign_id)
            .await?
            .ok_or(DeliveryError::CampaignNotFound(job.campaign_id))?;

        if campaign.status != CampaignStatus::Processing {
            return Err(CoreError::InvalidTransition {
                from: campaign.status,
                to: CampaignStatus::Completed,
            }
            .into());
        }

        let mut sent = 0u64;
        let mut failed = 0u64;
        for customer_id in &job.recipients {
            let lookup = CustomerStorage::get_by_id(self.storage.as_ref(), *customer_id).await;
            let customer = match lookup {
                Ok(Some(c)) => c,
                Ok(None) => {
                    tracing::warn!(
                        "Recipient {} of campaign {} no longer exists",
                        customer_id,
                        campaign.id
                    );
                    failed += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Failed to load recipient {}: {}", customer_id, e);
                    failed += 1;
                    continue;
                }
            };

            let message = Message::personalized(&campaign, &customer);
            match self.channel.send(&message).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    tracing::warn!("Failed to deliver to {}: {}", message.recipient, e);
                    failed += 1;
                }
            }
        }

        let status = if job.recipients.is_empty() || sent > 0 {
            CampaignStatus::Completed
        } else {
            CampaignStatus::Failed
        };

        campaign.record_delivery(sent, failed);
        campaign.transition(status)?;
        CampaignStorage::update(self.storage.as_ref(), campaign).await?;

        Ok(DeliveryReport { sent, failed, status })
    }

    async fn mark_failed(&self, campaign_id: Uuid) {
        let campaign = match CampaignStorage::get_by_id(self.storage.as_ref(), campaign_id).await {
            Ok(Some(c)) => c,
            Ok(None) => return,
            Err(e) => {
                tracing::error!("Could not load campaign {} to mark it failed: {}", campaign_id, e);
                return;
            }
        };
        if campaign.status != CampaignStatus::Processing {
            return;
        }

        let mut campaign = campaign;
        if campaign.transition(CampaignStatus::Failed).is_ok() {
            if let Err(e) = CampaignStorage::update(self.storage.as_ref(), campaign).await {
                tracing::error!("Could not mark campaign {} failed: {}", campaign_id, e);
            }
        }
    }
}
