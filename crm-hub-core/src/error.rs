//! Error types for the core crate

use thiserror::Error;

use crate::CampaignStatus;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Amount out of range: {0}")]
    Overflow(String),

    #[error("Invalid campaign status transition from {from} to {to}")]
    InvalidTransition {
        from: CampaignStatus,
        to: CampaignStatus,
    },
}

impl CoreError {
    pub(crate) fn invalid_rule(msg: impl Into<String>) -> Self {
        CoreError::InvalidRule(msg.into())
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }
}
