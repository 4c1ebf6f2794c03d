//! Campaign lifecycle
//!
//! ```text
//! DRAFT ──submit──▶ PROCESSING ──▶ COMPLETED
//!                             └──▶ FAILED
//! ```
//!
//! A draft lives only in the caller's hands; it becomes a persisted
//! [`Campaign`] in `PROCESSING` once its audience has been sized. The
//! terminal states are reached by the delivery worker.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Campaign, CoreError, RuleSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Draft,
    Processing,
    Completed,
    Failed,
}

impl CampaignStatus {
    pub fn can_transition_to(&self, next: CampaignStatus) -> bool {
        matches!(
            (self, next),
            (CampaignStatus::Draft, CampaignStatus::Processing)
                | (CampaignStatus::Processing, CampaignStatus::Completed)
                | (CampaignStatus::Processing, CampaignStatus::Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CampaignStatus::Completed | CampaignStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "DRAFT",
            CampaignStatus::Processing => "PROCESSING",
            CampaignStatus::Completed => "COMPLETED",
            CampaignStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated campaign that has not been submitted yet
#[derive(Debug, Clone)]
pub struct CampaignDraft {
    pub name: String,
    pub rules: RuleSet,
}

impl CampaignDraft {
    pub fn new(name: &str, rules: RuleSet) -> Result<Self, CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::validation("campaign name is required"));
        }
        Ok(Self {
            name: name.to_string(),
            rules,
        })
    }

    pub fn status(&self) -> CampaignStatus {
        CampaignStatus::Draft
    }

    /// Move to PROCESSING with the audience size measured at submission
    pub fn submit(self, audience_size: u64) -> Campaign {
        Campaign::new(self.name, self.rules, audience_size)
    }
}
