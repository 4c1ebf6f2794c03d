//! Core domain models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CampaignStatus, CoreError, RuleSet};

/// Largest money value accepted for a spend or an order amount (10^12)
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0);

/// A registered customer and the engagement stats rules target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    /// Unique identifier
    #[serde(rename = "_id", alias = "id")]
    pub id: Uuid,
    pub name: String,
    /// Trimmed, lower-cased, unique across customers
    pub email: String,
    /// Lifetime spend, never negative
    pub total_spend: Decimal,
    pub visits: u32,
    /// Calendar day of the latest activity
    pub last_active_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// Validate a registration request; `today` fills a missing activity date
    pub fn register(req: CreateCustomerRequest, today: NaiveDate) -> Result<Self, CoreError> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(CoreError::validation("customer name is required"));
        }
        let email = normalize_email(&req.email)?;
        if req.total_spend < Decimal::ZERO {
            return Err(CoreError::validation("totalSpend cannot be negative"));
        }
        if req.total_spend > MAX_AMOUNT {
            return Err(CoreError::validation(format!(
                "totalSpend cannot exceed {}",
                MAX_AMOUNT
            )));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email,
            total_spend: req.total_spend,
            visits: req.visits,
            last_active_date: req.last_active_date.unwrap_or(today),
            created_at: Utc::now(),
        })
    }

    /// Fold a recorded order into the customer's stats; unchanged on error
    pub fn apply_order(&mut self, order: &Order) -> Result<(), CoreError> {
        let total_spend = self.total_spend.checked_add(order.amount).ok_or_else(|| {
            CoreError::Overflow(format!(
                "totalSpend {} + order {} for customer {}",
                self.total_spend, order.amount, self.id
            ))
        })?;
        self.total_spend = total_spend;
        self.visits = self.visits.saturating_add(1);
        self.last_active_date = order.order_date.date_naive();
        Ok(())
    }
}

fn normalize_email(raw: &str) -> Result<String, CoreError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(CoreError::validation("customer email is required"));
    }

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid {
        return Err(CoreError::validation(format!("invalid email address '{}'", email)));
    }
    Ok(email)
}

/// A purchase recorded against a customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id", alias = "id")]
    pub id: Uuid,
    /// Owning customer
    #[serde(rename = "customer")]
    pub customer_id: Uuid,
    /// Always positive
    pub amount: Decimal,
    pub order_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn place(req: &CreateOrderRequest, now: DateTime<Utc>) -> Result<Self, CoreError> {
        if req.amount <= Decimal::ZERO {
            return Err(CoreError::validation("order amount must be positive"));
        }
        if req.amount > MAX_AMOUNT {
            return Err(CoreError::validation(format!(
                "order amount cannot exceed {}",
                MAX_AMOUNT
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            customer_id: req.customer,
            amount: req.amount,
            order_date: req.order_date.unwrap_or(now),
            created_at: now,
        })
    }
}

/// A named targeting action and its delivery outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    #[serde(rename = "_id", alias = "id")]
    pub id: Uuid,
    pub name: String,
    pub rules: RuleSet,
    /// Snapshot taken at submission, never re-evaluated
    pub audience_size: u64,
    pub status: CampaignStatus,
    #[serde(default)]
    pub sent_count: u64,
    #[serde(default)]
    pub failed_count: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Campaign {
    pub(crate) fn new(name: String, rules: RuleSet, audience_size: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            rules,
            audience_size,
            status: CampaignStatus::Processing,
            sent_count: 0,
            failed_count: 0,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Move to `next`, stamping `completed_at` on terminal states
    pub fn transition(&mut self, next: CampaignStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn record_delivery(&mut self, sent: u64, failed: u64) {
        self.sent_count = sent;
        self.failed_count = failed;
    }
}

/// Request to register a customer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub total_spend: Decimal,
    #[serde(default)]
    pub visits: u32,
    #[serde(default, deserialize_with = "crate::dates::lenient_date")]
    pub last_active_date: Option<NaiveDate>,
}

/// Request to record an order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub customer: Uuid,
    pub amount: Decimal,
    #[serde(default, deserialize_with = "crate::dates::lenient_timestamp")]
    pub order_date: Option<DateTime<Utc>>,
}

/// Request to create a campaign; `rules` is validated by the handler
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCampaignRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rules: serde_json::Value,
}

/// Request to size an audience without persisting anything
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreviewAudienceRequest {
    #[serde(default)]
    pub rules: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewAudienceResponse {
    pub audience_size: u64,
    pub rules_description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRulesRequest {
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRulesResponse {
    pub rules: RuleSet,
}

/// `{ "data": [...] }` envelope used by list endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
}

impl<T> ListResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self { data }
    }
}

/// Campaign as shown in the history table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignView {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub rules_description: String,
}

impl From<Campaign> for CampaignView {
    fn from(campaign: Campaign) -> Self {
        let rules_description = campaign.rules.describe();
        Self {
            campaign,
            rules_description,
        }
    }
}

/// Summary cards on the dashboard landing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub customers: u64,
    pub campaigns: u64,
    pub total_spend: Decimal,
    /// Rounded to cents
    pub avg_spend: Decimal,
}

impl DashboardStats {
    pub fn compute(customers: &[Customer], campaigns: u64) -> Result<Self, CoreError> {
        let total_spend = customers
            .iter()
            .try_fold(Decimal::ZERO, |sum, c| sum.checked_add(c.total_spend))
            .ok_or_else(|| CoreError::Overflow("total spend across customers".to_string()))?;
        let avg_spend = if customers.is_empty() {
            Decimal::ZERO
        } else {
            (total_spend / Decimal::from(customers.len() as u64)).round_dp(2)
        };
        Ok(Self {
            customers: customers.len() as u64,
            campaigns,
            total_spend,
            avg_spend,
        })
    }
}
