//! Core domain models for CRM Hub
//!
//! This crate contains the shared data structures used across the
//! targeting engine: Customer, Order, Campaign, and the typed Rule/RuleSet
//! that selects a campaign's audience.

pub mod dates;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod rules;

pub use error::CoreError;
pub use lifecycle::{CampaignDraft, CampaignStatus};
pub use models::*;
pub use rules::{Comparison, Field, Operator, Rule, RuleSet};
