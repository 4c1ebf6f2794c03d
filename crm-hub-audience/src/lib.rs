//! Audience evaluation for targeting rules
//!
//! Applies a validated [`RuleSet`](crm_hub_core::RuleSet) to a customer
//! population. Evaluation is pure: the same rules against the same snapshot
//! always select the same customers.

pub mod evaluator;

pub use evaluator::{evaluate_rule, Audience, AudienceEvaluator};
