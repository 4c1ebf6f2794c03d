//! Application state shared across handlers

use crm_hub_audience::AudienceEvaluator;
use crm_hub_delivery::{DeliveryChannel, DeliveryQueue, DeliveryWorker, LogChannel};
use crm_hub_rulegen::{DisabledRuleGenerator, RuleGenerator};
use crm_hub_storage::{InMemoryStorage, Storage};
use std::sync::Arc;

/// Shared application state
///
/// Every constructor spawns the delivery worker, so they must be called
/// from inside a tokio runtime.
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub evaluator: AudienceEvaluator,
    pub rule_generator: Arc<dyn RuleGenerator>,
    pub delivery: DeliveryQueue,
}

impl AppState {
    /// In-memory storage, no rule generation service, logged delivery
    pub fn new() -> Self {
        Self::with_storage(Arc::new(InMemoryStorage::new()))
    }

    /// Create with custom storage backend
    pub fn with_storage(storage: Arc<dyn Storage>) -> Self {
        Self::with_components(storage, Arc::new(DisabledRuleGenerator), Arc::new(LogChannel))
    }

    pub fn with_components(
        storage: Arc<dyn Storage>,
        rule_generator: Arc<dyn RuleGenerator>,
        channel: Arc<dyn DeliveryChannel>,
    ) -> Self {
        let delivery = DeliveryWorker::new(storage.clone(), channel).spawn();

        Self {
            storage,
            evaluator: AudienceEvaluator::new(),
            rule_generator,
            delivery,
        }
    }
}
