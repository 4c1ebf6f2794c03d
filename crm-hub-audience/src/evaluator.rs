//! Rule and audience evaluator

use crm_hub_core::{CoreError, Customer, Rule, RuleSet};
use uuid::Uuid;

/// Evaluate one rule against one customer
pub fn evaluate_rule(customer: &Customer, rule: &Rule) -> bool {
    match rule {
        Rule::TotalSpend(c) => c.matches(&customer.total_spend),
        Rule::Visits(c) => c.matches(&i64::from(customer.visits)),
        Rule::LastActiveDate(c) => c.matches(&customer.last_active_date),
    }
}

/// Customers selected by a rule set, in population order
#[derive(Debug, Clone)]
pub struct Audience<'a> {
    pub members: Vec<&'a Customer>,
}

impl<'a> Audience<'a> {
    pub fn size(&self) -> u64 {
        self.members.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn customer_ids(&self) -> Vec<Uuid> {
        self.members.iter().map(|c| c.id).collect()
    }
}

/// Stateless audience evaluator
///
/// Holds no lock over the population: a preview and a later campaign
/// submission evaluate separate snapshots, and writes in between can change
/// the audience.
#[derive(Debug, Clone, Copy, Default)]
pub struct AudienceEvaluator;

impl AudienceEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// True when every rule holds for the customer
    pub fn matches(&self, customer: &Customer, rules: &RuleSet) -> bool {
        rules.rules().iter().all(|rule| evaluate_rule(customer, rule))
    }

    pub fn evaluate<'a>(&self, rules: &RuleSet, population: &'a [Customer]) -> Audience<'a> {
        let members: Vec<&Customer> = population
            .iter()
            .filter(|c| self.matches(c, rules))
            .collect();

        tracing::debug!(
            "Rules [{}] matched {} of {} customers",
            rules.describe(),
            members.len(),
            population.len()
        );

        Audience { members }
    }

    /// Validate untrusted wire rules, then evaluate them
    pub fn evaluate_json<'a>(
        &self,
        rules: &serde_json::Value,
        population: &'a [Customer],
    ) -> Result<Audience<'a>, CoreError> {
        let rules = RuleSet::from_json(rules)?;
        Ok(self.evaluate(&rules, population))
    }
}
