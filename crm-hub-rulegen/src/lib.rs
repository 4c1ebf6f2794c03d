//! Natural-language rule generation
//!
//! The generation model runs outside this service. Whatever it returns is
//! treated as untrusted input and goes through the same validation as rules
//! typed in by hand.

pub mod error;
pub mod generator;

pub use error::RuleGenError;
pub use generator::{
    generate_rules, DisabledRuleGenerator, HttpRuleGenerator, RuleGenerator, MAX_PROMPT_CHARS,
};
