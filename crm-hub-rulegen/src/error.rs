//! Rule generation error types

use crm_hub_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuleGenError {
    #[error("Invalid prompt: {0}")]
    InvalidPrompt(String),

    #[error("Rule generation service unavailable: {0}")]
    Unavailable(String),

    #[error("Generated rules rejected: {0}")]
    InvalidRules(#[from] CoreError),
}
