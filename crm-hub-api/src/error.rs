//! API error types and error handling

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use crm_hub_core::CoreError;
use crm_hub_rulegen::RuleGenError;
use crm_hub_storage::StorageError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::NotFound(_) => "not_found",
            ApiError::UpstreamUnavailable(_) => "upstream_unavailable",
            ApiError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidRule(_) | CoreError::Validation(_) => {
                ApiError::Validation(err.to_string())
            }
            CoreError::InvalidTransition { .. }
            | CoreError::Serialization(_)
            | CoreError::Overflow(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => ApiError::NotFound(msg),
            StorageError::AlreadyExists(msg) => ApiError::Validation(msg),
            StorageError::Connection(msg) => ApiError::UpstreamUnavailable(msg),
            StorageError::Rejected(core) => ApiError::from(core),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<RuleGenError> for ApiError {
    fn from(err: RuleGenError) -> Self {
        match err {
            RuleGenError::InvalidPrompt(_) | RuleGenError::InvalidRules(_) => {
                ApiError::Validation(err.to_string())
            }
            RuleGenError::Unavailable(_) => ApiError::UpstreamUnavailable(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
            kind: self.kind(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_hub_core::CampaignStatus;
    use rstest::rstest;

    #[rstest]
    #[case(
        CoreError::InvalidRule("unknown field 'age'".into()).into(),
        StatusCode::BAD_REQUEST,
        "validation_error"
    )]
    #[case(
        StorageError::AlreadyExists("dup".into()).into(),
        StatusCode::BAD_REQUEST,
        "validation_error"
    )]
    #[case(StorageError::NotFound("gone".into()).into(), StatusCode::NOT_FOUND, "not_found")]
    #[case(
        StorageError::Connection("refused".into()).into(),
        StatusCode::SERVICE_UNAVAILABLE,
        "upstream_unavailable"
    )]
    #[case(
        StorageError::Query("syntax error".into()).into(),
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error"
    )]
    #[case(
        StorageError::Rejected(CoreError::Validation("bad".into())).into(),
        StatusCode::BAD_REQUEST,
        "validation_error"
    )]
    #[case(
        CoreError::Overflow("totalSpend".into()).into(),
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error"
    )]
    #[case(
        RuleGenError::Unavailable("timeout".into()).into(),
        StatusCode::SERVICE_UNAVAILABLE,
        "upstream_unavailable"
    )]
    #[case(
        RuleGenError::InvalidPrompt("prompt is required".into()).into(),
        StatusCode::BAD_REQUEST,
        "validation_error"
    )]
    #[case(
        CoreError::InvalidTransition {
            from: CampaignStatus::Completed,
            to: CampaignStatus::Processing,
        }
        .into(),
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error"
    )]
    fn test_lower_layer_errors_map_to_kinds(
        #[case] err: ApiError,
        #[case] status: StatusCode,
        #[case] kind: &str,
    ) {
        assert_eq!(err.status(), status, "{}", err);
        assert_eq!(err.kind(), kind, "{}", err);
    }

    #[test]
    fn test_validation_message_is_unprefixed() {
        let err = ApiError::from(StorageError::AlreadyExists(
            "Customer with email a@example.com already exists".into(),
        ));
        assert_eq!(err.to_string(), "Customer with email a@example.com already exists");
    }
}
