use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use thiserror::Error;
use validator::ValidationErrors;

use crate::services::quiz_pipeline::PipelineError;
use crate::services::quiz_service::QuizAccessError;
use crate::store::StoreError;

/// Boundary error for every handler.
///
/// Validation failures carry a field → messages map; everything else is a
/// `{"detail": ...}` body. Upstream failures additionally name the pipeline
/// stage that broke so a 502 from a dead downloader is distinguishable from
/// one thrown by the language model.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(Map<String, Value>),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{stage} stage failed: {detail}")]
    Upstream { stage: &'static str, detail: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Single-field validation error, shaped like the multi-field map.
    pub fn field(field: &str, message: &str) -> Self {
        let mut map = Map::new();
        map.insert(field.to_string(), json!([message]));
        ApiError::Validation(map)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        ApiError::AuthenticationFailed(message.into())
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut map = Map::new();
        for (field, field_errors) in errors.field_errors() {
            let messages: Vec<Value> = field_errors
                .iter()
                .map(|e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "This field is invalid.".to_string());
                    Value::String(message)
                })
                .collect();
            map.insert(field.to_string(), Value::Array(messages));
        }
        ApiError::Validation(map)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(anyhow::Error::new(err))
    }
}

impl From<QuizAccessError> for ApiError {
    fn from(err: QuizAccessError) -> Self {
        match err {
            QuizAccessError::NotFound => ApiError::NotFound("Not found.".to_string()),
            QuizAccessError::Forbidden => ApiError::PermissionDenied(
                "You do not have permission to perform this action.".to_string(),
            ),
            QuizAccessError::Store(err) => err.into(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::Upstream {
            stage: err.stage(),
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(map) => {
                (StatusCode::BAD_REQUEST, Json(Value::Object(map))).into_response()
            }
            ApiError::AuthenticationFailed(detail) => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "detail": detail }))).into_response()
            }
            ApiError::PermissionDenied(detail) => {
                (StatusCode::FORBIDDEN, Json(json!({ "detail": detail }))).into_response()
            }
            ApiError::NotFound(detail) => {
                (StatusCode::NOT_FOUND, Json(json!({ "detail": detail }))).into_response()
            }
            ApiError::Upstream { stage, detail } => (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "detail": detail, "source": stage })),
            )
                .into_response(),
            ApiError::Internal(err) => {
                tracing::error!("Internal error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "Internal server error." })),
                )
                    .into_response()
            }
        }
    }
}
