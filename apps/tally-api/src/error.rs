//! Error types for Tally API.
//!
//! Every failure leaves the server as a JSON body with a machine `code`, a
//! human `message` and, for validation failures, a field-keyed `errors` map:
//!
//! ```text
//! ┌──────────────────────────────┬────────┬──────────────────────┐
//! │ Source                       │ Status │ code                 │
//! ├──────────────────────────────┼────────┼──────────────────────┤
//! │ missing / bad bearer token   │ 401    │ unauthenticated      │
//! │ CoreError::Forbidden         │ 403    │ forbidden            │
//! │ CoreError::OwnershipViolation│ 403    │ ownership_violation  │
//! │ CoreError::NotFound, DbError │ 404    │ not_found            │
//! │ CoreError::Conflict          │ 409    │ conflict             │
//! │ ValidationErrors, rejections │ 422    │ validation_failed    │
//! │ anything else                │ 500    │ internal_error       │
//! └──────────────────────────────┴────────┴──────────────────────┘
//! ```
//!
//! Internal details (SQL text, Redis errors) are logged, never returned.

use std::collections::BTreeMap;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use tally_core::{CoreError, ValidationErrors};
use tally_db::DbError;

/// Tally API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("{message}")]
    Validation {
        message: String,
        errors: BTreeMap<String, Vec<String>>,
    },

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    OwnershipViolation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for handlers and services.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Forbidden(_) | ApiError::OwnershipViolation(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::Validation { .. } => "validation_failed",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::OwnershipViolation(_) => "ownership_violation",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Internal(_) => "internal_error",
        }
    }

    /// A single-field validation failure.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut errors = BTreeMap::new();
        errors.insert(field.into(), vec![message.clone()]);
        ApiError::Validation { message, errors }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a BTreeMap<String, Vec<String>>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            ApiError::Internal(detail) => {
                error!(detail = %detail, "Request failed with internal error");
                "Internal server error".to_string()
            }
            ApiError::Unauthenticated(_) => "Unauthenticated.".to_string(),
            other => other.to_string(),
        };

        let errors = match &self {
            ApiError::Validation { errors, .. } => Some(errors),
            _ => None,
        };

        let body = ErrorBody {
            code: self.code(),
            message,
            errors,
        };

        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation {
            message: errors.to_string(),
            errors: errors.to_field_map(),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            CoreError::Forbidden { .. } => ApiError::Forbidden(err.to_string()),
            CoreError::OwnershipViolation { .. } => ApiError::OwnershipViolation(err.to_string()),
            CoreError::Conflict(_) => ApiError::Conflict(err.to_string()),
            CoreError::Validation(errors) => errors.into(),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, .. } => ApiError::NotFound(format!("{entity} not found")),
            DbError::UniqueViolation { .. } => {
                ApiError::Conflict("The resource already exists".to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Internal(format!("Failed to serialize response: {err}"))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid("body", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::invalid("query", rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::ValidationError;

    #[test]
    fn test_core_errors_map_to_statuses() {
        let cases = [
            (CoreError::not_found("Transaction", "TXN-1"), StatusCode::NOT_FOUND),
            (
                CoreError::Forbidden {
                    capability: "manage-users".into(),
                },
                StatusCode::FORBIDDEN,
            ),
            (
                CoreError::OwnershipViolation {
                    requested: 2,
                    owned: 1,
                },
                StatusCode::FORBIDDEN,
            ),
            (CoreError::Conflict("id".into()), StatusCode::CONFLICT),
            (
                ValidationError::Required {
                    field: "products".into(),
                }
                .into(),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];

        for (core, status) in cases {
            assert_eq!(ApiError::from(core).status(), status);
        }
    }

    #[test]
    fn test_db_errors_hide_internals() {
        let err: ApiError = DbError::QueryFailed("no such table: sales".into()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_validation_keeps_field_map() {
        let mut errors = ValidationErrors::new();
        errors.push(ValidationError::MustBePositive {
            field: "products.0.quantity".into(),
        });
        let ApiError::Validation { errors, .. } = ApiError::from(errors) else {
            panic!("expected validation error");
        };
        assert_eq!(errors["products.0.quantity"], vec!["products.0.quantity must be positive"]);
    }
}
