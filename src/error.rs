// src/error.rs
use crate::registry::ActionType;
use actix_web::error::{JsonPayloadError, QueryPayloadError};
use actix_web::{HttpRequest, HttpResponse, ResponseError, http::StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// A single failed field check. `field` is a dotted path into the checked value.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{}", first_message(.0))]
    Validation(Vec<ValidationError>),

    #[error("{0} not found")]
    NotFound(String),

    #[error("\"{}\" is coming soon and cannot be selected yet", action_name(.0))]
    Unavailable(ActionType),

    #[error("Cannot change {entity} {id} from {from} to {to}")]
    Transition {
        entity: &'static str,
        id: i64,
        from: String,
        to: String,
    },

    /// Non-success reply from a remote call; the message is shown as-is.
    #[error("{0}")]
    Backend(String),

    #[error("Request could not be completed: {0}")]
    Network(String),

    #[error("Another request is still in progress")]
    Busy,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn action_name(action_type: &ActionType) -> &'static str {
    crate::registry::definition(*action_type).name
}

fn first_message(errors: &[ValidationError]) -> String {
    errors
        .first()
        .map(|e| e.message.clone())
        .unwrap_or_else(|| "Invalid input".to_string())
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation(vec![ValidationError::new(field, message)])
    }

    /// Field of the first failing check, if this is a validation failure.
    pub fn first_field(&self) -> Option<&str> {
        match self {
            AppError::Validation(errors) => errors.first().map(|e| e.field.as_str()),
            _ => None,
        }
    }

    /// Message suitable for a toast. Internal details never leak here.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Database(_) => "Internal server error".to_string(),
            AppError::Network(_) => "Request failed, please try again".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<Vec<ValidationError>> for AppError {
    fn from(errors: Vec<ValidationError>) -> Self {
        AppError::Validation(errors)
    }
}

impl From<ValidationError> for AppError {
    fn from(error: ValidationError) -> Self {
        AppError::Validation(vec![error])
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::Network(error.to_string())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unavailable(_) | AppError::Transition { .. } | AppError::Busy => {
                StatusCode::CONFLICT
            }
            AppError::Backend(_) | AppError::Network(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Database(e) => tracing::error!("Database error: {}", e),
            AppError::Network(e) => tracing::error!("Network error: {}", e),
            other => tracing::debug!("Request rejected: {}", other),
        }

        let mut body = json!({
            "success": false,
            "message": self.user_message(),
        });
        if let AppError::Validation(errors) = self {
            body["field"] = json!(self.first_field());
            body["errors"] = json!(errors);
        }
        HttpResponse::build(self.status_code()).json(body)
    }
}

/// Renders malformed JSON bodies in the same `{success, message}` shape.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::validation("body", format!("Invalid request body: {}", err)).into()
}

pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::validation("query", format!("Invalid query string: {}", err)).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_is_first_failure() {
        let err = AppError::Validation(vec![
            ValidationError::new("like.rate", "Rate must be between 0 and 100"),
            ValidationError::new("like.gap_to", "Gap to must be at least gap from"),
        ]);
        assert_eq!(err.to_string(), "Rate must be between 0 and 100");
        assert_eq!(err.first_field(), Some("like.rate"));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn backend_message_passes_through_verbatim() {
        let err = AppError::Backend("Device 7 is offline".to_string());
        assert_eq!(err.user_message(), "Device 7 is offline");
    }

    #[test]
    fn database_details_are_hidden() {
        let err = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.user_message(), "Internal server error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
