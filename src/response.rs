use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Field-name to messages map returned when input validation fails.
pub type FieldErrors = BTreeMap<&'static str, Vec<String>>;

/// `{"success": ..., "message": ...}` body used by operational replies.
#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub success: bool,
    pub message: String,
}

/// Failure reply. The API reports every outcome with HTTP 200; the
/// `success` flag, or for validation the raw field-error map, is the only
/// machine-readable indicator.
#[derive(Debug)]
pub enum ApiError {
    /// Raw field-error map, no `success` key.
    Invalid(FieldErrors),
    /// `{"success": false, "message": ...}`.
    Failure(String),
}

impl ApiError {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Invalid(errors) => (StatusCode::OK, Json(errors)).into_response(),
            ApiError::Failure(message) => (
                StatusCode::OK,
                Json(StatusBody {
                    success: false,
                    message,
                }),
            )
                .into_response(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::Failure(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_body_serializes_success_flag() {
        let body = StatusBody {
            success: false,
            message: "User is not Authenticated.".into(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "User is not Authenticated.");
    }

    #[test]
    fn field_errors_serialize_as_map_of_lists() {
        let mut errors = FieldErrors::new();
        errors
            .entry("email")
            .or_default()
            .push("The email has already been taken.".into());
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["email"][0], "The email has already been taken.");
    }
}
