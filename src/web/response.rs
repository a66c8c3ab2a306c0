use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::AuthError;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AuthError::UnknownProvider(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AuthError::MissingProviderName
            | AuthError::UnsupportedFlow { .. }
            | AuthError::MissingAuthorizationCode
            | AuthError::ProviderDenied { .. }
            | AuthError::StateMismatch { .. } => {
                tracing::warn!(error = %self, "rejected authentication request");
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AuthError::SessionNotFound | AuthError::InvalidSession(_) => {
                tracing::warn!(error = %self, "rejected authentication callback");
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            AuthError::HttpStatus { status, .. } if *status == 401 || *status == 403 => {
                (StatusCode::UNAUTHORIZED, "Access token rejected".to_string())
            }
            AuthError::Http(_)
            | AuthError::HttpStatus { .. }
            | AuthError::InvalidResponse { .. }
            | AuthError::InvalidHeader { .. } => {
                tracing::error!(error = %self, "authentication provider error");
                (
                    StatusCode::BAD_GATEWAY,
                    "Authentication provider error".to_string(),
                )
            }
            AuthError::Io(_)
            | AuthError::OsRng { .. }
            | AuthError::Url(_)
            | AuthError::Json(_)
            | AuthError::Store(_)
            | AuthError::Config(_) => {
                tracing::error!(error = %self, "internal authentication error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_errors_to_status_codes() {
        let cases = [
            (
                AuthError::UnknownProvider("x".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (AuthError::MissingProviderName, StatusCode::BAD_REQUEST),
            (AuthError::SessionNotFound, StatusCode::UNAUTHORIZED),
            (
                AuthError::HttpStatus {
                    status: 401,
                    body: String::new(),
                },
                StatusCode::UNAUTHORIZED,
            ),
            (
                AuthError::HttpStatus {
                    status: 500,
                    body: String::new(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                AuthError::Store("down".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
