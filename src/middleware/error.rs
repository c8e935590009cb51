use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Errors surfaced by portal handlers.
///
/// Rendered as `{ "message": ... }` so the UI can show the text directly.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    /// No session cookie on the request.
    #[error("Not authenticated")]
    Unauthenticated,

    /// Session cookie present but the session is gone or expired.
    #[error("Session expired")]
    SessionExpired,

    /// Authenticated, but the role may not perform this action.
    #[error("Forbidden")]
    Forbidden,

    /// The requested resource does not exist or is not configured.
    #[error("{0}")]
    NotFound(String),

    /// Missing or malformed form data.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Remote API call failed.
    #[error(transparent)]
    Upstream(#[from] crate::error::Error),

    /// Session store operation failed.
    #[error("Session store error: {0}")]
    Store(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PortalError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated | Self::SessionExpired => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(e) => e
                .status()
                .and_then(|s| StatusCode::from_u16(s).ok())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            Self::Store(_) | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Upstream(e) => e.user_message(),
            Self::BadRequest(msg) => msg.clone(),
            Self::Store(_) | Self::Config(_) => {
                tracing::error!(error = %self, "Portal internal error");
                "Internal error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_status_mapping() {
        assert_eq!(PortalError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(PortalError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            PortalError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            PortalError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PortalError::Store("down".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_upstream_status_passes_through() {
        let err = PortalError::from(Error::Api {
            operation: "login",
            status: 422,
            message: "Email is invalid".into(),
        });
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = PortalError::from(Error::Decode("bad".into()));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }
}
