//! Error taxonomy shared by every backend call.

pub use reqwest::StatusCode;
use serde::Deserialize;

/// Errors produced by the backend client, the session manager and the
/// streaming consumer
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The operation needs a bearer token and none is stored. No request
    /// was sent.
    #[error("Not authenticated")]
    Unauthenticated,

    /// The backend could not be reached
    #[error("Could not reach the server: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-success status
    #[error("{message}")]
    Backend { status: StatusCode, message: String },

    /// A success body did not have the expected shape
    #[error("Unexpected response from server: {0}")]
    Parse(String),

    /// The answer stream broke after it was established
    #[error("Answer stream interrupted: {0}")]
    Stream(String),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Text suitable for a notification or an inline form error
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Unauthenticated => "Please log in first".to_string(),
            ApiError::Transport(_) => {
                "Could not reach the server. Check your connection and try again".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Backend { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status(),
            _ => None,
        }
    }

    /// True when the backend rejected the credentials themselves
    pub fn is_auth_rejection(&self) -> bool {
        matches!(
            self.status(),
            Some(StatusCode::UNAUTHORIZED) | Some(StatusCode::FORBIDDEN)
        ) || matches!(self, ApiError::Unauthenticated)
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// Pull a human-readable message out of a `{detail}` error body.
///
/// Only a string `detail` is surfaced; validation error lists and bodies that
/// are not JSON fall back to `fallback`.
pub(crate) fn detail_message(body: &str, fallback: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail)
        .and_then(|d| match d {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s),
            _ => None,
        })
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_string_is_used_verbatim() {
        let msg = detail_message(r#"{"detail":"Incorrect email or password"}"#, "Login failed");
        assert_eq!(msg, "Incorrect email or password");
    }

    #[test]
    fn test_detail_falls_back_on_garbage() {
        assert_eq!(detail_message("<html>502</html>", "Login failed"), "Login failed");
        assert_eq!(detail_message("", "Login failed"), "Login failed");
    }

    #[test]
    fn test_detail_list_falls_back() {
        let body = r#"{"detail":[{"loc":["body","email"],"msg":"field required"}]}"#;
        assert_eq!(detail_message(body, "Failed to register"), "Failed to register");
    }

    #[test]
    fn test_backend_error_displays_message() {
        let err = ApiError::Backend {
            status: StatusCode::NOT_FOUND,
            message: "User not found".to_string(),
        };
        assert_eq!(err.user_message(), "User not found");
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert!(!err.is_auth_rejection());
    }

    #[test]
    fn test_unauthenticated_is_auth_rejection() {
        assert!(ApiError::Unauthenticated.is_auth_rejection());
        assert_eq!(ApiError::Unauthenticated.user_message(), "Please log in first");
    }
}
