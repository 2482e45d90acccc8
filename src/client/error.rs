use thiserror::Error;

use crate::forms::ValidationErrors;

/// Every failure the remote identity boundary can surface.
///
/// Transport and HTTP failures are mapped into this enumeration inside the
/// client, so nothing above it ever sees a `reqwest::Error`.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request never produced a response (DNS, connect, timeout, ...).
    #[error("network error: {0}")]
    Network(String),

    /// The credential was missing, invalid or expired (HTTP 401).
    #[error("unauthorized")]
    Unauthorized,

    /// The service answered with a non-success status other than 401.
    #[error("identity service error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Client-side form checks failed; the request was never sent.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// A response body or token segment could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                ApiError::Unauthorized
            } else {
                ApiError::Server {
                    status: status.as_u16(),
                    message: err.to_string(),
                }
            }
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failure() {
        assert_eq!(ApiError::Unauthorized.to_string(), "unauthorized");
        assert_eq!(
            ApiError::Server {
                status: 503,
                message: "down".into()
            }
            .to_string(),
            "identity service error (503): down"
        );
        assert!(ApiError::Unauthorized.is_unauthorized());
        assert!(!ApiError::Network("reset".into()).is_unauthorized());
    }
}
