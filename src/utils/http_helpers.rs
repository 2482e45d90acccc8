use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::client::ApiError;

/// A general purpose HTTP error type that can be converted into an `IntoResponse`.
#[derive(Debug)]
pub struct HTTPError {
    status: StatusCode,
    message: String,
}

impl HTTPError {
    /// Creates a new HTTP error with the given status code and message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        HTTPError {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HTTPError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Remote identity failures seen by the shell map onto gateway statuses.
impl From<ApiError> for HTTPError {
    fn from(err: ApiError) -> Self {
        let status = match &err {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Server { status, .. } if *status == 404 => StatusCode::NOT_FOUND,
            ApiError::Network(_) => StatusCode::BAD_GATEWAY,
            ApiError::Server { .. } | ApiError::Decode(_) => StatusCode::BAD_GATEWAY,
        };
        HTTPError::new(status, err.to_string())
    }
}

/// A 303 redirect, optionally carrying a `Set-Cookie` header.
pub fn see_other(location: &str, set_cookie: Option<String>) -> Response {
    let mut response = Response::builder()
        .status(StatusCode::SEE_OTHER)
        .header(header::LOCATION, location);
    if let Some(cookie) = set_cookie {
        response = response.header(header::SET_COOKIE, cookie);
    }
    response
        .body(axum::body::Body::empty())
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
