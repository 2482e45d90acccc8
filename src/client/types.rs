//! Wire shapes of the identity service's JSON contract.

use serde::{Deserialize, Serialize};

use crate::models::User;

#[derive(Serialize, Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct OAuthExchangeRequest {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Returned by login, register and the OAuth exchange.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Deserialize, Debug)]
pub(crate) struct RefreshResponse {
    pub token: String,
}

#[derive(Deserialize, Debug)]
pub(crate) struct AuthorizationUrlResponse {
    pub url: String,
}

/// `/auth/me` answers either with the bare user or wrapped in `{ "user": .. }`.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub(crate) enum MeResponse {
    Wrapped { user: User },
    Bare(User),
}

impl MeResponse {
    pub fn into_user(self) -> User {
        match self {
            MeResponse::Wrapped { user } | MeResponse::Bare(user) => user,
        }
    }
}

/// Error bodies use one of `message`, `error` or `detail`.
#[derive(Deserialize, Debug, Default)]
pub(crate) struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
    detail: Option<String>,
}

impl ErrorBody {
    pub fn text(self) -> Option<String> {
        self.message.or(self.error).or(self.detail)
    }
}
