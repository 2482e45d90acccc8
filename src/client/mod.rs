//! HTTP client for the remote identity service.

mod error;
mod identity_client;
pub mod types;

pub use error::ApiError;
pub use identity_client::IdentityClient;
pub use types::{AuthResponse, LoginRequest, OAuthExchangeRequest, RegisterRequest};
