//! Bearer credential handling.
//!
//! Only the claims segment of a token is ever decoded here; the signature is
//! left to the identity service, which is the trust boundary.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Claims carried in the middle segment of a credential.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    /// Some issuers put the user id in `id`/`userId` rather than `sub`.
    #[serde(default, alias = "userId")]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
}

impl Claims {
    /// Subject identifier, preferring the explicit `id` claim.
    pub fn subject(&self) -> Option<&str> {
        self.id
            .as_deref()
            .or(self.sub.as_deref())
            .filter(|s| !s.is_empty())
    }
}

/// Decodes the claims segment of `token`.
///
/// Returns `None` when the token does not have three segments or when the
/// middle segment is not base64url-encoded JSON.
pub fn decode_claims(token: &str) -> Option<Claims> {
    let mut segments = token.trim().split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() || payload.is_empty() {
        return None;
    }

    // Tolerate padded encoders.
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| URL_SAFE.decode(payload))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Returns true when `token` is expired at `now` (seconds since the epoch).
/// Undecodable tokens and tokens without an `exp` claim count as expired.
pub fn is_expired_at(token: &str, now: i64) -> bool {
    match decode_claims(token).and_then(|claims| claims.exp) {
        Some(exp) => exp <= now,
        None => true,
    }
}

/// Returns true when `token` is expired right now.
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, Utc::now().timestamp())
}

/// Remaining lifetime of `token` in seconds, `None` when it cannot be decoded.
pub fn seconds_until_expiry(token: &str) -> Option<i64> {
    let exp = decode_claims(token)?.exp?;
    Some((exp - Utc::now().timestamp()).max(0))
}
