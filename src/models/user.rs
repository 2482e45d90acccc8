use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::token::Claims;

/// How the account signs in.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    #[default]
    Email,
    Google,
}

impl AuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthProvider::Email => "email",
            AuthProvider::Google => "google",
        }
    }

    /// Parses an OAuth provider tag. `email` is not an OAuth provider.
    pub fn oauth(tag: &str) -> Option<Self> {
        match tag {
            "google" => Some(AuthProvider::Google),
            _ => None,
        }
    }
}

/// The authenticated identity, as returned by the identity service.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub provider: AuthProvider,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Builds a minimal identity from unverified token claims.
    ///
    /// Used only as a fallback when the identity service cannot be reached.
    /// Returns `None` when the claims carry no subject or no email.
    pub fn from_claims(claims: &Claims) -> Option<Self> {
        let id = claims.subject()?.to_string();
        let email = claims.email.clone().filter(|e| !e.is_empty())?;
        let name = claims
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or(&email).to_string());
        let issued = claims
            .iat
            .and_then(|iat| Utc.timestamp_opt(iat, 0).single())
            .unwrap_or_else(Utc::now);

        Some(User {
            id,
            email,
            name,
            provider: AuthProvider::Email,
            avatar: None,
            is_verified: false,
            created_at: issued,
            updated_at: issued,
        })
    }
}

/// Display projection of a user for the profile page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileView {
    pub display_name: String,
    pub initials: String,
    pub email: String,
    pub provider_label: &'static str,
    pub verification_label: &'static str,
    pub member_since: String,
    pub avatar: Option<String>,
}

impl From<&User> for ProfileView {
    fn from(user: &User) -> Self {
        let display_name = if user.name.trim().is_empty() {
            user.email.clone()
        } else {
            user.name.trim().to_string()
        };
        let initials: String = display_name
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .take(2)
            .flat_map(char::to_uppercase)
            .collect();

        ProfileView {
            display_name,
            initials,
            email: user.email.clone(),
            provider_label: match user.provider {
                AuthProvider::Email => "Email and password",
                AuthProvider::Google => "Google",
            },
            verification_label: if user.is_verified {
                "Verified"
            } else {
                "Not verified"
            },
            member_since: user.created_at.format("%B %-d, %Y").to_string(),
            avatar: user.avatar.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: "u-1".to_string(),
            email: "ada@example.com".to_string(),
            name: "Ada Lovelace".to_string(),
            provider: AuthProvider::Google,
            avatar: None,
            is_verified: true,
            created_at: Utc.with_ymd_and_hms(2024, 3, 7, 10, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 3, 7, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn deserializes_service_payload() {
        let user: User = serde_json::from_value(serde_json::json!({
            "id": "u-1",
            "email": "ada@example.com",
            "name": "Ada",
            "provider": "google",
            "avatar": "https://cdn.example.com/a.png",
            "isVerified": true,
            "createdAt": "2024-03-07T10:00:00Z",
            "updatedAt": "2024-03-08T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(user.provider, AuthProvider::Google);
        assert!(user.is_verified);
        assert_eq!(user.avatar.as_deref(), Some("https://cdn.example.com/a.png"));
    }

    #[test]
    fn claims_fallback_needs_subject_and_email() {
        let claims = Claims {
            sub: Some("u-7".into()),
            email: Some("grace@example.com".into()),
            iat: Some(1_700_000_000),
            ..Default::default()
        };
        let user = User::from_claims(&claims).unwrap();
        assert_eq!(user.id, "u-7");
        assert_eq!(user.name, "grace");
        assert_eq!(user.provider, AuthProvider::Email);
        assert!(!user.is_verified);
        assert_eq!(user.created_at.timestamp(), 1_700_000_000);

        let no_email = Claims {
            sub: Some("u-7".into()),
            ..Default::default()
        };
        assert!(User::from_claims(&no_email).is_none());

        let no_subject = Claims {
            email: Some("grace@example.com".into()),
            ..Default::default()
        };
        assert!(User::from_claims(&no_subject).is_none());
    }

    #[test]
    fn profile_view() {
        let view = ProfileView::from(&sample_user());
        assert_eq!(view.initials, "AL");
        assert_eq!(view.provider_label, "Google");
        assert_eq!(view.verification_label, "Verified");
        assert_eq!(view.member_since, "March 7, 2024");
    }

    #[test]
    fn oauth_provider_tags() {
        assert_eq!(AuthProvider::oauth("google"), Some(AuthProvider::Google));
        assert_eq!(AuthProvider::oauth("email"), None);
        assert_eq!(AuthProvider::Google.as_str(), "google");
    }
}
