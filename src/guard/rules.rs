//! Per-request route decisions. Nothing here keeps state between requests.

use crate::config::{RoutesConfig, SessionConfig};
use crate::models::token;

/// What the guard concluded about a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteState {
    /// Protected path without a usable credential.
    NeedsAuth,
    /// Sign-in or sign-up page while a valid credential exists.
    AlreadyAuthenticated,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Pass,
    Redirect {
        location: String,
        /// The request carried an expired or undecodable auth cookie.
        clear_cookie: bool,
    },
}

/// The parts of a request the guard looks at.
#[derive(Debug, Clone, Default)]
pub struct GuardRequest<'a> {
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub cookie_token: Option<&'a str>,
    pub bearer_token: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct RouteRules {
    sign_in: String,
    dashboard: String,
    oauth_callback: String,
    protected: Vec<String>,
    auth_entry: Vec<String>,
    callback_param: String,
    oauth_evidence: Vec<String>,
    cookie_name: String,
}

/// Segment-aware prefix match: `/dashboard` covers `/dashboard/x` but not
/// `/dashboards`.
fn path_under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

impl RouteRules {
    pub fn new(routes: &RoutesConfig, session: &SessionConfig) -> Self {
        RouteRules {
            sign_in: routes.sign_in.clone(),
            dashboard: routes.dashboard.clone(),
            oauth_callback: routes.oauth_callback.clone(),
            protected: routes.protected.clone(),
            auth_entry: routes.auth_entry().iter().map(|p| p.to_string()).collect(),
            callback_param: routes.callback_param.clone(),
            oauth_evidence: routes.oauth_evidence.clone(),
            cookie_name: session.cookie_name.clone(),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn is_protected(&self, path: &str) -> bool {
        self.protected.iter().any(|prefix| path_under(path, prefix))
    }

    pub fn is_auth_entry(&self, path: &str) -> bool {
        self.auth_entry.iter().any(|entry| path_under(path, entry))
    }

    fn has_oauth_evidence(&self, query: Option<&str>) -> bool {
        query
            .unwrap_or_default()
            .split('&')
            .filter_map(|pair| {
                let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
                (!value.is_empty()).then_some(name)
            })
            .any(|name| self.oauth_evidence.iter().any(|e| e == name))
    }

    /// Classifies the request, before any redirect target is built.
    pub fn classify(&self, request: &GuardRequest<'_>) -> RouteState {
        if path_under(request.path, &self.oauth_callback) {
            return RouteState::Neutral;
        }
        let authenticated = [request.cookie_token, request.bearer_token]
            .into_iter()
            .flatten()
            .any(|t| !token::is_expired(t));

        if self.is_protected(request.path)
            && !authenticated
            && !self.has_oauth_evidence(request.query)
        {
            RouteState::NeedsAuth
        } else if self.is_auth_entry(request.path) && authenticated {
            RouteState::AlreadyAuthenticated
        } else {
            RouteState::Neutral
        }
    }

    pub fn evaluate(&self, request: &GuardRequest<'_>) -> GuardDecision {
        match self.classify(request) {
            RouteState::Neutral => GuardDecision::Pass,
            RouteState::AlreadyAuthenticated => GuardDecision::Redirect {
                location: self.dashboard.clone(),
                clear_cookie: false,
            },
            RouteState::NeedsAuth => {
                let original = match request.query {
                    Some(q) if !q.is_empty() => format!("{}?{}", request.path, q),
                    _ => request.path.to_string(),
                };
                GuardDecision::Redirect {
                    location: format!(
                        "{}?{}={}",
                        self.sign_in,
                        self.callback_param,
                        urlencoding::encode(&original)
                    ),
                    clear_cookie: request.cookie_token.is_some(),
                }
            }
        }
    }
}
