//! Shared application state.

use std::sync::Arc;

use crate::client::IdentityClient;
use crate::config::ConfigV1;
use crate::guard::RouteRules;

/// State cloned into every handler and the route guard.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConfigV1>,
    /// Client for the remote identity service.
    pub identity: Arc<IdentityClient>,
    pub rules: Arc<RouteRules>,
}

impl AppState {
    pub fn new(config: Arc<ConfigV1>, identity: IdentityClient) -> Self {
        let rules = RouteRules::new(&config.routes, &config.session);
        AppState {
            config,
            identity: Arc::new(identity),
            rules: Arc::new(rules),
        }
    }
}
