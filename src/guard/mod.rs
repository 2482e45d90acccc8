//! Route guard: decides per request whether a page may be served, or where
//! the browser should go instead.

pub(crate) mod middleware;
mod rules;

pub use middleware::route_guard;
pub use rules::{GuardDecision, GuardRequest, RouteRules, RouteState};
