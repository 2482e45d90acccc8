//! Server-rendered pages. Markup only; styling is left to the deployment.

mod pages;

pub use pages::{dashboard_page, error_page, profile_page, sign_in_page, sign_up_page, FormState};
