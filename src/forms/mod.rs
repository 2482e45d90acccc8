//! Form payloads submitted by the sign-in and sign-up pages.

mod redirect;
mod validation;

pub use redirect::safe_redirect;
pub use validation::{SignInForm, SignUpForm, ValidationErrors};
