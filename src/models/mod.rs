pub mod token;
pub mod user;

pub use token::{decode_claims, is_expired, Claims};
pub use user::{AuthProvider, ProfileView, User};
