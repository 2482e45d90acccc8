//! Library exports for authgate, shared between the binary and tests.

pub mod client;
pub mod config;
pub mod forms;
pub mod guard;
pub mod models;
pub mod routes;
pub mod session;
pub mod startup;
pub mod state;
pub mod store;
pub mod utils;
pub mod views;
