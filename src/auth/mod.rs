//! # Auth Module
//!
//! This module handles all authentication-related functionality including:
//! - Session token minting, verification and sliding refresh
//! - Current-user resolution for every request
//! - Google OAuth sign-in and identity reconciliation
//! - Local email/password sign-up and sign-in

pub mod current_user;
pub mod google;
pub mod handlers;
pub mod models;
pub mod password;
pub mod reconcile;
pub mod routes;
pub mod session;
pub mod store;
pub mod token;
pub mod validators;

#[cfg(test)]
mod tests;

pub use current_user::current_user_middleware;
pub use routes::auth_routes;
pub use session::session_middleware;
