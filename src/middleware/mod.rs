pub mod auth;
pub mod identity;
