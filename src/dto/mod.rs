pub mod auth;
pub mod cart;
pub mod categories;
pub mod products;
pub mod upload;
pub mod users;
