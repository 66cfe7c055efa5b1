pub mod admin;
pub mod auth;
pub mod order;
pub mod product;
pub mod stats;
