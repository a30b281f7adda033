pub mod auth;
pub mod error;
pub mod middleware;
pub mod tasks;
