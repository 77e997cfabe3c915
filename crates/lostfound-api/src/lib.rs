pub mod auth;
pub mod error;
pub mod items;
pub mod middleware;
pub mod notifications;
pub mod routes;
