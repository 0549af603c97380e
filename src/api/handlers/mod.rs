//! HTTP request handlers.

pub mod contact_handler;
pub mod health_handler;
pub mod user_handler;

pub use contact_handler::contact_routes;
pub use health_handler::health_routes;
pub use user_handler::user_routes;
