//! API layer - the `/api` HTTP surface.
//!
//! Handlers stay thin: extract and validate, call a service from
//! [`AppState`], map the domain value to a response DTO. Bearer auth and
//! Redis-backed rate limiting are route layers in [`middleware`].

pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use routes::create_router;
pub use state::AppState;
