//! Contacts API - a personal address book over HTTP
//!
//! Users sign up, confirm their email and log in with JWTs; each user
//! keeps a private list of contacts that can be searched and queried
//! for upcoming birthdays.
//!
//! # Architecture Layers
//!
//! - **cli**: Command-line interface
//! - **commands**: CLI command implementations
//! - **config**: Application configuration and constants
//! - **domain**: Core entities (users, contacts, birthday windows)
//! - **services**: Application use cases and business logic
//! - **infra**: Database, migrations, repositories, Redis cache
//! - **api**: HTTP handlers, middleware, and routes
//! - **jobs**: Background email delivery
//! - **types**: Shared types (pagination, responses)
//! - **errors**: Centralized error handling
//!
//! # CLI Usage
//!
//! ```bash
//! # Start the server (applies pending migrations)
//! cargo run -- serve
//!
//! # Run migrations by hand
//! cargo run -- migrate up
//!
//! # Deliver queued email
//! cargo run -- jobs work
//! ```

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod infra;
pub mod jobs;
pub mod services;
pub mod types;

// Re-export commonly used types at crate root
pub use api::{create_router, AppState};
pub use config::Config;
pub use domain::{Contact, Password, User, UserRole};
pub use errors::{AppError, AppResult};
pub use infra::Cache;
