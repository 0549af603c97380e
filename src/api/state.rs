//! Application state - Dependency injection container.
//!
//! Provides centralized access to all application services and infrastructure.

use std::sync::Arc;

use crate::config::Config;
use crate::infra::{CacheStore, Database, HealthCheck};
use crate::services::{
    AuthService, ContactService, Mailer, ServiceContainer, Services, UserService,
};

/// Application state containing all services (DI container).
#[derive(Clone)]
pub struct AppState {
    /// Authentication service
    pub auth_service: Arc<dyn AuthService>,
    /// User service
    pub user_service: Arc<dyn UserService>,
    /// Contact service
    pub contact_service: Arc<dyn ContactService>,
    /// Redis cache (rate limiting, health)
    pub cache: Arc<dyn CacheStore>,
    /// Database liveness check
    pub database: Arc<dyn HealthCheck>,
}

impl AppState {
    /// Create application state from a live database, cache and mailer.
    ///
    /// Services are wired through `Services::from_connection` over one
    /// shared Unit of Work.
    pub fn from_config(
        database: Arc<Database>,
        cache: Arc<dyn CacheStore>,
        mailer: Arc<dyn Mailer>,
        config: Config,
    ) -> Self {
        let container =
            Services::from_connection(database.get_connection(), cache.clone(), mailer, config);

        Self::from_container(&container, cache, database)
    }

    /// Create application state from any service container.
    pub fn from_container(
        container: &dyn ServiceContainer,
        cache: Arc<dyn CacheStore>,
        database: Arc<dyn HealthCheck>,
    ) -> Self {
        Self {
            auth_service: container.auth(),
            user_service: container.users(),
            contact_service: container.contacts(),
            cache,
            database,
        }
    }

    /// Create new application state with manually injected services.
    pub fn new(
        auth_service: Arc<dyn AuthService>,
        user_service: Arc<dyn UserService>,
        contact_service: Arc<dyn ContactService>,
        cache: Arc<dyn CacheStore>,
        database: Arc<dyn HealthCheck>,
    ) -> Self {
        Self {
            auth_service,
            user_service,
            contact_service,
            cache,
            database,
        }
    }
}
