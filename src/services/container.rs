//! Service Container - Centralized service access.
//!
//! Wires the concrete services over one shared Unit of Work and hands
//! them out as trait objects.

use std::sync::Arc;

use super::{
    AuthService, Authenticator, AvatarStore, CloudinaryStore, ContactManager, ContactService,
    Mailer, UserManager, UserService,
};
use crate::config::Config;
use crate::infra::{CacheStore, Persistence};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Service container trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
pub trait ServiceContainer: Send + Sync {
    /// Get authentication service
    fn auth(&self) -> Arc<dyn AuthService>;

    /// Get user service
    fn users(&self) -> Arc<dyn UserService>;

    /// Get contact service
    fn contacts(&self) -> Arc<dyn ContactService>;
}

/// Concrete implementation of ServiceContainer
#[derive(Clone)]
pub struct Services {
    auth_service: Arc<dyn AuthService>,
    user_service: Arc<dyn UserService>,
    contact_service: Arc<dyn ContactService>,
}

impl Services {
    /// Create a container from already-built services
    pub fn new(
        auth_service: Arc<dyn AuthService>,
        user_service: Arc<dyn UserService>,
        contact_service: Arc<dyn ContactService>,
    ) -> Self {
        Self {
            auth_service,
            user_service,
            contact_service,
        }
    }

    /// Create service container from database connection and config
    pub fn from_connection(
        db: sea_orm::DatabaseConnection,
        cache: Arc<dyn CacheStore>,
        mailer: Arc<dyn Mailer>,
        config: Config,
    ) -> Self {
        let uow = Arc::new(Persistence::new(db));
        let avatars: Arc<dyn AvatarStore> = Arc::new(CloudinaryStore::from_config(&config));

        Self {
            auth_service: Arc::new(Authenticator::new(
                uow.clone(),
                cache.clone(),
                mailer,
                config,
            )),
            user_service: Arc::new(UserManager::new(uow.clone(), avatars)),
            contact_service: Arc::new(ContactManager::new(uow, cache)),
        }
    }
}

impl ServiceContainer for Services {
    fn auth(&self) -> Arc<dyn AuthService> {
        self.auth_service.clone()
    }

    fn users(&self) -> Arc<dyn UserService> {
        self.user_service.clone()
    }

    fn contacts(&self) -> Arc<dyn ContactService> {
        self.contact_service.clone()
    }
}
