//! Application services layer - Use cases and business logic.
//!
//! Services orchestrate domain logic and infrastructure to fulfill
//! application use cases. They depend on abstractions (traits) so the
//! HTTP layer and the tests can swap implementations.

mod auth_service;
mod avatar;
mod contact_service;
pub mod container;
mod mailer;
pub mod tokens;
mod user_service;

pub use container::{ServiceContainer, Services};

pub use auth_service::{AuthService, Authenticator, EmailConfirmation, TokenResponse};
pub use avatar::{AvatarStore, AvatarUpload, CloudinaryStore, StoredAvatar};
pub use contact_service::{
    birthdays_cache_key, owner_cache_pattern, search_cache_key, ContactManager, ContactService,
    EMPTY_SEARCH_MESSAGE,
};
pub use mailer::{Mailer, QueueMailer};
pub use tokens::{Claims, TokenIssuer, TokenKind};
pub use user_service::{UserManager, UserService};

#[cfg(any(test, feature = "test-utils"))]
pub use avatar::MockAvatarStore;
#[cfg(any(test, feature = "test-utils"))]
pub use container::MockServiceContainer;
#[cfg(any(test, feature = "test-utils"))]
pub use mailer::MockMailer;
