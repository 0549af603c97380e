//! User service - account lookup, avatars and role administration.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use super::avatar::{AvatarStore, AvatarUpload};
use crate::domain::{User, UserRole};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::UnitOfWork;

/// User service trait for dependency injection.
#[async_trait]
pub trait UserService: Send + Sync {
    /// Get user by ID
    async fn get_user(&self, id: Uuid) -> AppResult<User>;

    /// Change another user's role on behalf of `actor`.
    ///
    /// Only admins may do this. Setting the current role again is a no-op.
    async fn change_role(&self, actor: &User, target: Uuid, role: UserRole) -> AppResult<User>;

    /// Upload a new avatar for `user_id` and store its URL.
    ///
    /// A previous image under a different host id is removed afterwards;
    /// failing to remove it does not fail the update.
    async fn update_avatar(&self, user_id: Uuid, image: AvatarUpload) -> AppResult<User>;
}

/// Concrete implementation of UserService using Unit of Work.
pub struct UserManager<U: UnitOfWork> {
    uow: Arc<U>,
    avatars: Arc<dyn AvatarStore>,
}

impl<U: UnitOfWork> UserManager<U> {
    pub fn new(uow: Arc<U>, avatars: Arc<dyn AvatarStore>) -> Self {
        Self { uow, avatars }
    }
}

#[async_trait]
impl<U: UnitOfWork> UserService for UserManager<U> {
    async fn get_user(&self, id: Uuid) -> AppResult<User> {
        self.uow
            .users()
            .find_by_id(id)
            .await?
            .ok_or_not_found("User")
    }

    async fn change_role(&self, actor: &User, target: Uuid, role: UserRole) -> AppResult<User> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden);
        }

        let user = self.get_user(target).await?;
        if user.role == role {
            return Ok(user);
        }

        let updated = self.uow.users().update_role(target, role).await?;
        tracing::info!(actor = %actor.id, user_id = %target, role = %role, "User role changed");
        Ok(updated)
    }

    async fn update_avatar(&self, user_id: Uuid, image: AvatarUpload) -> AppResult<User> {
        if !image.is_image() {
            return Err(AppError::bad_request("Only image uploads are allowed"));
        }

        let user = self.get_user(user_id).await?;
        let stored = self.avatars.upload(user_id, image).await?;
        let updated = self
            .uow
            .users()
            .set_avatar(user_id, stored.url, stored.public_id.clone())
            .await?;

        if let Some(old) = user.public_id.filter(|old| *old != stored.public_id) {
            if let Err(e) = self.avatars.delete(&old).await {
                tracing::warn!(user_id = %user_id, public_id = %old, error = %e, "Failed to remove previous avatar");
            }
        }

        tracing::info!(user_id = %user_id, "Avatar updated");
        Ok(updated)
    }
}
