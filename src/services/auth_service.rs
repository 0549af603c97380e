//! Authentication service - sign-up, sessions, email verification and
//! password recovery.
//!
//! Refresh tokens live in two places: on the user row and in Redis under
//! `rt:{token}`. Redis is the fast path; the row is the fallback that
//! re-primes Redis. Password reset tokens exist only in Redis (`pr:{token}`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::mailer::Mailer;
use super::tokens::{TokenIssuer, TokenKind};
use crate::config::{
    Config, CACHE_PREFIX_PASSWORD_RESET, CACHE_PREFIX_REFRESH_TOKEN, TOKEN_TYPE_BEARER,
};
use crate::domain::password::DUMMY_HASH;
use crate::domain::{normalize_email, Password, User};
use crate::errors::{AppError, AppResult};
use crate::infra::{CacheStore, UnitOfWork};
use crate::jobs::EmailJob;
use crate::with_transaction;

const INVALID_RESET_TOKEN: &str = "Invalid or expired reset token";

/// Token pair returned by login and refresh
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    /// JWT access token
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub access_token: String,
    /// JWT refresh token
    pub refresh_token: String,
    #[schema(example = "bearer")]
    pub token_type: String,
}

/// Outcome of following a verification link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailConfirmation {
    Confirmed,
    AlreadyConfirmed,
}

/// Authentication service trait for dependency injection.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Register an unconfirmed user and send the verification mail
    async fn signup(&self, username: String, email: String, password: String) -> AppResult<User>;

    /// Exchange email and password for a token pair
    async fn login(&self, email: String, password: String) -> AppResult<TokenResponse>;

    /// Mint a new access token from a live refresh token
    async fn refresh(&self, refresh_token: &str) -> AppResult<TokenResponse>;

    /// Revoke the user's refresh token
    async fn logout(&self, user_id: Uuid) -> AppResult<()>;

    /// Resolve a bearer access token to its user
    async fn authenticate(&self, access_token: &str) -> AppResult<User>;

    /// Mark the email named by a verification token as confirmed
    async fn confirm_email(&self, token: &str) -> AppResult<EmailConfirmation>;

    /// Resend the verification mail if the account exists and is unconfirmed
    async fn request_email(&self, email: &str) -> AppResult<()>;

    /// Send a password reset link if the account exists
    async fn forgot_password(&self, email: &str) -> AppResult<()>;

    /// Set a new password using a reset token
    async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<()>;
}

/// Concrete implementation of AuthService using Unit of Work.
pub struct Authenticator<U: UnitOfWork> {
    uow: Arc<U>,
    cache: Arc<dyn CacheStore>,
    mailer: Arc<dyn Mailer>,
    tokens: TokenIssuer,
    config: Config,
}

impl<U: UnitOfWork> Authenticator<U> {
    pub fn new(
        uow: Arc<U>,
        cache: Arc<dyn CacheStore>,
        mailer: Arc<dyn Mailer>,
        config: Config,
    ) -> Self {
        Self {
            uow,
            cache,
            mailer,
            tokens: TokenIssuer::new(&config),
            config,
        }
    }

    fn refresh_key(token: &str) -> String {
        format!("{}{}", CACHE_PREFIX_REFRESH_TOKEN, token)
    }

    fn reset_key(token: &str) -> String {
        format!("{}{}", CACHE_PREFIX_PASSWORD_RESET, token)
    }

    fn token_response(&self, access_token: String, refresh_token: String) -> TokenResponse {
        TokenResponse {
            access_token,
            refresh_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
        }
    }

    async fn remember_refresh_token(&self, token: &str, email: &str) {
        let ttl = self.tokens.lifetime(TokenKind::Refresh).max(1) as u64;
        if let Err(e) = self
            .cache
            .set_raw(&Self::refresh_key(token), email.to_string(), ttl)
            .await
        {
            tracing::warn!(error = %e, "Failed to cache refresh token");
        }
    }

    async fn forget_refresh_token(&self, token: &str) {
        if let Err(e) = self.cache.delete(&Self::refresh_key(token)).await {
            tracing::warn!(error = %e, "Failed to drop cached refresh token");
        }
    }

    async fn send_verification(&self, user: &User) -> AppResult<()> {
        let token = self.tokens.issue(&user.email, TokenKind::EmailConfirmation)?;
        let link = format!(
            "{}/api/users/confirmed_email/{}",
            self.config.app_base_url.trim_end_matches('/'),
            token
        );

        self.mailer
            .send(EmailJob::verification(&user.email, &user.username, &link))
            .await
    }

    /// Look the refresh token up in Redis first, then on the user row.
    async fn refresh_owner(&self, refresh_token: &str) -> AppResult<User> {
        let cached = match self.cache.get_raw(&Self::refresh_key(refresh_token)).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(error = %e, "Refresh token cache lookup failed");
                None
            }
        };

        if cached.is_some() {
            let claims = self
                .tokens
                .decode(refresh_token, TokenKind::Refresh)
                .map_err(|_| AppError::Unauthorized)?;

            return self
                .uow
                .users()
                .find_by_email(&claims.sub)
                .await?
                .ok_or(AppError::Unauthorized);
        }

        let user = self
            .uow
            .users()
            .find_by_refresh_token(refresh_token)
            .await?
            .ok_or(AppError::Unauthorized)?;

        let claims = self
            .tokens
            .decode(refresh_token, TokenKind::Refresh)
            .map_err(|_| AppError::Unauthorized)?;
        if claims.sub != user.email {
            return Err(AppError::Unauthorized);
        }

        self.remember_refresh_token(refresh_token, &user.email).await;
        Ok(user)
    }
}

#[async_trait]
impl<U: UnitOfWork> AuthService for Authenticator<U> {
    async fn signup(&self, username: String, email: String, password: String) -> AppResult<User> {
        let email = normalize_email(&email);
        let username = username.trim().to_string();

        if self.uow.users().find_by_email(&email).await?.is_some() {
            return Err(AppError::conflict("User"));
        }
        if self.uow.users().find_by_username(&username).await?.is_some() {
            return Err(AppError::conflict("Username"));
        }

        let password_hash = Password::new(&password)?.into_string();
        let user = self
            .uow
            .users()
            .create(username, email, password_hash)
            .await?;
        tracing::info!(user_id = %user.id, "User signed up");

        if let Err(e) = self.send_verification(&user).await {
            tracing::error!(user_id = %user.id, error = %e, "Failed to queue verification email");
        }

        Ok(user)
    }

    async fn login(&self, email: String, password: String) -> AppResult<TokenResponse> {
        let email = normalize_email(&email);
        let user = self.uow.users().find_by_email(&email).await?;

        // Verify against a dummy hash for unknown accounts so both paths cost the same.
        let hash = user.as_ref().map_or(DUMMY_HASH, |u| u.password_hash.as_str());
        let password_valid = Password::from_hash(hash).verify(&password);

        let user = match user {
            Some(user) if password_valid => user,
            _ => return Err(AppError::InvalidCredentials),
        };
        if !user.confirmed {
            return Err(AppError::EmailNotConfirmed);
        }

        let access = self.tokens.issue(&user.email, TokenKind::Access)?;
        let refresh = self.tokens.issue(&user.email, TokenKind::Refresh)?;

        self.uow
            .users()
            .set_refresh_token(user.id, Some(refresh.clone()))
            .await?;
        self.remember_refresh_token(&refresh, &user.email).await;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(self.token_response(access, refresh))
    }

    async fn refresh(&self, refresh_token: &str) -> AppResult<TokenResponse> {
        let user = self.refresh_owner(refresh_token).await?;
        let access = self.tokens.issue(&user.email, TokenKind::Access)?;

        Ok(self.token_response(access, refresh_token.to_string()))
    }

    async fn logout(&self, user_id: Uuid) -> AppResult<()> {
        let user = self
            .uow
            .users()
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if let Some(token) = &user.refresh_token {
            self.forget_refresh_token(token).await;
        }
        self.uow.users().set_refresh_token(user.id, None).await?;

        tracing::info!(user_id = %user.id, "User logged out");
        Ok(())
    }

    async fn authenticate(&self, access_token: &str) -> AppResult<User> {
        let claims = self
            .tokens
            .decode(access_token, TokenKind::Access)
            .map_err(|_| AppError::Unauthorized)?;

        self.uow
            .users()
            .find_by_email(&claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    async fn confirm_email(&self, token: &str) -> AppResult<EmailConfirmation> {
        let claims = self
            .tokens
            .decode(token, TokenKind::EmailConfirmation)
            .map_err(|_| AppError::invalid_token("Invalid token"))?;

        let user = self
            .uow
            .users()
            .find_by_email(&claims.sub)
            .await?
            .ok_or_else(|| AppError::bad_request("Verification error"))?;

        if user.confirmed {
            return Ok(EmailConfirmation::AlreadyConfirmed);
        }

        self.uow.users().confirm_email(user.id).await?;
        tracing::info!(user_id = %user.id, "Email confirmed");
        Ok(EmailConfirmation::Confirmed)
    }

    async fn request_email(&self, email: &str) -> AppResult<()> {
        let email = normalize_email(email);

        match self.uow.users().find_by_email(&email).await? {
            Some(user) if !user.confirmed => {
                if let Err(e) = self.send_verification(&user).await {
                    tracing::error!(user_id = %user.id, error = %e, "Failed to queue verification email");
                }
            }
            Some(_) => tracing::debug!("Verification requested for confirmed account"),
            None => tracing::debug!("Verification requested for unknown account"),
        }

        Ok(())
    }

    async fn forgot_password(&self, email: &str) -> AppResult<()> {
        let email = normalize_email(email);
        let Some(user) = self.uow.users().find_by_email(&email).await? else {
            tracing::debug!("Password reset requested for unknown account");
            return Ok(());
        };

        let token = self.tokens.issue(&user.email, TokenKind::PasswordReset)?;
        let ttl = self.tokens.lifetime(TokenKind::PasswordReset).max(1);
        self.cache
            .set_raw(&Self::reset_key(&token), user.email.clone(), ttl as u64)
            .await?;

        let link = format!(
            "{}/reset-password?token={}",
            self.config.frontend_base_url.trim_end_matches('/'),
            token
        );
        let job = EmailJob::password_reset(&user.email, &user.username, &link, ttl / 60);
        if let Err(e) = self.mailer.send(job).await {
            tracing::error!(user_id = %user.id, error = %e, "Failed to queue password reset email");
        }

        tracing::info!(user_id = %user.id, "Password reset requested");
        Ok(())
    }

    async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<()> {
        let key = Self::reset_key(token);

        let email = self
            .cache
            .get_raw(&key)
            .await?
            .ok_or_else(|| AppError::invalid_token(INVALID_RESET_TOKEN))?;

        let claims = self
            .tokens
            .decode(token, TokenKind::PasswordReset)
            .map_err(|_| AppError::invalid_token(INVALID_RESET_TOKEN))?;
        if claims.sub != email {
            return Err(AppError::invalid_token(INVALID_RESET_TOKEN));
        }

        let Some(user) = self.uow.users().find_by_email(&email).await? else {
            self.cache.delete(&key).await?;
            return Err(AppError::not_found("User"));
        };

        let password_hash = Password::new(new_password)?.into_string();
        let user_id = user.id;
        with_transaction!(self.uow, |ctx| {
            ctx.users().reset_password(user_id, password_hash).await
        })?;

        if let Some(refresh) = &user.refresh_token {
            self.forget_refresh_token(refresh).await;
        }
        self.cache.delete(&key).await?;

        tracing::info!(user_id = %user.id, "Password reset");
        Ok(())
    }
}
