//! JWT issuing and verification.
//!
//! Every token carries a `token_type` claim so a token minted for one
//! purpose (say, a password reset) is rejected everywhere else.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::{Config, EMAIL_CONFIRMATION_EXPIRATION_SECONDS};
use crate::errors::{AppError, AppResult};

/// Purpose a token was minted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
    PasswordReset,
    EmailConfirmation,
}

/// JWT claims payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Email of the user the token was issued to
    pub sub: String,
    pub token_type: TokenKind,
    pub exp: i64,
    pub iat: i64,
}

/// HS256 token issuer bound to the server secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: i64,
    refresh_ttl: i64,
    reset_ttl: i64,
}

impl TokenIssuer {
    pub fn new(config: &Config) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.jwt_secret_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret_bytes()),
            access_ttl: config.jwt_expiration_seconds,
            refresh_ttl: config.jwt_refresh_expiration_seconds,
            reset_ttl: config.reset_token_expiration_seconds,
        }
    }

    /// Lifetime in seconds of tokens of `kind`.
    pub fn lifetime(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
            TokenKind::PasswordReset => self.reset_ttl,
            TokenKind::EmailConfirmation => EMAIL_CONFIRMATION_EXPIRATION_SECONDS,
        }
    }

    /// Sign a token of `kind` for `subject`.
    pub fn issue(&self, subject: &str, kind: TokenKind) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            token_type: kind,
            exp: (now + Duration::seconds(self.lifetime(kind))).timestamp(),
            iat: now.timestamp(),
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Verify signature and expiry, then require the token to be of `expected` kind.
    ///
    /// # Errors
    /// `AppError::Jwt` for malformed, forged or expired tokens;
    /// `AppError::InvalidToken` for a token of another kind.
    pub fn decode(&self, token: &str, expected: TokenKind) -> AppResult<Claims> {
        let claims = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))?
            .claims;

        if claims.token_type != expected {
            tracing::debug!(?expected, actual = ?claims.token_type, "Token type mismatch");
            return Err(AppError::invalid_token("Invalid token type"));
        }

        Ok(claims)
    }
}
