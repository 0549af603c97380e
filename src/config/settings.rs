//! Application settings loaded from environment variables.

use std::env;
use std::str::FromStr;

use super::constants::{
    DEFAULT_APP_BASE_URL, DEFAULT_DATABASE_URL,
    DEFAULT_FRONTEND_BASE_URL, DEFAULT_JWT_EXPIRATION_SECONDS,
    DEFAULT_JWT_REFRESH_EXPIRATION_SECONDS, DEFAULT_REDIS_URL,
    DEFAULT_RESET_TOKEN_EXPIRATION_SECONDS, DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT,
    MIN_JWT_SECRET_LENGTH,
};

/// Application configuration
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    jwt_secret: String,
    pub jwt_expiration_seconds: i64,
    pub jwt_refresh_expiration_seconds: i64,
    pub reset_token_expiration_seconds: i64,
    pub server_host: String,
    pub server_port: u16,
    /// Public URL of this API (verification links point here)
    pub app_base_url: String,
    /// Frontend URL (password reset links point here)
    pub frontend_base_url: String,
    /// Cloudinary account for avatar hosting
    pub cloudinary_cloud_name: Option<String>,
    pub cloudinary_api_key: Option<String>,
    cloudinary_api_secret: Option<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("redis_url", &"[REDACTED]")
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_expiration_seconds", &self.jwt_expiration_seconds)
            .field(
                "jwt_refresh_expiration_seconds",
                &self.jwt_refresh_expiration_seconds,
            )
            .field(
                "reset_token_expiration_seconds",
                &self.reset_token_expiration_seconds,
            )
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("app_base_url", &self.app_base_url)
            .field("frontend_base_url", &self.frontend_base_url)
            .field("cloudinary_cloud_name", &self.cloudinary_cloud_name)
            .field("cloudinary_api_key", &self.cloudinary_api_key)
            .field(
                "cloudinary_api_secret",
                &self.cloudinary_api_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Panics
    /// Panics if JWT_SECRET is not set in release builds or is too short.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            if cfg!(debug_assertions) {
                tracing::warn!("JWT_SECRET not set, using insecure default for development");
                "dev-secret-key-minimum-32-chars!!".to_string()
            } else {
                panic!("JWT_SECRET environment variable must be set in production");
            }
        });

        if jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            panic!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LENGTH
            );
        }

        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string()),
            jwt_secret,
            jwt_expiration_seconds: parse_var(
                "JWT_EXPIRATION_SECONDS",
                DEFAULT_JWT_EXPIRATION_SECONDS,
            ),
            jwt_refresh_expiration_seconds: parse_var(
                "JWT_REFRESH_EXPIRATION_SECONDS",
                DEFAULT_JWT_REFRESH_EXPIRATION_SECONDS,
            ),
            reset_token_expiration_seconds: parse_var(
                "RESET_TOKEN_EXPIRATION_SECONDS",
                DEFAULT_RESET_TOKEN_EXPIRATION_SECONDS,
            ),
            server_host: env::var("SERVER_HOST")
                .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
            server_port: parse_var("SERVER_PORT", DEFAULT_SERVER_PORT),
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_APP_BASE_URL.to_string()),
            frontend_base_url: env::var("FRONTEND_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_FRONTEND_BASE_URL.to_string()),
            cloudinary_cloud_name: optional_var("CLOUDINARY_CLOUD_NAME"),
            cloudinary_api_key: optional_var("CLOUDINARY_API_KEY"),
            cloudinary_api_secret: optional_var("CLOUDINARY_API_SECRET"),
        }
    }

    /// Build a configuration for tests with the given signing secret.
    pub fn for_tests(jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            jwt_secret: jwt_secret.into(),
            jwt_expiration_seconds: DEFAULT_JWT_EXPIRATION_SECONDS,
            jwt_refresh_expiration_seconds: DEFAULT_JWT_REFRESH_EXPIRATION_SECONDS,
            reset_token_expiration_seconds: DEFAULT_RESET_TOKEN_EXPIRATION_SECONDS,
            server_host: DEFAULT_SERVER_HOST.to_string(),
            server_port: DEFAULT_SERVER_PORT,
            app_base_url: DEFAULT_APP_BASE_URL.to_string(),
            frontend_base_url: DEFAULT_FRONTEND_BASE_URL.to_string(),
            cloudinary_cloud_name: None,
            cloudinary_api_key: None,
            cloudinary_api_secret: None,
        }
    }

    /// Cloudinary API secret, used to sign upload requests.
    pub fn cloudinary_api_secret(&self) -> Option<&str> {
        self.cloudinary_api_secret.as_deref()
    }

    /// Set the Cloudinary account.
    pub fn with_cloudinary(
        mut self,
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        self.cloudinary_cloud_name = Some(cloud_name.into());
        self.cloudinary_api_key = Some(api_key.into());
        self.cloudinary_api_secret = Some(api_secret.into());
        self
    }

    /// Get JWT secret bytes for token signing/verification.
    pub fn jwt_secret_bytes(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Get the full server address.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
