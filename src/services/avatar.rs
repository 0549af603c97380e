//! Avatar image hosting.
//!
//! `AvatarStore` is the seam the user service uploads through;
//! `CloudinaryStore` talks to the Cloudinary upload API with signed requests.

use async_trait::async_trait;
use reqwest::{multipart, Client};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

const CLOUDINARY_API: &str = "https://api.cloudinary.com/v1_1";

/// An image received from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarUpload {
    pub content_type: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl AvatarUpload {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// Where an uploaded avatar ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAvatar {
    pub url: String,
    pub public_id: String,
}

/// Image host used for user avatars.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait AvatarStore: Send + Sync {
    /// Upload `image` as the avatar of `user_id`, replacing any earlier one
    async fn upload(&self, user_id: Uuid, image: AvatarUpload) -> AppResult<StoredAvatar>;

    /// Remove an image by its host id
    async fn delete(&self, public_id: &str) -> AppResult<()>;
}

#[derive(Debug, Clone)]
struct Account {
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

/// Cloudinary-backed avatar store.
pub struct CloudinaryStore {
    http: Client,
    account: Option<Account>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

impl CloudinaryStore {
    /// Build from config; without a full account every call fails upstream.
    pub fn from_config(config: &Config) -> Self {
        let account = match (
            &config.cloudinary_cloud_name,
            &config.cloudinary_api_key,
            config.cloudinary_api_secret(),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(Account {
                cloud_name: cloud_name.clone(),
                api_key: api_key.clone(),
                api_secret: api_secret.to_string(),
            }),
            _ => {
                tracing::warn!("Cloudinary not configured - avatar uploads are disabled");
                None
            }
        };

        Self {
            http: Client::new(),
            account,
        }
    }

    fn account(&self) -> AppResult<&Account> {
        self.account
            .as_ref()
            .ok_or_else(|| AppError::upstream("Image hosting is not configured"))
    }

    /// Signed form for `params`; `api_key` and the signature are added last.
    fn signed_form(account: &Account, params: Vec<(&'static str, String)>) -> multipart::Form {
        let signature = sign(&params, &account.api_secret);
        params
            .into_iter()
            .fold(multipart::Form::new(), |form, (key, value)| form.text(key, value))
            .text("api_key", account.api_key.clone())
            .text("signature", signature)
    }
}

/// Cloudinary request signature: the parameters sorted by name, joined as
/// `key=value` with `&`, followed by the API secret, hashed with SHA-1.
pub(crate) fn sign(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let joined = sorted
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn upstream_error(action: &str, e: reqwest::Error) -> AppError {
    tracing::error!(error = %e, action, "Cloudinary request failed");
    AppError::upstream("Image hosting request failed")
}

#[async_trait]
impl AvatarStore for CloudinaryStore {
    async fn upload(&self, user_id: Uuid, image: AvatarUpload) -> AppResult<StoredAvatar> {
        let account = self.account()?;
        let params = vec![
            ("folder", format!("users/{}", user_id)),
            ("invalidate", "true".to_string()),
            ("overwrite", "true".to_string()),
            ("public_id", "avatar".to_string()),
            ("timestamp", chrono::Utc::now().timestamp().to_string()),
        ];

        let file = multipart::Part::bytes(image.bytes)
            .file_name(image.file_name)
            .mime_str(&image.content_type)
            .map_err(|e| upstream_error("upload", e))?;
        let form = Self::signed_form(account, params).part("file", file);

        let uploaded: UploadResponse = self
            .http
            .post(format!("{}/{}/image/upload", CLOUDINARY_API, account.cloud_name))
            .multipart(form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| upstream_error("upload", e))?
            .json()
            .await
            .map_err(|e| upstream_error("upload", e))?;

        tracing::debug!(user_id = %user_id, public_id = %uploaded.public_id, "Avatar uploaded");
        Ok(StoredAvatar {
            url: uploaded.secure_url,
            public_id: uploaded.public_id,
        })
    }

    async fn delete(&self, public_id: &str) -> AppResult<()> {
        let account = self.account()?;
        let params = vec![
            ("invalidate", "true".to_string()),
            ("public_id", public_id.to_string()),
            ("timestamp", chrono::Utc::now().timestamp().to_string()),
        ];

        let destroyed: DestroyResponse = self
            .http
            .post(format!("{}/{}/image/destroy", CLOUDINARY_API, account.cloud_name))
            .multipart(Self::signed_form(account, params))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| upstream_error("destroy", e))?
            .json()
            .await
            .map_err(|e| upstream_error("destroy", e))?;

        if destroyed.result != "ok" && destroyed.result != "not found" {
            return Err(AppError::upstream(format!(
                "Image host refused to delete {}: {}",
                public_id, destroyed.result
            )));
        }
        Ok(())
    }
}
