//! User handlers: account lifecycle, sessions, avatars and role administration.

use axum::{
    extract::{Extension, Multipart, Path, State},
    middleware,
    response::Json,
    routing::{get, patch, post, put},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::{auth_middleware, require_admin, CurrentUser};
use crate::api::AppState;
use crate::domain::{UserResponse, UserRole};
use crate::errors::{AppError, AppResult};
use crate::services::{AvatarUpload, EmailConfirmation, TokenResponse};
use crate::types::{Accepted, Created, MessageResponse, NoContent};

const CHECK_YOUR_EMAIL: &str = "Check your email for confirmation.";
const RESET_LINK_SENT: &str = "A password reset link has been sent to your email.";

/// Sign-up request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 150, message = "Username must be 1-150 characters"))]
    #[schema(example = "jdoe")]
    pub username: String,
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,
    /// Minimum 8 characters
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "SecurePass123!", min_length = 8)]
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,
    #[schema(example = "SecurePass123!")]
    pub password: String,
}

/// Refresh token request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "refresh_token is required"))]
    pub refresh_token: String,
}

/// Request body naming an account by email
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EmailRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,
}

/// Password reset request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "token is required"))]
    pub token: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(min_length = 8)]
    pub new_password: String,
}

/// Role change request (admin only)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RoleUpdateRequest {
    pub role: UserRole,
}

/// Avatar upload form
#[derive(Debug, ToSchema)]
pub struct AvatarForm {
    /// Image file (`image/*`)
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// Create user routes.
///
/// Public account routes come first; the rest are wrapped in the auth
/// middleware here so the router only needs one `/users` nest.
pub fn user_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/me", get(get_current_user))
        .route("/logout", post(logout))
        .route("/avatar", put(update_avatar))
        .route("/:user_id/role", patch(change_role))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
        .route("/confirmed_email/:token", get(confirmed_email))
        .route("/request_email", post(request_email))
        .route("/password/forgot", post(forgot_password))
        .route("/password/reset", post(reset_password))
        .merge(protected)
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/api/users/signup",
    tag = "Users",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User registered, verification email queued", body = UserResponse),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Email or username already taken")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<SignupRequest>,
) -> AppResult<Created<UserResponse>> {
    let user = state
        .auth_service
        .signup(payload.username, payload.email, payload.password)
        .await?;

    Ok(Created(UserResponse::from(user)))
}

/// Exchange credentials for an access and refresh token
#[utoipa::path(
    post,
    path = "/api/users/login",
    tag = "Users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Invalid credentials or email not confirmed")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let tokens = state
        .auth_service
        .login(payload.email, payload.password)
        .await?;

    Ok(Json(tokens))
}

/// Mint a new access token
#[utoipa::path(
    post,
    path = "/api/users/refresh-token",
    tag = "Users",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = TokenResponse),
        (status = 401, description = "Invalid refresh token")
    )
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RefreshRequest>,
) -> AppResult<Json<TokenResponse>> {
    let tokens = state.auth_service.refresh(&payload.refresh_token).await?;
    Ok(Json(tokens))
}

/// Revoke the current refresh token
#[utoipa::path(
    post,
    path = "/api/users/logout",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Logged out"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn logout(
    Extension(current_user): Extension<CurrentUser>,
    State(state): State<AppState>,
) -> AppResult<NoContent> {
    state.auth_service.logout(current_user.id).await?;
    Ok(NoContent)
}

/// Get current authenticated user
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user profile", body = UserResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_current_user(
    Extension(current_user): Extension<CurrentUser>,
) -> Json<UserResponse> {
    Json(UserResponse::from(current_user.0))
}

/// Replace the current user's avatar
#[utoipa::path(
    put,
    path = "/api/users/avatar",
    tag = "Users",
    security(("bearer_auth" = [])),
    request_body(content = AvatarForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "User with the new avatar", body = UserResponse),
        (status = 400, description = "Missing file or not an image"),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "Image hosting failed")
    )
)]
pub async fn update_avatar(
    Extension(current_user): Extension<CurrentUser>,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<UserResponse>> {
    let image = read_avatar(multipart).await?;
    if !image.is_image() {
        return Err(AppError::bad_request("Only image uploads are allowed"));
    }

    let user = state
        .user_service
        .update_avatar(current_user.id, image)
        .await?;

    Ok(Json(UserResponse::from(user)))
}

/// Pull the `file` part out of an avatar form.
async fn read_avatar(mut multipart: Multipart) -> AppResult<AvatarUpload> {
    let malformed = |e: axum::extract::multipart::MultipartError| {
        AppError::bad_request(format!("Malformed upload: {}", e.body_text()))
    };

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or("avatar").to_string();
        let bytes = field.bytes().await.map_err(malformed)?;

        return Ok(AvatarUpload {
            content_type,
            file_name,
            bytes: bytes.to_vec(),
        });
    }

    Err(AppError::bad_request("file is required"))
}

/// Follow an email verification link
#[utoipa::path(
    get,
    path = "/api/users/confirmed_email/{token}",
    tag = "Users",
    params(("token" = String, Path, description = "Verification token from the email")),
    responses(
        (status = 200, description = "Email confirmed", body = MessageResponse),
        (status = 400, description = "Invalid token or verification error")
    )
)]
pub async fn confirmed_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let message = match state.auth_service.confirm_email(&token).await? {
        EmailConfirmation::Confirmed => "Email confirmed",
        EmailConfirmation::AlreadyConfirmed => "Your email is already confirmed",
    };

    Ok(Json(MessageResponse::new(message)))
}

/// Resend the verification email
#[utoipa::path(
    post,
    path = "/api/users/request_email",
    tag = "Users",
    request_body = EmailRequest,
    responses(
        (status = 202, description = "Accepted; sent only to unconfirmed accounts", body = MessageResponse),
        (status = 400, description = "Validation error")
    )
)]
pub async fn request_email(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<EmailRequest>,
) -> AppResult<Accepted> {
    state.auth_service.request_email(&payload.email).await?;
    Ok(Accepted(MessageResponse::new(CHECK_YOUR_EMAIL)))
}

/// Change a user's role (admin only)
#[utoipa::path(
    patch,
    path = "/api/users/{user_id}/role",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(("user_id" = Uuid, Path, description = "User ID")),
    request_body = RoleUpdateRequest,
    responses(
        (status = 200, description = "User with the new role", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - Admin only"),
        (status = 404, description = "User not found")
    )
)]
pub async fn change_role(
    Extension(current_user): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<RoleUpdateRequest>,
) -> AppResult<Json<UserResponse>> {
    require_admin(&current_user)?;

    let user = state
        .user_service
        .change_role(&current_user, user_id, payload.role)
        .await?;

    Ok(Json(UserResponse::from(user)))
}

/// Ask for a password reset link
#[utoipa::path(
    post,
    path = "/api/users/password/forgot",
    tag = "Users",
    request_body = EmailRequest,
    responses(
        (status = 202, description = "Accepted whether or not the account exists", body = MessageResponse),
        (status = 400, description = "Validation error")
    )
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<EmailRequest>,
) -> AppResult<Accepted> {
    state.auth_service.forgot_password(&payload.email).await?;
    Ok(Accepted(MessageResponse::new(RESET_LINK_SENT)))
}

/// Set a new password with a reset token
#[utoipa::path(
    post,
    path = "/api/users/password/reset",
    tag = "Users",
    request_body = ResetPasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Invalid or expired reset token"),
        (status = 404, description = "User not found")
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ResetPasswordRequest>,
) -> AppResult<NoContent> {
    state
        .auth_service
        .reset_password(&payload.token, &payload.new_password)
        .await?;
    Ok(NoContent)
}
