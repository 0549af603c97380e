//! OpenAPI documentation configuration.
//!
//! Provides Swagger UI for API exploration and testing.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::handlers::{contact_handler, health_handler, user_handler};
use crate::domain::{ContactChanges, ContactResponse, NewContact, UserResponse, UserRole};
use crate::services::TokenResponse;
use crate::types::MessageResponse;

/// OpenAPI documentation for the Contacts API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Contacts API",
        version = "0.1.0",
        description = "Personal address book: contacts, search, upcoming birthdays and user accounts",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development server")
    ),
    paths(
        // Contact endpoints
        contact_handler::list_contacts,
        contact_handler::get_contact,
        contact_handler::create_contact,
        contact_handler::update_contact,
        contact_handler::delete_contact,
        contact_handler::search_contacts,
        contact_handler::upcoming_birthdays,
        // User endpoints
        user_handler::signup,
        user_handler::login,
        user_handler::refresh_token,
        user_handler::logout,
        user_handler::get_current_user,
        user_handler::update_avatar,
        user_handler::confirmed_email,
        user_handler::request_email,
        user_handler::change_role,
        user_handler::forgot_password,
        user_handler::reset_password,
        // Health
        health_handler::healthchecker,
    ),
    components(
        schemas(
            // Domain types
            ContactResponse,
            NewContact,
            ContactChanges,
            UserRole,
            UserResponse,
            // Auth types
            TokenResponse,
            MessageResponse,
            // Request bodies
            user_handler::SignupRequest,
            user_handler::LoginRequest,
            user_handler::RefreshRequest,
            user_handler::EmailRequest,
            user_handler::ResetPasswordRequest,
            user_handler::RoleUpdateRequest,
            user_handler::AvatarForm,
            // Health
            health_handler::HealthResponse,
            health_handler::ServiceHealth,
            health_handler::ServiceStatus,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Contacts", description = "The current user's address book"),
        (name = "Users", description = "Accounts, sessions and email verification"),
        (name = "Health", description = "Service liveness")
    )
)]
pub struct ApiDoc;

/// Security scheme modifier for JWT Bearer authentication
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Access token obtained from /api/users/login"))
                        .build(),
                ),
            );
        }
    }
}
