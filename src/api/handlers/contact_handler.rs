//! Contact handlers.
//!
//! Every route runs behind the auth middleware and only ever sees the
//! current user's contacts.

use axum::{
    extract::{Extension, Path, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

use crate::api::extractors::{ValidatedJson, ValidatedQuery};
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::config::{DEFAULT_BIRTHDAY_DAYS, DEFAULT_LIMIT};
use crate::domain::{Contact, ContactChanges, ContactQuery, ContactResponse, NewContact};
use crate::errors::{AppError, AppResult};
use crate::types::{Created, NoContent, PageWindow};

/// Search filter and page window
#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Case-insensitive substring of the first name
    pub first_name: Option<String>,
    /// Case-insensitive substring of the last name
    pub last_name: Option<String>,
    /// Case-insensitive substring of the email
    pub email: Option<String>,
    /// Number of records to skip
    #[serde(default)]
    #[param(minimum = 0, default = 0)]
    pub skip: u64,
    /// Maximum number of records to return
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 500, message = "limit must be between 1 and 500"))]
    #[param(minimum = 1, maximum = 500, default = 100)]
    pub limit: u64,
}

impl SearchParams {
    fn query(&self) -> ContactQuery {
        ContactQuery::new(
            self.first_name.as_deref(),
            self.last_name.as_deref(),
            self.email.as_deref(),
        )
    }

    fn page(&self) -> PageWindow {
        PageWindow::new(self.skip, self.limit)
    }
}

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

/// Look-ahead for the upcoming birthdays query
#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BirthdayParams {
    /// Number of days ahead, today included
    #[serde(default = "default_days")]
    #[validate(range(min = 1, max = 365, message = "days must be between 1 and 365"))]
    #[param(minimum = 1, maximum = 365, default = 7)]
    pub days: u32,
}

fn default_days() -> u32 {
    DEFAULT_BIRTHDAY_DAYS
}

/// Create contact routes
pub fn contact_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_contacts).post(create_contact))
        .route("/search", get(search_contacts))
        .route("/upcoming_birthdays", get(upcoming_birthdays))
        .route(
            "/:contact_id",
            get(get_contact).put(update_contact).delete(delete_contact),
        )
}

/// Deletes insist on a positive id; lookups of id 0 simply find nothing.
fn contact_id(id: i32) -> AppResult<i32> {
    if id < 1 {
        return Err(AppError::validation(
            "contact_id must be greater than or equal to 1",
        ));
    }
    Ok(id)
}

fn responses(contacts: Vec<Contact>) -> Json<Vec<ContactResponse>> {
    Json(contacts.into_iter().map(ContactResponse::from).collect())
}

/// List the current user's contacts
#[utoipa::path(
    get,
    path = "/api/contacts",
    tag = "Contacts",
    security(("bearer_auth" = [])),
    params(PageWindow),
    responses(
        (status = 200, description = "One page of contacts", body = Vec<ContactResponse>),
        (status = 400, description = "Invalid page window"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_contacts(
    Extension(current_user): Extension<CurrentUser>,
    State(state): State<AppState>,
    ValidatedQuery(page): ValidatedQuery<PageWindow>,
) -> AppResult<Json<Vec<ContactResponse>>> {
    let contacts = state.contact_service.list(current_user.id, page).await?;
    Ok(responses(contacts))
}

/// Get a contact by id
#[utoipa::path(
    get,
    path = "/api/contacts/{contact_id}",
    tag = "Contacts",
    security(("bearer_auth" = [])),
    params(("contact_id" = i32, Path, description = "Contact ID")),
    responses(
        (status = 200, description = "The contact", body = ContactResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Contact not found")
    )
)]
pub async fn get_contact(
    Extension(current_user): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<ContactResponse>> {
    let contact = state.contact_service.get(current_user.id, id).await?;
    Ok(Json(ContactResponse::from(contact)))
}

/// Create a contact
#[utoipa::path(
    post,
    path = "/api/contacts",
    tag = "Contacts",
    security(("bearer_auth" = [])),
    request_body = NewContact,
    responses(
        (status = 201, description = "Contact created", body = ContactResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "A contact with this email already exists")
    )
)]
pub async fn create_contact(
    Extension(current_user): Extension<CurrentUser>,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<NewContact>,
) -> AppResult<Created<ContactResponse>> {
    let contact = state
        .contact_service
        .create(current_user.id, payload)
        .await?;
    Ok(Created(ContactResponse::from(contact)))
}

/// Update a contact; absent fields keep their value
#[utoipa::path(
    put,
    path = "/api/contacts/{contact_id}",
    tag = "Contacts",
    security(("bearer_auth" = [])),
    params(("contact_id" = i32, Path, description = "Contact ID")),
    request_body = ContactChanges,
    responses(
        (status = 200, description = "Contact updated", body = ContactResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Contact not found"),
        (status = 409, description = "A contact with this email already exists")
    )
)]
pub async fn update_contact(
    Extension(current_user): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ValidatedJson(changes): ValidatedJson<ContactChanges>,
) -> AppResult<Json<ContactResponse>> {
    let contact = state
        .contact_service
        .update(current_user.id, id, changes)
        .await?;
    Ok(Json(ContactResponse::from(contact)))
}

/// Delete a contact
#[utoipa::path(
    delete,
    path = "/api/contacts/{contact_id}",
    tag = "Contacts",
    security(("bearer_auth" = [])),
    params(("contact_id" = i32, Path, description = "Contact ID")),
    responses(
        (status = 204, description = "Contact deleted"),
        (status = 400, description = "contact_id below 1"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Contact not found")
    )
)]
pub async fn delete_contact(
    Extension(current_user): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<NoContent> {
    state
        .contact_service
        .delete(current_user.id, contact_id(id)?)
        .await?;
    Ok(NoContent)
}

/// Search contacts by name or email
#[utoipa::path(
    get,
    path = "/api/contacts/search",
    tag = "Contacts",
    security(("bearer_auth" = [])),
    params(SearchParams),
    responses(
        (status = 200, description = "Matching contacts", body = Vec<ContactResponse>),
        (status = 400, description = "No search term or invalid page window"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn search_contacts(
    Extension(current_user): Extension<CurrentUser>,
    State(state): State<AppState>,
    ValidatedQuery(params): ValidatedQuery<SearchParams>,
) -> AppResult<Json<Vec<ContactResponse>>> {
    let contacts = state
        .contact_service
        .search(current_user.id, params.query(), params.page())
        .await?;
    Ok(responses(contacts))
}

/// Contacts whose birthday falls within the next `days` days
#[utoipa::path(
    get,
    path = "/api/contacts/upcoming_birthdays",
    tag = "Contacts",
    security(("bearer_auth" = [])),
    params(BirthdayParams),
    responses(
        (status = 200, description = "Contacts ordered by next birthday", body = Vec<ContactResponse>),
        (status = 400, description = "days out of range"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn upcoming_birthdays(
    Extension(current_user): Extension<CurrentUser>,
    State(state): State<AppState>,
    ValidatedQuery(params): ValidatedQuery<BirthdayParams>,
) -> AppResult<Json<Vec<ContactResponse>>> {
    let contacts = state
        .contact_service
        .upcoming_birthdays(current_user.id, params.days)
        .await?;
    Ok(responses(contacts))
}
