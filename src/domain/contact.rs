//! Contact domain entity, write payloads and the search filter.

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Digits, spaces, dashes, parentheses and an optional leading plus.
static PHONE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9 ()\-]{3,50}$").expect("phone regex is valid"));

/// Contact domain entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: i32,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub birthday: Option<NaiveDate>,
    pub extra_info: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Contact creation payload
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewContact {
    #[validate(length(min = 1, max = 50, message = "first_name must be 1-50 characters"))]
    #[schema(example = "Taras")]
    pub first_name: String,
    #[validate(length(min = 1, max = 50, message = "last_name must be 1-50 characters"))]
    #[schema(example = "Shevchenko")]
    pub last_name: String,
    #[validate(
        email(message = "Invalid email format"),
        length(max = 255, message = "email must be at most 255 characters")
    )]
    #[schema(example = "taras@example.com")]
    pub email: String,
    #[validate(regex(path = *PHONE_REGEX, message = "Invalid phone number"))]
    #[schema(example = "+380 44 123 4567")]
    pub phone: String,
    #[validate(custom(function = "validate_birthday"))]
    #[schema(example = "1814-03-09")]
    pub birthday: Option<NaiveDate>,
    pub extra_info: Option<String>,
}

/// Partial contact update; absent fields are left unchanged.
///
/// `birthday` and `extra_info` distinguish an absent key (`None`) from an
/// explicit `null` (`Some(None)`), which clears the stored value.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_changes"))]
pub struct ContactChanges {
    #[validate(length(min = 1, max = 50, message = "first_name must be 1-50 characters"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 50, message = "last_name must be 1-50 characters"))]
    pub last_name: Option<String>,
    #[validate(
        email(message = "Invalid email format"),
        length(max = 255, message = "email must be at most 255 characters")
    )]
    pub email: Option<String>,
    #[validate(regex(path = *PHONE_REGEX, message = "Invalid phone number"))]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>, format = Date, nullable)]
    pub birthday: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>, nullable)]
    pub extra_info: Option<Option<String>>,
}

/// Wrap any value that is present in the body, `null` included.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn validate_changes(changes: &ContactChanges) -> Result<(), ValidationError> {
    match changes.birthday {
        Some(Some(birthday)) => validate_birthday(&birthday),
        _ => Ok(()),
    }
}

fn validate_birthday(birthday: &NaiveDate) -> Result<(), ValidationError> {
    if *birthday > Utc::now().date_naive() {
        let mut err = ValidationError::new("birthday_in_future");
        err.message = Some("birthday cannot be in the future".into());
        return Err(err);
    }
    Ok(())
}

/// Normalized search filter: trimmed, non-empty terms only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContactQuery {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

impl ContactQuery {
    pub fn new(
        first_name: Option<&str>,
        last_name: Option<&str>,
        email: Option<&str>,
    ) -> Self {
        Self {
            first_name: clean_term(first_name),
            last_name: clean_term(last_name),
            email: clean_term(email),
        }
    }

    /// True when no usable term was supplied.
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.email.is_none()
    }

    /// Lower-cased form used for cache keys, so equivalent searches share an entry.
    pub fn normalized(&self) -> Self {
        let lower = |s: &Option<String>| s.as_ref().map(|v| v.to_lowercase());
        Self {
            first_name: lower(&self.first_name),
            last_name: lower(&self.last_name),
            email: lower(&self.email),
        }
    }
}

fn clean_term(term: Option<&str>) -> Option<String> {
    term.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Contact response DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContactResponse {
    #[schema(example = 1)]
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub birthday: Option<NaiveDate>,
    pub extra_info: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Contact> for ContactResponse {
    fn from(contact: Contact) -> Self {
        Self {
            id: contact.id,
            first_name: contact.first_name,
            last_name: contact.last_name,
            email: contact.email,
            phone: contact.phone,
            birthday: contact.birthday,
            extra_info: contact.extra_info,
            created_at: contact.created_at,
            updated_at: contact.updated_at,
        }
    }
}
