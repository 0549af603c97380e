//! Shared fixtures for the integration suites.
//!
//! `TestUnitOfWork` wraps the mockall repositories; the `Fake*` services
//! are hand-written in-memory stand-ins used to drive the real router.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use contacts_api::api::{create_router, AppState};
use contacts_api::config::Config;
use contacts_api::domain::{
    Contact, ContactChanges, ContactQuery, NewContact, User, UserRole,
};
use contacts_api::errors::{AppError, AppResult};
use contacts_api::infra::{
    CacheStore, ContactRepository, HealthCheck, MemoryCache, MockContactRepository,
    MockUserRepository, TransactionContext, TxFuture, UnitOfWork, UserRepository,
};
use contacts_api::services::{
    AuthService, AvatarUpload, ContactService, EmailConfirmation, TokenResponse, UserService,
};
use contacts_api::types::PageWindow;

pub const TEST_SECRET: &str = "test-secret-key-for-testing-only-32chars";
pub const USER_TOKEN: &str = "user-token";
pub const ADMIN_TOKEN: &str = "admin-token";

pub fn test_config() -> Config {
    Config::for_tests(TEST_SECRET)
}

pub fn owner_id() -> Uuid {
    Uuid::parse_str("7c9e6679-7425-40de-944b-e07fc1f90ae7").unwrap()
}

pub fn admin_id() -> Uuid {
    Uuid::parse_str("16fd2706-8baf-433b-82eb-8c7fada847da").unwrap()
}

pub fn test_user(id: Uuid, email: &str, role: UserRole, confirmed: bool) -> User {
    let now = Utc::now();
    User {
        id,
        username: email.split('@').next().unwrap_or(email).to_string(),
        email: email.to_string(),
        password_hash: "hashed".to_string(),
        role,
        confirmed,
        refresh_token: None,
        avatar: None,
        public_id: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn test_contact(id: i32, owner: Uuid, first_name: &str, birthday: Option<NaiveDate>) -> Contact {
    let now = Utc::now();
    Contact {
        id,
        user_id: owner,
        first_name: first_name.to_string(),
        last_name: "Kovalenko".to_string(),
        email: format!("{}@example.com", first_name.to_lowercase()),
        phone: "+380 44 000 0000".to_string(),
        birthday,
        extra_info: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

// =============================================================================
// Unit of Work over repository mocks
// =============================================================================

/// Test UnitOfWork that wraps repository mocks.
pub struct TestUnitOfWork {
    users: Arc<dyn UserRepository>,
    contacts: Arc<dyn ContactRepository>,
}

impl TestUnitOfWork {
    pub fn new(users: MockUserRepository, contacts: MockContactRepository) -> Self {
        Self {
            users: Arc::new(users),
            contacts: Arc::new(contacts),
        }
    }

    pub fn with_users(users: MockUserRepository) -> Self {
        Self::new(users, MockContactRepository::new())
    }

    pub fn with_contacts(contacts: MockContactRepository) -> Self {
        Self::new(MockUserRepository::new(), contacts)
    }
}

#[async_trait]
impl UnitOfWork for TestUnitOfWork {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.users.clone()
    }

    fn contacts(&self) -> Arc<dyn ContactRepository> {
        self.contacts.clone()
    }

    async fn transaction<F, T>(&self, _f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send,
    {
        // TransactionContext needs a live database transaction
        Err(AppError::internal("Transactions not supported in test mock"))
    }
}

// =============================================================================
// Health checks
// =============================================================================

pub struct HealthyDatabase;

#[async_trait]
impl HealthCheck for HealthyDatabase {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

pub struct FailingDatabase;

#[async_trait]
impl HealthCheck for FailingDatabase {
    async fn ping(&self) -> AppResult<()> {
        Err(AppError::internal("connection refused"))
    }
}

// =============================================================================
// Fake services
// =============================================================================

/// Resolves two fixed bearer tokens: one user, one admin.
pub struct FakeAuthService;

impl FakeAuthService {
    fn user_for(token: &str) -> Option<User> {
        match token {
            USER_TOKEN => Some(test_user(owner_id(), "owner@example.com", UserRole::User, true)),
            ADMIN_TOKEN => Some(test_user(admin_id(), "admin@example.com", UserRole::Admin, true)),
            _ => None,
        }
    }
}

#[async_trait]
impl AuthService for FakeAuthService {
    async fn signup(&self, username: String, email: String, _password: String) -> AppResult<User> {
        if email == "owner@example.com" {
            return Err(AppError::conflict("User"));
        }
        let mut user = test_user(Uuid::new_v4(), &email, UserRole::User, false);
        user.username = username;
        Ok(user)
    }

    async fn login(&self, email: String, password: String) -> AppResult<TokenResponse> {
        if email == "owner@example.com" && password == "correct-horse" {
            return Ok(TokenResponse {
                access_token: USER_TOKEN.to_string(),
                refresh_token: "refresh".to_string(),
                token_type: "bearer".to_string(),
            });
        }
        Err(AppError::InvalidCredentials)
    }

    async fn refresh(&self, _refresh_token: &str) -> AppResult<TokenResponse> {
        Err(AppError::Unauthorized)
    }

    async fn logout(&self, _user_id: Uuid) -> AppResult<()> {
        Ok(())
    }

    async fn authenticate(&self, access_token: &str) -> AppResult<User> {
        Self::user_for(access_token).ok_or(AppError::Unauthorized)
    }

    async fn confirm_email(&self, token: &str) -> AppResult<EmailConfirmation> {
        match token {
            "fresh" => Ok(EmailConfirmation::Confirmed),
            "again" => Ok(EmailConfirmation::AlreadyConfirmed),
            _ => Err(AppError::invalid_token("Invalid token")),
        }
    }

    async fn request_email(&self, _email: &str) -> AppResult<()> {
        Ok(())
    }

    async fn forgot_password(&self, _email: &str) -> AppResult<()> {
        Ok(())
    }

    async fn reset_password(&self, token: &str, _new_password: &str) -> AppResult<()> {
        if token == "live" {
            Ok(())
        } else {
            Err(AppError::invalid_token("Invalid or expired reset token"))
        }
    }
}

/// Role changes against a fixed target; admin check lives in the handler and here.
/// An avatar whose bytes are `fail` makes the image host fail.
pub struct FakeUserService;

#[async_trait]
impl UserService for FakeUserService {
    async fn get_user(&self, id: Uuid) -> AppResult<User> {
        if id == owner_id() {
            Ok(test_user(id, "owner@example.com", UserRole::User, true))
        } else {
            Err(AppError::not_found("User"))
        }
    }

    async fn change_role(&self, actor: &User, target: Uuid, role: UserRole) -> AppResult<User> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden);
        }
        let mut user = self.get_user(target).await?;
        user.role = role;
        Ok(user)
    }

    async fn update_avatar(&self, user_id: Uuid, image: AvatarUpload) -> AppResult<User> {
        if image.bytes == b"fail" {
            return Err(AppError::upstream("Image hosting request failed"));
        }
        let mut user = self.get_user(user_id).await?;
        user.avatar = Some(format!("https://img.example.com/users/{}/avatar", user_id));
        user.public_id = Some(format!("users/{}/avatar", user_id));
        Ok(user)
    }
}

/// In-memory address book keyed by owner.
#[derive(Default)]
pub struct FakeContactService {
    contacts: Mutex<Vec<Contact>>,
}

impl FakeContactService {
    pub fn with(contacts: Vec<Contact>) -> Self {
        Self {
            contacts: Mutex::new(contacts),
        }
    }
}

#[async_trait]
impl ContactService for FakeContactService {
    async fn list(&self, owner: Uuid, page: PageWindow) -> AppResult<Vec<Contact>> {
        Ok(self
            .contacts
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.user_id == owner)
            .skip(page.skip as usize)
            .take(page.limit as usize)
            .cloned()
            .collect())
    }

    async fn get(&self, owner: Uuid, id: i32) -> AppResult<Contact> {
        self.contacts
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.user_id == owner && c.id == id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Contact"))
    }

    async fn create(&self, owner: Uuid, contact: NewContact) -> AppResult<Contact> {
        let mut contacts = self.contacts.lock().unwrap();
        let id = contacts.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        let mut created = test_contact(id, owner, &contact.first_name, contact.birthday);
        created.last_name = contact.last_name;
        created.email = contact.email;
        created.phone = contact.phone;
        created.extra_info = contact.extra_info;
        contacts.push(created.clone());
        Ok(created)
    }

    async fn update(&self, owner: Uuid, id: i32, changes: ContactChanges) -> AppResult<Contact> {
        let mut contacts = self.contacts.lock().unwrap();
        let contact = contacts
            .iter_mut()
            .find(|c| c.user_id == owner && c.id == id)
            .ok_or_else(|| AppError::not_found("Contact"))?;
        if let Some(first_name) = changes.first_name {
            contact.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            contact.last_name = last_name;
        }
        if let Some(email) = changes.email {
            contact.email = email;
        }
        if let Some(phone) = changes.phone {
            contact.phone = phone;
        }
        if let Some(birthday) = changes.birthday {
            contact.birthday = birthday;
        }
        if let Some(extra_info) = changes.extra_info {
            contact.extra_info = extra_info;
        }
        Ok(contact.clone())
    }

    async fn delete(&self, owner: Uuid, id: i32) -> AppResult<()> {
        let mut contacts = self.contacts.lock().unwrap();
        let before = contacts.len();
        contacts.retain(|c| !(c.user_id == owner && c.id == id));
        if contacts.len() == before {
            return Err(AppError::not_found("Contact"));
        }
        Ok(())
    }

    async fn search(
        &self,
        owner: Uuid,
        query: ContactQuery,
        page: PageWindow,
    ) -> AppResult<Vec<Contact>> {
        if query.is_empty() {
            return Err(AppError::bad_request(
                contacts_api::services::EMPTY_SEARCH_MESSAGE,
            ));
        }
        let term = query.normalized();
        let matches = |value: &str, term: &Option<String>| {
            term.as_ref()
                .map_or(true, |t| value.to_lowercase().contains(t.as_str()))
        };
        let contacts = self.list(owner, PageWindow::new(0, u64::MAX)).await?;
        Ok(contacts
            .into_iter()
            .filter(|c| {
                matches(&c.first_name, &term.first_name)
                    && matches(&c.last_name, &term.last_name)
                    && matches(&c.email, &term.email)
            })
            .skip(page.skip as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn upcoming_birthdays(&self, owner: Uuid, _days: u32) -> AppResult<Vec<Contact>> {
        let contacts = self.list(owner, PageWindow::new(0, u64::MAX)).await?;
        Ok(contacts.into_iter().filter(|c| c.birthday.is_some()).collect())
    }
}

// =============================================================================
// Router builders
// =============================================================================

pub struct TestApp {
    pub router: Router,
    pub cache: Arc<MemoryCache>,
}

pub fn app_with(contacts: FakeContactService, database: Arc<dyn HealthCheck>) -> TestApp {
    let cache = Arc::new(MemoryCache::new());
    let state = AppState::new(
        Arc::new(FakeAuthService),
        Arc::new(FakeUserService),
        Arc::new(contacts),
        cache.clone() as Arc<dyn CacheStore>,
        database,
    );

    TestApp {
        router: create_router(state),
        cache,
    }
}

/// Router over an arbitrary cache, e.g. a `MockCacheStore`.
pub fn router_with_cache(cache: Arc<dyn CacheStore>) -> Router {
    create_router(AppState::new(
        Arc::new(FakeAuthService),
        Arc::new(FakeUserService),
        Arc::new(FakeContactService::default()),
        cache,
        Arc::new(HealthyDatabase),
    ))
}

pub fn app() -> TestApp {
    app_with(FakeContactService::default(), Arc::new(HealthyDatabase))
}
