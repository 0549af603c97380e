//! Contact service - the owner-scoped address book.
//!
//! Search and birthday results are cached in Redis with short TTLs and
//! dropped for an owner whenever that owner writes. Cache trouble is
//! logged and otherwise ignored: the database stays the source of truth.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{
    CACHE_PREFIX_CONTACT_BIRTHDAYS, CACHE_PREFIX_CONTACT_SEARCH, CONTACT_BIRTHDAYS_TTL_SECONDS,
    CONTACT_SEARCH_TTL_SECONDS, MAX_BIRTHDAY_DAYS, MAX_LIMIT, MIN_BIRTHDAY_DAYS, MIN_LIMIT,
};
use crate::domain::{
    normalize_email, BirthdayWindow, Contact, ContactChanges, ContactQuery, NewContact,
};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::{CacheStore, UnitOfWork};
use crate::types::PageWindow;

/// Message returned when a search names no usable term.
pub const EMPTY_SEARCH_MESSAGE: &str = "Provide at least one of: first_name, last_name, email";

/// Contact service trait for dependency injection.
#[async_trait]
pub trait ContactService: Send + Sync {
    /// Owner's contacts, one page at a time
    async fn list(&self, owner: Uuid, page: PageWindow) -> AppResult<Vec<Contact>>;

    /// A single contact
    async fn get(&self, owner: Uuid, id: i32) -> AppResult<Contact>;

    async fn create(&self, owner: Uuid, contact: NewContact) -> AppResult<Contact>;

    /// Partial update
    async fn update(&self, owner: Uuid, id: i32, changes: ContactChanges) -> AppResult<Contact>;

    async fn delete(&self, owner: Uuid, id: i32) -> AppResult<()>;

    /// Filtered search; at least one term is required
    async fn search(&self, owner: Uuid, query: ContactQuery, page: PageWindow)
        -> AppResult<Vec<Contact>>;

    /// Contacts with a birthday in the next `days` days, soonest first
    async fn upcoming_birthdays(&self, owner: Uuid, days: u32) -> AppResult<Vec<Contact>>;
}

/// Cache key for a search, shared by equivalent queries.
pub fn search_cache_key(owner: Uuid, query: &ContactQuery, page: PageWindow) -> String {
    #[derive(Serialize)]
    struct Key<'a> {
        query: &'a ContactQuery,
        skip: u64,
        limit: u64,
    }

    let normalized = query.normalized();
    let payload = serde_json::to_vec(&Key {
        query: &normalized,
        skip: page.skip,
        limit: page.limit,
    })
    .unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(&payload);
    format!(
        "{}{}:{:x}",
        CACHE_PREFIX_CONTACT_SEARCH,
        owner,
        hasher.finalize()
    )
}

/// Cache key for an upcoming-birthday lookup; a new day starts a new key.
pub fn birthdays_cache_key(owner: Uuid, today: NaiveDate, days: u32) -> String {
    format!(
        "{}{}:{}:{}",
        CACHE_PREFIX_CONTACT_BIRTHDAYS, owner, today, days
    )
}

/// Pattern matching every cached contact result of `owner`.
pub fn owner_cache_pattern(owner: Uuid) -> String {
    format!("contacts:*:{}:*", owner)
}

fn check_page(page: PageWindow) -> AppResult<()> {
    if page.is_within_bounds() {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "limit must be between {} and {}",
            MIN_LIMIT, MAX_LIMIT
        )))
    }
}

/// Concrete implementation of ContactService using Unit of Work.
pub struct ContactManager<U: UnitOfWork> {
    uow: Arc<U>,
    cache: Arc<dyn CacheStore>,
    today: fn() -> NaiveDate,
}

impl<U: UnitOfWork> ContactManager<U> {
    pub fn new(uow: Arc<U>, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            uow,
            cache,
            today: || Utc::now().date_naive(),
        }
    }

    /// Replace the source of "today" used for birthday windows.
    pub fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    async fn cached(&self, key: &str) -> Option<Vec<Contact>> {
        match self.cache.get_json::<Vec<Contact>>(key).await {
            Ok(hit) => {
                if hit.is_some() {
                    tracing::debug!(key, "Contact cache hit");
                }
                hit
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "Contact cache read failed");
                None
            }
        }
    }

    async fn store(&self, key: &str, contacts: &[Contact], ttl_seconds: u64) {
        if let Err(e) = self.cache.set_json(key, contacts, ttl_seconds).await {
            tracing::warn!(key, error = %e, "Contact cache write failed");
        }
    }

    async fn invalidate(&self, owner: Uuid) {
        match self.cache.delete_pattern(&owner_cache_pattern(owner)).await {
            Ok(count) => tracing::debug!(%owner, count, "Contact cache invalidated"),
            Err(e) => tracing::warn!(%owner, error = %e, "Contact cache invalidation failed"),
        }
    }
}

#[async_trait]
impl<U: UnitOfWork> ContactService for ContactManager<U> {
    async fn list(&self, owner: Uuid, page: PageWindow) -> AppResult<Vec<Contact>> {
        check_page(page)?;
        self.uow.contacts().list(owner, page.skip, page.limit).await
    }

    async fn get(&self, owner: Uuid, id: i32) -> AppResult<Contact> {
        self.uow
            .contacts()
            .find(owner, id)
            .await?
            .ok_or_not_found("Contact")
    }

    async fn create(&self, owner: Uuid, mut contact: NewContact) -> AppResult<Contact> {
        contact.email = normalize_email(&contact.email);
        let created = self.uow.contacts().create(owner, contact).await?;
        tracing::info!(%owner, contact_id = created.id, "Contact created");

        self.invalidate(owner).await;
        Ok(created)
    }

    async fn update(
        &self,
        owner: Uuid,
        id: i32,
        mut changes: ContactChanges,
    ) -> AppResult<Contact> {
        changes.email = changes.email.as_deref().map(normalize_email);
        let updated = self.uow.contacts().update(owner, id, changes).await?;
        tracing::info!(%owner, contact_id = id, "Contact updated");

        self.invalidate(owner).await;
        Ok(updated)
    }

    async fn delete(&self, owner: Uuid, id: i32) -> AppResult<()> {
        self.uow.contacts().delete(owner, id).await?;
        tracing::info!(%owner, contact_id = id, "Contact deleted");

        self.invalidate(owner).await;
        Ok(())
    }

    async fn search(
        &self,
        owner: Uuid,
        query: ContactQuery,
        page: PageWindow,
    ) -> AppResult<Vec<Contact>> {
        if query.is_empty() {
            return Err(AppError::bad_request(EMPTY_SEARCH_MESSAGE));
        }
        check_page(page)?;

        let key = search_cache_key(owner, &query, page);
        if let Some(hit) = self.cached(&key).await {
            return Ok(hit);
        }

        let contacts = self
            .uow
            .contacts()
            .search(owner, &query, page.skip, page.limit)
            .await?;

        self.store(&key, &contacts, CONTACT_SEARCH_TTL_SECONDS).await;
        Ok(contacts)
    }

    async fn upcoming_birthdays(&self, owner: Uuid, days: u32) -> AppResult<Vec<Contact>> {
        if !(MIN_BIRTHDAY_DAYS..=MAX_BIRTHDAY_DAYS).contains(&days) {
            return Err(AppError::validation(format!(
                "days must be between {} and {}",
                MIN_BIRTHDAY_DAYS, MAX_BIRTHDAY_DAYS
            )));
        }

        let window = BirthdayWindow::new((self.today)(), days);
        let key = birthdays_cache_key(owner, window.today(), days);
        if let Some(hit) = self.cached(&key).await {
            return Ok(hit);
        }

        let mut contacts: Vec<(i64, Contact)> = self
            .uow
            .contacts()
            .with_birthdays_in(owner, &window)
            .await?
            .into_iter()
            .filter_map(|contact| {
                let birthday = contact.birthday?;
                window
                    .contains(birthday)
                    .then(|| (window.days_until(birthday), contact))
            })
            .collect();

        contacts.sort_by(|(a_days, a), (b_days, b)| a_days.cmp(b_days).then(a.id.cmp(&b.id)));
        let contacts: Vec<Contact> = contacts.into_iter().map(|(_, c)| c).collect();

        self.store(&key, &contacts, CONTACT_BIRTHDAYS_TTL_SECONDS).await;
        Ok(contacts)
    }
}
