//! Contact repository implementation.
//!
//! Every query is scoped to the owning user; another user's contact is
//! treated exactly like a missing one.

use async_trait::async_trait;
use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use super::entities::contact::{self, ActiveModel, Entity as ContactEntity};
use crate::domain::{BirthdayWindow, Contact, ContactChanges, ContactQuery, NewContact};
use crate::errors::{AppError, AppResult, OptionExt};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// `MMDD` of Feb 29; such birthdays are kept for the window check in non-leap years.
const LEAP_DAY_KEY: &str = "0229";

/// Contact repository trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ContactRepository: Send + Sync {
    /// Owner's contacts ordered by id
    async fn list(&self, owner: Uuid, skip: u64, limit: u64) -> AppResult<Vec<Contact>>;

    /// Find one of the owner's contacts
    async fn find(&self, owner: Uuid, id: i32) -> AppResult<Option<Contact>>;

    /// Insert a contact for the owner
    async fn create(&self, owner: Uuid, contact: NewContact) -> AppResult<Contact>;

    /// Apply the supplied fields to one of the owner's contacts
    async fn update(&self, owner: Uuid, id: i32, changes: ContactChanges) -> AppResult<Contact>;

    /// Hard delete one of the owner's contacts
    async fn delete(&self, owner: Uuid, id: i32) -> AppResult<()>;

    /// Case-insensitive substring search, terms combined with AND
    async fn search(
        &self,
        owner: Uuid,
        query: &ContactQuery,
        skip: u64,
        limit: u64,
    ) -> AppResult<Vec<Contact>>;

    /// Contacts whose birthday month/day may fall inside the window.
    ///
    /// The result is a superset; callers apply `BirthdayWindow::contains`.
    async fn with_birthdays_in(&self, owner: Uuid, window: &BirthdayWindow)
        -> AppResult<Vec<Contact>>;
}

/// Concrete implementation of ContactRepository
pub struct ContactStore {
    db: DatabaseConnection,
}

impl ContactStore {
    /// Create new repository instance
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn load(&self, owner: Uuid, id: i32) -> AppResult<contact::Model> {
        ContactEntity::find_by_id(id)
            .filter(contact::Column::UserId.eq(owner))
            .one(&self.db)
            .await?
            .ok_or_not_found("Contact")
    }
}

/// Build the AND-combined substring filter for the supplied terms.
pub(crate) fn search_condition(owner: Uuid, query: &ContactQuery) -> Condition {
    let terms = [
        (contact::Column::FirstName, &query.first_name),
        (contact::Column::LastName, &query.last_name),
        (contact::Column::Email, &query.email),
    ];

    terms
        .into_iter()
        .filter_map(|(column, term)| term.as_ref().map(|t| (column, t)))
        .fold(
            Condition::all().add(contact::Column::UserId.eq(owner)),
            |condition, (column, term)| {
                condition.add(
                    Expr::expr(Func::lower(Expr::col(column)))
                        .like(format!("%{}%", escape_like(&term.to_lowercase()))),
                )
            },
        )
}

/// Narrow by `MMDD` so the database does the bulk of the filtering.
pub(crate) fn birthday_condition(window: &BirthdayWindow) -> Option<Condition> {
    if window.covers_full_year() {
        return None;
    }

    let mmdd = || Expr::expr(SimpleExpr::Custom("to_char(birthday, 'MMDD')".into()));
    let range = if window.wraps_year() {
        Condition::any()
            .add(mmdd().gte(window.start_key()))
            .add(mmdd().lte(window.end_key()))
    } else {
        Condition::all().add(mmdd().between(window.start_key(), window.end_key()))
    };

    Some(Condition::any().add(range).add(mmdd().eq(LEAP_DAY_KEY)))
}

/// Escape LIKE wildcards so user input matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl ContactRepository for ContactStore {
    async fn list(&self, owner: Uuid, skip: u64, limit: u64) -> AppResult<Vec<Contact>> {
        let models = ContactEntity::find()
            .filter(contact::Column::UserId.eq(owner))
            .order_by_asc(contact::Column::Id)
            .offset(skip)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(models.into_iter().map(Contact::from).collect())
    }

    async fn find(&self, owner: Uuid, id: i32) -> AppResult<Option<Contact>> {
        let result = ContactEntity::find_by_id(id)
            .filter(contact::Column::UserId.eq(owner))
            .one(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(result.map(Contact::from))
    }

    async fn create(&self, owner: Uuid, contact: NewContact) -> AppResult<Contact> {
        let now = chrono::Utc::now();
        let active_model = ActiveModel {
            user_id: Set(owner),
            first_name: Set(contact.first_name),
            last_name: Set(contact.last_name),
            email: Set(contact.email),
            phone: Set(contact.phone),
            birthday: Set(contact.birthday),
            extra_info: Set(contact.extra_info),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active_model
            .insert(&self.db)
            .await
            .map_err(|e| AppError::from_db(e, "Contact"))?;
        Ok(Contact::from(model))
    }

    async fn update(&self, owner: Uuid, id: i32, changes: ContactChanges) -> AppResult<Contact> {
        let mut active: ActiveModel = self.load(owner, id).await?.into();

        if let Some(first_name) = changes.first_name {
            active.first_name = Set(first_name);
        }
        if let Some(last_name) = changes.last_name {
            active.last_name = Set(last_name);
        }
        if let Some(email) = changes.email {
            active.email = Set(email);
        }
        if let Some(phone) = changes.phone {
            active.phone = Set(phone);
        }
        if let Some(birthday) = changes.birthday {
            active.birthday = Set(birthday);
        }
        if let Some(extra_info) = changes.extra_info {
            active.extra_info = Set(extra_info);
        }
        active.updated_at = Set(chrono::Utc::now());

        let model = active
            .update(&self.db)
            .await
            .map_err(|e| AppError::from_db(e, "Contact"))?;
        Ok(Contact::from(model))
    }

    async fn delete(&self, owner: Uuid, id: i32) -> AppResult<()> {
        let result = ContactEntity::delete_many()
            .filter(contact::Column::Id.eq(id))
            .filter(contact::Column::UserId.eq(owner))
            .exec(&self.db)
            .await
            .map_err(AppError::from)?;

        if result.rows_affected == 0 {
            return Err(AppError::not_found("Contact"));
        }

        Ok(())
    }

    async fn search(
        &self,
        owner: Uuid,
        query: &ContactQuery,
        skip: u64,
        limit: u64,
    ) -> AppResult<Vec<Contact>> {
        let models = ContactEntity::find()
            .filter(search_condition(owner, query))
            .order_by_asc(contact::Column::Id)
            .offset(skip)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(models.into_iter().map(Contact::from).collect())
    }

    async fn with_birthdays_in(
        &self,
        owner: Uuid,
        window: &BirthdayWindow,
    ) -> AppResult<Vec<Contact>> {
        let mut select = ContactEntity::find()
            .filter(contact::Column::UserId.eq(owner))
            .filter(contact::Column::Birthday.is_not_null());

        if let Some(condition) = birthday_condition(window) {
            select = select.filter(condition);
        }

        let models = select.all(&self.db).await.map_err(AppError::from)?;
        Ok(models.into_iter().map(Contact::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sea_orm::{DbBackend, QueryTrait};

    fn owner() -> Uuid {
        Uuid::parse_str("7c9e6679-7425-40de-944b-e07fc1f90ae7").unwrap()
    }

    fn sql(condition: Condition) -> String {
        ContactEntity::find()
            .filter(condition)
            .build(DbBackend::Postgres)
            .to_string()
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_search_condition_ands_supplied_terms() {
        let query = ContactQuery::new(Some("Ann"), None, Some("Mail"));
        let sql = sql(search_condition(owner(), &query));

        assert!(sql.contains("LOWER(\"first_name\") LIKE '%ann%'"), "{}", sql);
        assert!(sql.contains("LOWER(\"email\") LIKE '%mail%'"), "{}", sql);
        assert!(!sql.contains("last_name\") LIKE"), "{}", sql);
        assert!(sql.contains(" AND "), "{}", sql);
    }

    #[test]
    fn test_birthday_condition_plain_range() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let condition = birthday_condition(&BirthdayWindow::new(today, 7)).unwrap();
        let sql = sql(condition);

        assert!(sql.contains("BETWEEN '0610' AND '0617'"), "{}", sql);
        assert!(sql.contains("'0229'"), "{}", sql);
    }

    #[test]
    fn test_birthday_condition_wraps_year() {
        let today = NaiveDate::from_ymd_opt(2025, 12, 28).unwrap();
        let condition = birthday_condition(&BirthdayWindow::new(today, 7)).unwrap();
        let sql = sql(condition);

        assert!(sql.contains(">= '1228'"), "{}", sql);
        assert!(sql.contains("<= '0104'"), "{}", sql);
    }

    #[test]
    fn test_birthday_condition_full_year_has_no_filter() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        assert!(birthday_condition(&BirthdayWindow::new(today, 365)).is_none());
    }
}
