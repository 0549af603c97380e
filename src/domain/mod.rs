//! Domain layer - Core business entities and logic
//!
//! Contacts, their owners and the date arithmetic behind the
//! upcoming-birthday lookup. Nothing here touches the database or HTTP.

pub mod birthday;
pub mod contact;
pub mod password;
pub mod user;

pub use birthday::BirthdayWindow;
pub use contact::{Contact, ContactChanges, ContactQuery, ContactResponse, NewContact};
pub use password::Password;
pub use user::{normalize_email, User, UserResponse, UserRole};
