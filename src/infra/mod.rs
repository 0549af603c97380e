//! Infrastructure layer - External systems integration
//!
//! Database connection, migrations and repositories, the Redis cache,
//! and the Unit of Work for transaction management.

pub mod cache;
pub mod db;
pub mod repositories;
pub mod unit_of_work;

pub use cache::{Cache, CacheStore};
pub use db::{Database, HealthCheck, Migrator};
pub use repositories::{ContactRepository, ContactStore, UserRepository, UserStore};
pub use unit_of_work::{Persistence, TransactionContext, TxFuture, TxUserRepository, UnitOfWork};

#[cfg(any(test, feature = "test-utils"))]
pub use cache::{MemoryCache, MockCacheStore};
#[cfg(any(test, feature = "test-utils"))]
pub use repositories::{MockContactRepository, MockUserRepository};
