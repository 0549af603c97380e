//! Jobs command - Background job management.
//!
//! - `work`: run the email worker
//! - `list`: show job counts by status
//! - `clear`: remove failed jobs from the queue
//!
//! ## Usage
//!
//! ```bash
//! cargo run -- jobs work
//! cargo run -- jobs list
//! cargo run -- jobs clear
//! ```

use apalis_sql::postgres::PostgresStorage;
use apalis_sql::sqlx::postgres::PgPoolOptions;
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};

use crate::cli::args::{JobsAction, JobsArgs};
use crate::config::{Config, JOB_NAME_EMAIL};
use crate::errors::{AppError, AppResult};
use crate::infra::Database;
use crate::jobs::EmailJob;

const EMAIL_QUEUE_POOL_SIZE: u32 = 5;

/// Job counts per status, as stored by apalis
#[derive(Debug, Default, PartialEq, Eq)]
pub struct QueueStatus {
    pub pending: i64,
    pub running: i64,
    pub failed: i64,
    pub done: i64,
}

impl QueueStatus {
    /// Fold `(status, count)` rows into the known buckets; unknown statuses are ignored.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (String, i64)>,
    {
        let mut status = Self::default();
        for (name, count) in rows {
            match name.as_str() {
                "Pending" => status.pending = count,
                "Running" => status.running = count,
                "Failed" => status.failed = count,
                "Done" => status.done = count,
                _ => {}
            }
        }
        status
    }
}

/// Execute the jobs command
pub async fn execute(args: JobsArgs, config: Config) -> AppResult<()> {
    match args.action {
        JobsAction::Work => run_worker(&config).await,
        JobsAction::List => list_jobs(&config).await,
        JobsAction::Clear => clear_failed_jobs(&config).await,
    }
}

/// Open the email queue, creating the apalis tables when missing.
pub(crate) async fn connect_email_storage(config: &Config) -> AppResult<PostgresStorage<EmailJob>> {
    let pool = PgPoolOptions::new()
        .max_connections(EMAIL_QUEUE_POOL_SIZE)
        .connect(&config.database_url)
        .await
        .map_err(|e| AppError::internal(format!("Failed to connect to job database: {}", e)))?;

    PostgresStorage::setup(&pool)
        .await
        .map_err(|e| AppError::internal(format!("Failed to setup job storage: {}", e)))?;

    Ok(PostgresStorage::new(pool))
}

/// Start the background email worker; stops on Ctrl+C.
async fn run_worker(config: &Config) -> AppResult<()> {
    use apalis::prelude::*;

    use crate::jobs::email_job_handler;

    tracing::info!("Connecting to database for job worker...");
    let email_storage = connect_email_storage(config).await?;

    tracing::info!("Job worker started. Press Ctrl+C to stop.");

    let worker = WorkerBuilder::new(JOB_NAME_EMAIL)
        .backend(email_storage)
        .build_fn(email_job_handler);

    let monitor = Monitor::new().register(worker);

    tokio::select! {
        result = monitor.run() => {
            if let Err(e) = result {
                tracing::error!("Worker error: {}", e);
                return Err(AppError::internal(format!("Worker failed: {}", e)));
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping worker...");
        }
    }

    tracing::info!("Job worker stopped.");
    Ok(())
}

async fn connect(config: &Config) -> AppResult<DatabaseConnection> {
    tracing::info!("Connecting to database...");
    let db = Database::connect_without_migrations(config)
        .await
        .map_err(|e| AppError::internal(format!("Failed to connect to database: {}", e)))?;
    Ok(db.get_connection())
}

/// Whether the apalis schema has been created yet.
async fn queue_initialized(db: &DatabaseConnection) -> AppResult<bool> {
    let row = db
        .query_one(Statement::from_string(
            DatabaseBackend::Postgres,
            "SELECT EXISTS(SELECT 1 FROM information_schema.schemata WHERE schema_name = 'apalis') AS exists",
        ))
        .await?;

    Ok(row
        .and_then(|r| r.try_get::<bool>("", "exists").ok())
        .unwrap_or(false))
}

/// Print job counts by status
async fn list_jobs(config: &Config) -> AppResult<()> {
    let db = connect(config).await?;

    println!("\n=== Job Queue Status ===");
    if !queue_initialized(&db).await? {
        println!("Job queue not initialized.");
        println!("Run 'jobs work' or 'serve' first to create the queue tables.");
        println!("========================\n");
        return Ok(());
    }

    let rows = db
        .query_all(Statement::from_string(
            DatabaseBackend::Postgres,
            "SELECT status::text AS status, COUNT(*)::bigint AS count FROM apalis.jobs GROUP BY status",
        ))
        .await?;

    let status = QueueStatus::from_rows(rows.into_iter().filter_map(|row| {
        let name = row.try_get::<String>("", "status").ok()?;
        let count = row.try_get::<i64>("", "count").ok()?;
        Some((name, count))
    }));

    println!("Pending:  {}", status.pending);
    println!("Running:  {}", status.running);
    println!("Failed:   {}", status.failed);
    println!("Done:     {}", status.done);
    println!("========================\n");

    Ok(())
}

/// Clear failed jobs from the queue
async fn clear_failed_jobs(config: &Config) -> AppResult<()> {
    let db = connect(config).await?;

    if !queue_initialized(&db).await? {
        println!("Job queue not initialized. Nothing to clear.");
        return Ok(());
    }

    let result = db
        .execute(Statement::from_string(
            DatabaseBackend::Postgres,
            "DELETE FROM apalis.jobs WHERE status = 'Failed'",
        ))
        .await?;

    let count = result.rows_affected();
    tracing::info!(count, "Cleared failed jobs");
    println!("Cleared {} failed job(s) from the queue.", count);

    Ok(())
}
