//! Database connection and initialization.

use std::path::Path;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Database connection wrapper.
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Open (creating if necessary) the airspace database and run migrations.
///
/// The pool allows many concurrent readers; bulk extraction takes a single
/// writing transaction at a time.
pub async fn init_database(db_path: &str, max_connections: u32) -> Result<Database> {
    if db_path != ":memory:" {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path);
    info!("Connecting to database: {}", db_path);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(&db_url)
        .await?;

    run_migrations(&pool).await?;

    Ok(Database { pool })
}

/// Open an existing database read-only; fails with `DatasetMissing` when
/// the file is absent.
pub async fn open_database(db_path: &str, max_connections: u32) -> Result<Database> {
    if db_path != ":memory:" && !Path::new(db_path).exists() {
        return Err(Error::DatasetMissing(format!(
            "airspace database not found: {db_path}"
        )));
    }
    init_database(db_path, max_connections).await
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let migration_sql = include_str!("../../migrations/001_init.sql");

    info!("Running database migrations...");

    for statement in migration_sql.split(';') {
        let statement: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }

        if let Err(e) = sqlx::query(statement).execute(pool).await {
            let err_str = e.to_string();
            // "already exists" is expected on re-runs
            if err_str.contains("already exists") {
                continue;
            }
            if statement.to_uppercase().starts_with("CREATE") {
                return Err(Error::Internal(format!(
                    "migration failed on CREATE statement: {e}"
                )));
            }
            warn!("Migration statement failed: {}", e);
        }
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn init_creates_the_schema() {
        let db = init_database(":memory:", 1).await.unwrap();

        let count: (i32,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('airspaces', 'borders', 'vertices')",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();

        assert_eq!(count.0, 3);
    }

    #[tokio::test]
    async fn open_missing_database_is_a_dataset_error() {
        let err = open_database("/nonexistent/skycheck/airspaces.db", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DatasetMissing(_)));
    }
}
