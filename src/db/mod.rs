//! Database connection and operations

pub mod library;
pub mod organization_results;
pub mod settings;
pub mod sqlite_helpers;

use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub use library::LibraryRepository;
pub use organization_results::OrganizationResultRepository;
pub use settings::SettingsRepository;

/// Idempotent schema, applied in order on every start
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS organization_results (
        id TEXT PRIMARY KEY NOT NULL,
        date TEXT NOT NULL,
        original_path TEXT NOT NULL UNIQUE,
        original_file_name TEXT NOT NULL,
        file_size_bytes INTEGER NOT NULL DEFAULT 0,
        organizer_type TEXT NOT NULL,
        extracted_name TEXT,
        extracted_year INTEGER,
        extracted_season_number INTEGER,
        extracted_episode_number INTEGER,
        extracted_ending_episode_number INTEGER,
        extracted_movie_name TEXT,
        extracted_movie_year INTEGER,
        target_path TEXT,
        duplicate_paths TEXT NOT NULL DEFAULT '[]',
        status TEXT NOT NULL,
        status_message TEXT NOT NULL DEFAULT ''
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_organization_results_date ON organization_results (date DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS app_settings (
        id TEXT PRIMARY KEY NOT NULL,
        key TEXT NOT NULL UNIQUE,
        value TEXT NOT NULL,
        description TEXT,
        category TEXT NOT NULL DEFAULT 'general',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS library_series (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        year INTEGER,
        path TEXT NOT NULL,
        provider_ids TEXT NOT NULL DEFAULT '{}',
        episodes_without_season_folders INTEGER NOT NULL DEFAULT 0,
        metadata_language TEXT,
        metadata_country TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS library_seasons (
        id TEXT PRIMARY KEY NOT NULL,
        series_id TEXT NOT NULL REFERENCES library_series (id) ON DELETE CASCADE,
        season_number INTEGER NOT NULL,
        path TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS library_episodes (
        id TEXT PRIMARY KEY NOT NULL,
        series_id TEXT NOT NULL REFERENCES library_series (id) ON DELETE CASCADE,
        season_number INTEGER,
        episode_number INTEGER,
        ending_episode_number INTEGER,
        path TEXT NOT NULL,
        is_virtual INTEGER NOT NULL DEFAULT 0
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_library_episodes_series ON library_episodes (series_id)",
];

/// Database wrapper providing connection pool access
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database wrapper from an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `url` and apply the schema
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid database URL: {}", url))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {}", url))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Private in-memory database. A single connection, since every
    /// SQLite memory connection is its own database.
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&self.pool)
                .await
                .context("Failed to apply schema")?;
        }
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Check the database answers queries
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Get the organization ledger repository
    pub fn organization_results(&self) -> OrganizationResultRepository {
        OrganizationResultRepository::new(self.pool.clone())
    }

    /// Get a settings repository
    pub fn settings(&self) -> SettingsRepository {
        SettingsRepository::new(self.pool.clone())
    }

    /// Get the library catalog repository
    pub fn library(&self) -> LibraryRepository {
        LibraryRepository::new(self.pool.clone())
    }
}
