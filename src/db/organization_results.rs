//! Organization ledger database operations

use anyhow::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::sqlite_helpers::{
    datetime_to_str, decode_error, json_to_vec, str_to_datetime, str_to_uuid, to_json, uuid_to_str,
};
use crate::services::organize::{FileSortingStatus, OrganizationResult, OrganizerType};

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for OrganizationResult {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        let id_str: String = row.try_get("id")?;
        let date_str: String = row.try_get("date")?;
        let organizer_type: String = row.try_get("organizer_type")?;
        let status: String = row.try_get("status")?;
        let duplicates: String = row.try_get("duplicate_paths")?;

        Ok(Self {
            id: str_to_uuid(&id_str).map_err(decode_error)?,
            date: str_to_datetime(&date_str).map_err(decode_error)?,
            original_path: row.try_get("original_path")?,
            original_file_name: row.try_get("original_file_name")?,
            file_size_bytes: row.try_get("file_size_bytes")?,
            organizer_type: OrganizerType::parse(&organizer_type),
            extracted_name: row.try_get("extracted_name")?,
            extracted_year: row.try_get("extracted_year")?,
            extracted_season_number: row.try_get("extracted_season_number")?,
            extracted_episode_number: row.try_get("extracted_episode_number")?,
            extracted_ending_episode_number: row.try_get("extracted_ending_episode_number")?,
            extracted_movie_name: row.try_get("extracted_movie_name")?,
            extracted_movie_year: row.try_get("extracted_movie_year")?,
            target_path: row.try_get("target_path")?,
            duplicate_paths: json_to_vec(&duplicates),
            status: FileSortingStatus::parse(&status),
            status_message: row.try_get("status_message")?,
        })
    }
}

/// Repository for ledger rows, one per source path
#[derive(Clone)]
pub struct OrganizationResultRepository {
    pool: SqlitePool,
}

impl OrganizationResultRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<OrganizationResult>> {
        let record = sqlx::query_as::<_, OrganizationResult>(
            "SELECT * FROM organization_results WHERE id = ?1",
        )
        .bind(uuid_to_str(id))
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    pub async fn get_by_source_path(&self, path: &str) -> Result<Option<OrganizationResult>> {
        let record = sqlx::query_as::<_, OrganizationResult>(
            "SELECT * FROM organization_results WHERE original_path = ?1",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Insert or replace the row with this result's id
    pub async fn upsert(&self, result: &OrganizationResult) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO organization_results (
                id, date, original_path, original_file_name, file_size_bytes, organizer_type,
                extracted_name, extracted_year, extracted_season_number, extracted_episode_number,
                extracted_ending_episode_number, extracted_movie_name, extracted_movie_year,
                target_path, duplicate_paths, status, status_message
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            ON CONFLICT (id) DO UPDATE SET
                date = ?2,
                original_path = ?3,
                original_file_name = ?4,
                file_size_bytes = ?5,
                organizer_type = ?6,
                extracted_name = ?7,
                extracted_year = ?8,
                extracted_season_number = ?9,
                extracted_episode_number = ?10,
                extracted_ending_episode_number = ?11,
                extracted_movie_name = ?12,
                extracted_movie_year = ?13,
                target_path = ?14,
                duplicate_paths = ?15,
                status = ?16,
                status_message = ?17
            "#,
        )
        .bind(uuid_to_str(result.id))
        .bind(datetime_to_str(result.date))
        .bind(&result.original_path)
        .bind(&result.original_file_name)
        .bind(result.file_size_bytes)
        .bind(result.organizer_type.as_str())
        .bind(&result.extracted_name)
        .bind(result.extracted_year)
        .bind(result.extracted_season_number)
        .bind(result.extracted_episode_number)
        .bind(result.extracted_ending_episode_number)
        .bind(&result.extracted_movie_name)
        .bind(result.extracted_movie_year)
        .bind(&result.target_path)
        .bind(to_json(&result.duplicate_paths))
        .bind(result.status.as_str())
        .bind(&result.status_message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Newest first. `limit = None` returns everything from `start_index`.
    pub async fn list(&self, start_index: u32, limit: Option<u32>) -> Result<Vec<OrganizationResult>> {
        let limit = limit.map(i64::from).unwrap_or(-1);
        let records = sqlx::query_as::<_, OrganizationResult>(
            r#"
            SELECT * FROM organization_results
            ORDER BY date DESC, original_path ASC
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(limit)
        .bind(i64::from(start_index))
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM organization_results")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM organization_results WHERE id = ?1")
            .bind(uuid_to_str(id))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM organization_results")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
