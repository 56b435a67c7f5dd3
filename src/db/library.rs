//! Library catalog database operations
//!
//! Series with their on-disk season folders and episode files. Library
//! scanners fill these tables; the organizer reads them through
//! [LibraryIndex].

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::sqlite_helpers::{
    bool_to_int, decode_error, from_json, int_to_bool, now_iso8601, str_to_uuid, to_json, uuid_to_str,
};
use crate::services::organize::{EpisodeFile, LibraryIndex, SeasonFolder, Series};

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for Series {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        let id_str: String = row.try_get("id")?;
        let path: String = row.try_get("path")?;
        let provider_ids: String = row.try_get("provider_ids")?;
        let flat: i32 = row.try_get("episodes_without_season_folders")?;

        Ok(Self {
            id: str_to_uuid(&id_str).map_err(decode_error)?,
            name: row.try_get("name")?,
            year: row.try_get("year")?,
            path: PathBuf::from(path),
            provider_ids: from_json::<BTreeMap<String, String>>(&provider_ids).map_err(decode_error)?,
            episodes_without_season_folders: int_to_bool(flat),
            metadata_language: row.try_get("metadata_language")?,
            metadata_country: row.try_get("metadata_country")?,
        })
    }
}

#[derive(Clone)]
pub struct LibraryRepository {
    pool: SqlitePool,
}

impl LibraryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a series, or update the one with the same id
    pub async fn create_series(&self, series: &Series) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO library_series (
                id, name, year, path, provider_ids, episodes_without_season_folders,
                metadata_language, metadata_country, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT (id) DO UPDATE SET
                name = ?2,
                year = ?3,
                path = ?4,
                provider_ids = ?5,
                episodes_without_season_folders = ?6,
                metadata_language = ?7,
                metadata_country = ?8
            "#,
        )
        .bind(uuid_to_str(series.id))
        .bind(&series.name)
        .bind(series.year)
        .bind(series.path.to_string_lossy().to_string())
        .bind(to_json(&series.provider_ids))
        .bind(bool_to_int(series.episodes_without_season_folders))
        .bind(&series.metadata_language)
        .bind(&series.metadata_country)
        .bind(now_iso8601())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn add_season_folder(&self, series_id: Uuid, folder: &SeasonFolder) -> Result<()> {
        sqlx::query(
            "INSERT INTO library_seasons (id, series_id, season_number, path) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(uuid_to_str(Uuid::new_v4()))
        .bind(uuid_to_str(series_id))
        .bind(folder.season_number)
        .bind(folder.path.to_string_lossy().to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn add_episode_file(&self, series_id: Uuid, file: &EpisodeFile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO library_episodes (
                id, series_id, season_number, episode_number, ending_episode_number, path, is_virtual
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(uuid_to_str(Uuid::new_v4()))
        .bind(uuid_to_str(series_id))
        .bind(file.season_number)
        .bind(file.episode_number)
        .bind(file.ending_episode_number)
        .bind(file.path.to_string_lossy().to_string())
        .bind(bool_to_int(file.is_virtual))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl LibraryIndex for LibraryRepository {
    async fn list_series(&self) -> Result<Vec<Series>> {
        let series = sqlx::query_as::<_, Series>("SELECT * FROM library_series ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;
        Ok(series)
    }

    async fn get_series(&self, id: Uuid) -> Result<Option<Series>> {
        let series = sqlx::query_as::<_, Series>("SELECT * FROM library_series WHERE id = ?1")
            .bind(uuid_to_str(id))
            .fetch_optional(&self.pool)
            .await?;
        Ok(series)
    }

    async fn season_folders(&self, series_id: Uuid) -> Result<Vec<SeasonFolder>> {
        let rows: Vec<(i32, String)> = sqlx::query_as(
            "SELECT season_number, path FROM library_seasons WHERE series_id = ?1 ORDER BY season_number",
        )
        .bind(uuid_to_str(series_id))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(season_number, path)| SeasonFolder {
                season_number,
                path: PathBuf::from(path),
            })
            .collect())
    }

    async fn episode_files(&self, series_id: Uuid) -> Result<Vec<EpisodeFile>> {
        #[allow(clippy::type_complexity)]
        let rows: Vec<(Option<i32>, Option<i32>, Option<i32>, String, i32)> = sqlx::query_as(
            r#"
            SELECT season_number, episode_number, ending_episode_number, path, is_virtual
            FROM library_episodes
            WHERE series_id = ?1
            ORDER BY season_number, episode_number
            "#,
        )
        .bind(uuid_to_str(series_id))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(season_number, episode_number, ending_episode_number, path, is_virtual)| EpisodeFile {
                season_number,
                episode_number,
                ending_episode_number,
                path: PathBuf::from(path),
                is_virtual: int_to_bool(is_virtual),
            })
            .collect())
    }

    async fn register_series(&self, series: &Series) -> Result<()> {
        self.create_series(series).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    fn series(name: &str) -> Series {
        Series {
            id: Uuid::new_v4(),
            name: name.to_string(),
            year: Some(2015),
            path: PathBuf::from(format!("/tv/{}", name)),
            provider_ids: BTreeMap::from([("tvdb".to_string(), "289590".to_string())]),
            episodes_without_season_folders: false,
            metadata_language: Some("en".to_string()),
            metadata_country: Some("US".to_string()),
        }
    }

    #[tokio::test]
    async fn test_series_roundtrip() {
        let db = Database::connect_in_memory().await.unwrap();
        let library = db.library();

        let s = series("Mr Robot");
        library.create_series(&s).await.unwrap();

        assert_eq!(library.get_series(s.id).await.unwrap(), Some(s.clone()));
        assert_eq!(library.list_series().await.unwrap(), vec![s]);
        assert!(library.get_series(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_register_series_updates_existing() {
        let db = Database::connect_in_memory().await.unwrap();
        let library = db.library();

        let mut s = series("Show");
        library.register_series(&s).await.unwrap();
        s.provider_ids.insert("tvmaze".to_string(), "1871".to_string());
        library.register_series(&s).await.unwrap();

        let all = library.list_series().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].provider_ids.len(), 2);
    }

    #[tokio::test]
    async fn test_seasons_and_episodes() {
        let db = Database::connect_in_memory().await.unwrap();
        let library = db.library();

        let s = series("Show");
        library.create_series(&s).await.unwrap();
        library
            .add_season_folder(
                s.id,
                &SeasonFolder {
                    season_number: 1,
                    path: s.path.join("Season 01"),
                },
            )
            .await
            .unwrap();
        let file = EpisodeFile {
            season_number: Some(1),
            episode_number: Some(1),
            ending_episode_number: Some(2),
            path: s.path.join("Season 01").join("Show S01E01-E02.mkv"),
            is_virtual: false,
        };
        library.add_episode_file(s.id, &file).await.unwrap();

        let folders = library.season_folders(s.id).await.unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].season_number, 1);
        assert_eq!(library.episode_files(s.id).await.unwrap(), vec![file]);
        assert!(library.episode_files(Uuid::new_v4()).await.unwrap().is_empty());
    }
}
