//! Application settings database operations
//!
//! Settings are JSON documents keyed by name. The auto-organize options live
//! under [AUTO_ORGANIZE_KEY], which makes this repository the
//! [ConfigProvider] of the organizer.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::sqlite_helpers::{decode_error, now_iso8601, str_to_datetime, str_to_uuid, uuid_to_str};
use crate::services::organize::{AutoOrganizeOptions, ConfigProvider};

pub const AUTO_ORGANIZE_KEY: &str = "auto_organize";

/// A setting record in the database
#[derive(Debug, Clone)]
pub struct SettingRecord {
    pub id: Uuid,
    pub key: String,
    pub value: JsonValue,
    pub category: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for SettingRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        let id_str: String = row.try_get("id")?;
        let created_str: String = row.try_get("created_at")?;
        let updated_str: String = row.try_get("updated_at")?;
        let value_str: String = row.try_get("value")?;

        Ok(Self {
            id: str_to_uuid(&id_str).map_err(decode_error)?,
            key: row.try_get("key")?,
            value: serde_json::from_str(&value_str).map_err(|e| sqlx::Error::Decode(e.into()))?,
            category: row.try_get("category")?,
            created_at: str_to_datetime(&created_str).map_err(decode_error)?,
            updated_at: str_to_datetime(&updated_str).map_err(decode_error)?,
        })
    }
}

/// Settings repository for database operations
#[derive(Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a setting by key
    pub async fn get(&self, key: &str) -> Result<Option<SettingRecord>> {
        let record = sqlx::query_as::<_, SettingRecord>("SELECT * FROM app_settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    /// Get a setting value as a specific type
    pub async fn get_value<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(r) => Ok(Some(serde_json::from_value(r.value)?)),
            None => Ok(None),
        }
    }

    /// Set a setting value
    pub async fn set<T: serde::Serialize>(&self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_string(&serde_json::to_value(value)?)?;
        let now = now_iso8601();

        sqlx::query(
            r#"
            INSERT INTO app_settings (id, key, value, category, created_at, updated_at)
            VALUES (?1, ?2, ?3, 'general', ?4, ?4)
            ON CONFLICT (key) DO UPDATE SET
                value = ?3,
                updated_at = ?4
            "#,
        )
        .bind(uuid_to_str(Uuid::new_v4()))
        .bind(key)
        .bind(&json_value)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ConfigProvider for SettingsRepository {
    async fn get_auto_organize_options(&self) -> Result<AutoOrganizeOptions> {
        Ok(self
            .get_value::<AutoOrganizeOptions>(AUTO_ORGANIZE_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn save_auto_organize_options(&self, options: &AutoOrganizeOptions) -> Result<()> {
        self.set(AUTO_ORGANIZE_KEY, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::services::organize::OrganizerType;

    #[tokio::test]
    async fn test_missing_options_fall_back_to_defaults() {
        let db = Database::connect_in_memory().await.unwrap();
        let options = db.settings().get_auto_organize_options().await.unwrap();
        assert_eq!(options, AutoOrganizeOptions::default());
    }

    #[tokio::test]
    async fn test_options_roundtrip_and_overwrite() {
        let db = Database::connect_in_memory().await.unwrap();
        let settings = db.settings();

        let mut options = AutoOrganizeOptions {
            enabled: true,
            watch_locations: vec!["/downloads".to_string()],
            ..Default::default()
        };
        settings.save_auto_organize_options(&options).await.unwrap();

        options.remember_match(Uuid::new_v4(), OrganizerType::Episode, "Series X", "Foo Bar");
        settings.save_auto_organize_options(&options).await.unwrap();

        let loaded = settings.get_auto_organize_options().await.unwrap();
        assert_eq!(loaded, options);
        assert_eq!(loaded.smart_match_infos[0].match_strings, vec!["Foo Bar".to_string()]);
    }
}
