use super::{ArtistProfile, FanProfile, ProfileStore};
use crate::sqlite_column;
use crate::sqlite_persistence::{
    migrate_if_needed, Column, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;
use uuid::Uuid;

const ARTIST_PROFILE_TABLE: Table = Table {
    name: "artist_profile",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Text,
            is_primary_key = true,
            non_null = true
        ),
        sqlite_column!("biography", &SqlType::Text),
        sqlite_column!("social_links", &SqlType::Text),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

const FAN_PROFILE_TABLE: Table = Table {
    name: "fan_profile",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Text,
            is_primary_key = true,
            non_null = true
        ),
        sqlite_column!(
            "subscription_active",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("subscription_start_date", &SqlType::Text),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

const PROFILE_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[ARTIST_PROFILE_TABLE, FAN_PROFILE_TABLE],
    migration: None,
}];

pub struct SqliteProfileStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteProfileStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let mut conn = Connection::open(db_path.as_ref())
            .context("Failed to open profile database")?;
        migrate_if_needed(&mut conn, "profile db", PROFILE_VERSIONED_SCHEMAS)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let artist_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM artist_profile", [], |r| r.get(0))
            .unwrap_or(0);
        let fan_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM fan_profile", [], |r| r.get(0))
            .unwrap_or(0);
        info!(
            "Opened profile db: {} artist profiles, {} fan profiles",
            artist_count, fan_count
        );

        Ok(SqliteProfileStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn parse_artist_row(row: &rusqlite::Row) -> rusqlite::Result<ArtistProfile> {
        let user_id: String = row.get(0)?;
        Ok(ArtistProfile {
            user_id: user_id.parse().map_err(|_| {
                rusqlite::Error::InvalidColumnType(0, "user_id".to_string(), rusqlite::types::Type::Text)
            })?,
            biography: row.get(1)?,
            social_links: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    fn parse_fan_row(row: &rusqlite::Row) -> rusqlite::Result<FanProfile> {
        let user_id: String = row.get(0)?;
        let start_date: Option<String> = row.get(2)?;
        Ok(FanProfile {
            user_id: user_id.parse().map_err(|_| {
                rusqlite::Error::InvalidColumnType(0, "user_id".to_string(), rusqlite::types::Type::Text)
            })?,
            subscription_active: row.get::<_, i64>(1)? != 0,
            subscription_start_date: start_date
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|d| d.with_timezone(&Utc)),
            created_at: row.get(3)?,
        })
    }
}

impl ProfileStore for SqliteProfileStore {
    fn upsert_artist_profile(
        &self,
        user_id: Uuid,
        biography: Option<String>,
        social_links: Option<String>,
    ) -> Result<ArtistProfile> {
        let conn = self.conn.lock().unwrap();
        // Single statement upsert; `created` is only written by the insert arm.
        conn.execute(
            "INSERT INTO artist_profile (user_id, biography, social_links) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                 biography = excluded.biography,
                 social_links = excluded.social_links",
            params![user_id.to_string(), biography, social_links],
        )
        .with_context(|| format!("Failed to upsert artist profile for {}", user_id))?;

        conn.query_row(
            "SELECT user_id, biography, social_links, created FROM artist_profile WHERE user_id = ?1",
            params![user_id.to_string()],
            Self::parse_artist_row,
        )
        .context("Upserted artist profile not found")
    }

    fn get_artist_profile(&self, user_id: Uuid) -> Result<Option<ArtistProfile>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT user_id, biography, social_links, created FROM artist_profile WHERE user_id = ?1",
            params![user_id.to_string()],
            Self::parse_artist_row,
        )
        .optional()
        .context("Failed to read artist profile")
    }

    fn delete_artist_profile(&self, user_id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM artist_profile WHERE user_id = ?1",
            params![user_id.to_string()],
        )?;
        Ok(deleted > 0)
    }

    fn upsert_fan_profile(
        &self,
        user_id: Uuid,
        subscription_active: bool,
        subscription_start_date: Option<DateTime<Utc>>,
    ) -> Result<FanProfile> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO fan_profile (user_id, subscription_active, subscription_start_date)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                 subscription_active = excluded.subscription_active,
                 subscription_start_date = excluded.subscription_start_date",
            params![
                user_id.to_string(),
                subscription_active as i64,
                subscription_start_date.map(|d| d.to_rfc3339()),
            ],
        )
        .with_context(|| format!("Failed to upsert fan profile for {}", user_id))?;

        conn.query_row(
            "SELECT user_id, subscription_active, subscription_start_date, created
             FROM fan_profile WHERE user_id = ?1",
            params![user_id.to_string()],
            Self::parse_fan_row,
        )
        .context("Upserted fan profile not found")
    }

    fn get_fan_profile(&self, user_id: Uuid) -> Result<Option<FanProfile>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT user_id, subscription_active, subscription_start_date, created
             FROM fan_profile WHERE user_id = ?1",
            params![user_id.to_string()],
            Self::parse_fan_row,
        )
        .optional()
        .context("Failed to read fan profile")
    }

    fn delete_fan_profile(&self, user_id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM fan_profile WHERE user_id = ?1",
            params![user_id.to_string()],
        )?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_tmp_store() -> (SqliteProfileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteProfileStore::new(temp_dir.path().join("profiles.db")).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn upsert_inserts_then_updates_in_place() {
        let (store, _temp_dir) = create_tmp_store();
        let user_id = Uuid::new_v4();

        let first = store
            .upsert_artist_profile(user_id, Some("first bio".into()), None)
            .unwrap();
        assert_eq!(first.biography.as_deref(), Some("first bio"));

        let second = store
            .upsert_artist_profile(user_id, Some("second bio".into()), Some("{}".into()))
            .unwrap();
        assert_eq!(second.user_id, user_id);
        assert_eq!(second.biography.as_deref(), Some("second bio"));
        assert_eq!(second.social_links.as_deref(), Some("{}"));
        // created_at survives the second upsert
        assert_eq!(second.created_at, first.created_at);
    }

    #[test]
    fn get_artist_profile_returns_none_when_missing() {
        let (store, _temp_dir) = create_tmp_store();
        assert!(store.get_artist_profile(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn delete_artist_profile_reports_whether_row_existed() {
        let (store, _temp_dir) = create_tmp_store();
        let user_id = Uuid::new_v4();
        store.upsert_artist_profile(user_id, None, None).unwrap();

        assert!(store.delete_artist_profile(user_id).unwrap());
        assert!(!store.delete_artist_profile(user_id).unwrap());
        assert!(store.get_artist_profile(user_id).unwrap().is_none());
    }

    #[test]
    fn fan_profile_round_trips_subscription_fields() {
        let (store, _temp_dir) = create_tmp_store();
        let user_id = Uuid::new_v4();
        let start = Utc::now();

        let profile = store
            .upsert_fan_profile(user_id, true, Some(start))
            .unwrap();
        assert!(profile.subscription_active);
        let stored_start = profile.subscription_start_date.unwrap();
        assert_eq!(stored_start.timestamp(), start.timestamp());

        let fetched = store.get_fan_profile(user_id).unwrap().unwrap();
        assert!(fetched.subscription_active);
    }

    #[test]
    fn a_user_may_hold_both_profile_kinds() {
        // Exclusivity is enforced at registration time only, not in storage.
        let (store, _temp_dir) = create_tmp_store();
        let user_id = Uuid::new_v4();

        store.upsert_artist_profile(user_id, None, None).unwrap();
        store.upsert_fan_profile(user_id, false, None).unwrap();

        assert!(store.get_artist_profile(user_id).unwrap().is_some());
        assert!(store.get_fan_profile(user_id).unwrap().is_some());
    }
}
