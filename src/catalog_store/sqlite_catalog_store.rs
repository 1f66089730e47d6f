use super::models::*;
use super::schema::CATALOG_VERSIONED_SCHEMAS;
use super::{AudioFileStore, CatalogStore};
use crate::sqlite_persistence::migrate_if_needed;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;
use uuid::Uuid;

pub struct SqliteCatalogStore {
    conn: Arc<Mutex<Connection>>,
}

fn invalid_column(index: usize, name: &str) -> rusqlite::Error {
    rusqlite::Error::InvalidColumnType(index, name.to_string(), rusqlite::types::Type::Text)
}

fn parse_release_row(row: &rusqlite::Row) -> rusqlite::Result<Release> {
    let artist_id: String = row.get(1)?;
    let release_date: String = row.get(3)?;
    Ok(Release {
        id: row.get(0)?,
        artist_id: artist_id
            .parse::<Uuid>()
            .map_err(|_| invalid_column(1, "artist_id"))?,
        title: row.get(2)?,
        release_date: release_date
            .parse::<NaiveDate>()
            .map_err(|_| invalid_column(3, "release_date"))?,
        upc: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn parse_track_row(row: &rusqlite::Row) -> rusqlite::Result<Track> {
    Ok(Track {
        id: row.get(0)?,
        release_id: row.get(1)?,
        title: row.get(2)?,
        duration: row.get(3)?,
        isrc: row.get(4)?,
        file_path: row.get(5)?,
        file_size: row.get(6)?,
        audio_file_id: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn parse_audio_file_row(row: &rusqlite::Row) -> rusqlite::Result<AudioFile> {
    Ok(AudioFile {
        id: row.get(0)?,
        file_identifier: row.get(1)?,
        file_url: row.get(2)?,
        file_size: row.get(3)?,
        checksum: row.get(4)?,
        created_at: row.get(5)?,
    })
}

const RELEASE_COLUMNS: &str = "id, artist_id, title, release_date, upc, created";
const TRACK_COLUMNS: &str =
    "id, release_id, title, duration, isrc, file_path, file_size, audio_file_id, created";
const AUDIO_FILE_COLUMNS: &str = "id, file_identifier, file_url, file_size, checksum, created";

impl SqliteCatalogStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let mut conn = Connection::open(db_path.as_ref())
            .context("Failed to open catalogue database")?;
        migrate_if_needed(&mut conn, "catalogue db", CATALOG_VERSIONED_SCHEMAS)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let release_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM releases", [], |r| r.get(0))
            .unwrap_or(0);
        let track_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM tracks", [], |r| r.get(0))
            .unwrap_or(0);
        info!(
            "Opened catalogue db: {} releases, {} tracks",
            release_count, track_count
        );

        Ok(SqliteCatalogStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migrate_if_needed(&mut conn, "catalogue db", CATALOG_VERSIONED_SCHEMAS)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(SqliteCatalogStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl AudioFileStore for SqliteCatalogStore {
    fn register_audio_file(&self, new: NewAudioFile) -> Result<AudioFile> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO audio_files (file_identifier, file_url, file_size, checksum)
             VALUES (?1, ?2, ?3, ?4)",
            params![new.file_identifier, new.file_url, new.file_size, new.checksum],
        )
        .context("Failed to register audio file")?;
        let id = conn.last_insert_rowid();

        conn.query_row(
            &format!("SELECT {} FROM audio_files WHERE id = ?1", AUDIO_FILE_COLUMNS),
            params![id],
            parse_audio_file_row,
        )
        .context("Registered audio file not found")
    }

    fn get_audio_file(&self, id: i64) -> Result<Option<AudioFile>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {} FROM audio_files WHERE id = ?1", AUDIO_FILE_COLUMNS),
            params![id],
            parse_audio_file_row,
        )
        .optional()
        .context("Failed to read audio file")
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn create_release(&self, new: NewRelease) -> Result<Release> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO releases (artist_id, title, release_date, upc) VALUES (?1, ?2, ?3, ?4)",
            params![
                new.artist_id.to_string(),
                new.title,
                new.release_date.to_string(),
                new.upc,
            ],
        )
        .context("Failed to create release")?;
        let id = conn.last_insert_rowid();

        conn.query_row(
            &format!("SELECT {} FROM releases WHERE id = ?1", RELEASE_COLUMNS),
            params![id],
            parse_release_row,
        )
        .context("Created release not found")
    }

    fn get_release(&self, id: i64) -> Result<Option<Release>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {} FROM releases WHERE id = ?1", RELEASE_COLUMNS),
            params![id],
            parse_release_row,
        )
        .optional()
        .context("Failed to read release")
    }

    fn update_release(&self, id: i64, changes: ReleaseChanges) -> Result<Option<Release>> {
        let conn = self.conn.lock().unwrap();
        let existing = conn
            .query_row(
                &format!("SELECT {} FROM releases WHERE id = ?1", RELEASE_COLUMNS),
                params![id],
                parse_release_row,
            )
            .optional()?;
        let existing = match existing {
            Some(release) => release,
            None => return Ok(None),
        };

        let title = changes.title.unwrap_or(existing.title);
        let release_date = changes.release_date.unwrap_or(existing.release_date);
        let upc = changes.upc.or(existing.upc);
        conn.execute(
            "UPDATE releases SET title = ?1, release_date = ?2, upc = ?3 WHERE id = ?4",
            params![title, release_date.to_string(), upc, id],
        )
        .context("Failed to update release")?;

        conn.query_row(
            &format!("SELECT {} FROM releases WHERE id = ?1", RELEASE_COLUMNS),
            params![id],
            parse_release_row,
        )
        .optional()
        .context("Failed to re-read updated release")
    }

    fn delete_release(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM releases WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn list_public_releases(&self, page: u32, size: u32) -> Result<Vec<Release>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM releases ORDER BY release_date DESC, id DESC LIMIT ?1 OFFSET ?2",
            RELEASE_COLUMNS
        ))?;
        let releases = stmt
            .query_map(params![size, page as i64 * size as i64], parse_release_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(releases)
    }

    fn list_releases_by_artist(&self, artist_id: Uuid) -> Result<Vec<Release>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM releases WHERE artist_id = ?1 ORDER BY release_date DESC",
            RELEASE_COLUMNS
        ))?;
        let releases = stmt
            .query_map(params![artist_id.to_string()], parse_release_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(releases)
    }

    fn get_release_with_tracks(&self, id: i64) -> Result<Option<ReleaseWithTracks>> {
        let release = match self.get_release(id)? {
            Some(release) => release,
            None => return Ok(None),
        };
        let tracks = self.list_tracks_by_release(id)?;
        Ok(Some(ReleaseWithTracks { release, tracks }))
    }

    fn create_track(&self, new: NewTrack) -> Result<Track> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO tracks (release_id, title, duration, isrc, file_path, file_size, audio_file_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                new.release_id,
                new.title,
                new.duration,
                new.isrc,
                new.file_path,
                new.file_size,
                new.audio_file_id,
            ],
        )
        .context("Failed to create track")?;
        let id = conn.last_insert_rowid();

        conn.query_row(
            &format!("SELECT {} FROM tracks WHERE id = ?1", TRACK_COLUMNS),
            params![id],
            parse_track_row,
        )
        .context("Created track not found")
    }

    fn get_track(&self, id: i64) -> Result<Option<Track>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {} FROM tracks WHERE id = ?1", TRACK_COLUMNS),
            params![id],
            parse_track_row,
        )
        .optional()
        .context("Failed to read track")
    }

    fn update_track(&self, id: i64, changes: TrackChanges) -> Result<Option<Track>> {
        let conn = self.conn.lock().unwrap();
        let existing = conn
            .query_row(
                &format!("SELECT {} FROM tracks WHERE id = ?1", TRACK_COLUMNS),
                params![id],
                parse_track_row,
            )
            .optional()?;
        let existing = match existing {
            Some(track) => track,
            None => return Ok(None),
        };

        let title = changes.title.unwrap_or(existing.title);
        let duration = changes.duration.unwrap_or(existing.duration);
        let isrc = changes.isrc.or(existing.isrc);
        let file_path = changes.file_path.unwrap_or(existing.file_path);
        let file_size = changes.file_size.or(existing.file_size);
        let audio_file_id = changes.audio_file_id.or(existing.audio_file_id);
        conn.execute(
            "UPDATE tracks SET title = ?1, duration = ?2, isrc = ?3, file_path = ?4,
                 file_size = ?5, audio_file_id = ?6 WHERE id = ?7",
            params![title, duration, isrc, file_path, file_size, audio_file_id, id],
        )
        .context("Failed to update track")?;

        conn.query_row(
            &format!("SELECT {} FROM tracks WHERE id = ?1", TRACK_COLUMNS),
            params![id],
            parse_track_row,
        )
        .optional()
        .context("Failed to re-read updated track")
    }

    fn delete_track(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM tracks WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn list_tracks(&self) -> Result<Vec<Track>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM tracks ORDER BY id",
            TRACK_COLUMNS
        ))?;
        let tracks = stmt
            .query_map([], parse_track_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tracks)
    }

    fn list_tracks_by_release(&self, release_id: i64) -> Result<Vec<Track>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM tracks WHERE release_id = ?1 ORDER BY id",
            TRACK_COLUMNS
        ))?;
        let tracks = stmt
            .query_map(params![release_id], parse_track_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tracks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_release(store: &SqliteCatalogStore, artist_id: Uuid, date: &str) -> Release {
        store
            .create_release(NewRelease {
                artist_id,
                title: "Test Release".to_string(),
                release_date: date.parse().unwrap(),
                upc: Some("123456789012".to_string()),
            })
            .unwrap()
    }

    fn sample_track(store: &SqliteCatalogStore, release_id: i64) -> Track {
        store
            .create_track(NewTrack {
                release_id,
                title: "T1".to_string(),
                duration: 180,
                isrc: None,
                file_path: "x.mp3".to_string(),
                file_size: None,
                audio_file_id: None,
            })
            .unwrap()
    }

    #[test]
    fn create_and_get_release() {
        let store = SqliteCatalogStore::in_memory().unwrap();
        let artist_id = Uuid::new_v4();
        let created = sample_release(&store, artist_id, "2024-06-01");

        let fetched = store.get_release(created.id).unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.artist_id, artist_id);
        assert!(store.get_release(created.id + 1).unwrap().is_none());
    }

    #[test]
    fn update_release_applies_only_supplied_fields() {
        let store = SqliteCatalogStore::in_memory().unwrap();
        let created = sample_release(&store, Uuid::new_v4(), "2024-06-01");

        let updated = store
            .update_release(
                created.id,
                ReleaseChanges {
                    title: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.release_date, created.release_date);
        assert_eq!(updated.upc, created.upc);
        assert_eq!(updated.artist_id, created.artist_id);
    }

    #[test]
    fn update_missing_release_returns_none() {
        let store = SqliteCatalogStore::in_memory().unwrap();
        let result = store.update_release(42, ReleaseChanges::default()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn delete_release_cascades_to_tracks() {
        let store = SqliteCatalogStore::in_memory().unwrap();
        let release = sample_release(&store, Uuid::new_v4(), "2024-06-01");
        let track_a = sample_track(&store, release.id);
        let track_b = sample_track(&store, release.id);

        assert!(store.delete_release(release.id).unwrap());
        assert!(store.get_track(track_a.id).unwrap().is_none());
        assert!(store.get_track(track_b.id).unwrap().is_none());
        assert!(store.list_tracks_by_release(release.id).unwrap().is_empty());
    }

    #[test]
    fn pagination_is_ordered_and_non_overlapping() {
        let store = SqliteCatalogStore::in_memory().unwrap();
        let artist_id = Uuid::new_v4();
        for day in 1..=25 {
            sample_release(&store, artist_id, &format!("2024-03-{:02}", day));
        }

        let page_0 = store.list_public_releases(0, 20).unwrap();
        let page_1 = store.list_public_releases(1, 20).unwrap();
        assert_eq!(page_0.len(), 20);
        assert_eq!(page_1.len(), 5);

        // Newest first
        assert!(page_0.windows(2).all(|w| w[0].release_date >= w[1].release_date));

        let ids_0: Vec<i64> = page_0.iter().map(|r| r.id).collect();
        assert!(page_1.iter().all(|r| !ids_0.contains(&r.id)));
    }

    #[test]
    fn release_with_tracks_joins_children() {
        let store = SqliteCatalogStore::in_memory().unwrap();
        let release = sample_release(&store, Uuid::new_v4(), "2024-06-01");
        sample_track(&store, release.id);

        let detail = store.get_release_with_tracks(release.id).unwrap().unwrap();
        assert_eq!(detail.release.id, release.id);
        assert_eq!(detail.tracks.len(), 1);
        assert_eq!(detail.tracks[0].title, "T1");

        assert!(store.get_release_with_tracks(release.id + 1).unwrap().is_none());
    }

    #[test]
    fn list_releases_by_artist_filters_on_owner() {
        let store = SqliteCatalogStore::in_memory().unwrap();
        let artist_a = Uuid::new_v4();
        let artist_b = Uuid::new_v4();
        sample_release(&store, artist_a, "2024-06-01");
        sample_release(&store, artist_a, "2024-06-02");
        sample_release(&store, artist_b, "2024-06-03");

        assert_eq!(store.list_releases_by_artist(artist_a).unwrap().len(), 2);
        assert_eq!(store.list_releases_by_artist(artist_b).unwrap().len(), 1);
    }

    #[test]
    fn track_links_to_registered_audio_file() {
        let store = SqliteCatalogStore::in_memory().unwrap();
        let release = sample_release(&store, Uuid::new_v4(), "2024-06-01");
        let audio_file = store
            .register_audio_file(NewAudioFile {
                file_identifier: "abc-song.mp3".to_string(),
                file_url: "https://example.com/signed".to_string(),
                file_size: Some(1024),
                checksum: Some("deadbeef".to_string()),
            })
            .unwrap();

        let track = store
            .create_track(NewTrack {
                release_id: release.id,
                title: "Linked".to_string(),
                duration: 200,
                isrc: None,
                file_path: "linked.mp3".to_string(),
                file_size: None,
                audio_file_id: Some(audio_file.id),
            })
            .unwrap();
        assert_eq!(track.audio_file_id, Some(audio_file.id));

        let fetched = store.get_audio_file(audio_file.id).unwrap().unwrap();
        assert_eq!(fetched.file_identifier, "abc-song.mp3");
        assert!(store.get_audio_file(audio_file.id + 1).unwrap().is_none());
    }

    #[test]
    fn list_tracks_spans_releases() {
        let store = SqliteCatalogStore::in_memory().unwrap();
        let release_a = sample_release(&store, Uuid::new_v4(), "2024-06-01");
        let release_b = sample_release(&store, Uuid::new_v4(), "2024-06-02");
        sample_track(&store, release_a.id);
        sample_track(&store, release_b.id);

        let all = store.list_tracks().unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn update_track_merges_changes() {
        let store = SqliteCatalogStore::in_memory().unwrap();
        let release = sample_release(&store, Uuid::new_v4(), "2024-06-01");
        let track = sample_track(&store, release.id);

        let updated = store
            .update_track(
                track.id,
                TrackChanges {
                    duration: Some(240),
                    isrc: Some("USX9P2400001".to_string()),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.duration, 240);
        assert_eq!(updated.isrc.as_deref(), Some("USX9P2400001"));
        assert_eq!(updated.title, track.title);
        assert_eq!(updated.release_id, release.id);
    }
}
