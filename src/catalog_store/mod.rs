mod models;
mod schema;
mod sqlite_catalog_store;

pub use models::*;
pub use sqlite_catalog_store::SqliteCatalogStore;

use anyhow::Result;
use uuid::Uuid;

/// Registry of uploaded audio files.
///
/// Registration always inserts a new row; the persisted `file_url` is a
/// snapshot taken at registration time and is never trusted for playback —
/// callers re-derive a fresh signed URL from `file_identifier` instead.
pub trait AudioFileStore: Send + Sync {
    fn register_audio_file(&self, new: NewAudioFile) -> Result<AudioFile>;

    fn get_audio_file(&self, id: i64) -> Result<Option<AudioFile>>;
}

/// Storage for releases and their tracks.
///
/// Ownership is carried by `Release.artist_id`; tracks inherit it through
/// their release. Deleting a release cascades to its tracks.
pub trait CatalogStore: AudioFileStore + Send + Sync {
    fn create_release(&self, new: NewRelease) -> Result<Release>;

    fn get_release(&self, id: i64) -> Result<Option<Release>>;

    /// Applies only the supplied fields. Returns Ok(None) if the release
    /// does not exist. `artist_id` is immutable.
    fn update_release(&self, id: i64, changes: ReleaseChanges) -> Result<Option<Release>>;

    /// Returns true if a row was deleted. Child tracks go with it.
    fn delete_release(&self, id: i64) -> Result<bool>;

    /// Zero-indexed pagination, ordered by release date descending.
    fn list_public_releases(&self, page: u32, size: u32) -> Result<Vec<Release>>;

    fn list_releases_by_artist(&self, artist_id: Uuid) -> Result<Vec<Release>>;

    fn get_release_with_tracks(&self, id: i64) -> Result<Option<ReleaseWithTracks>>;

    fn create_track(&self, new: NewTrack) -> Result<Track>;

    fn get_track(&self, id: i64) -> Result<Option<Track>>;

    fn update_track(&self, id: i64, changes: TrackChanges) -> Result<Option<Track>>;

    fn delete_track(&self, id: i64) -> Result<bool>;

    fn list_tracks(&self) -> Result<Vec<Track>>;

    fn list_tracks_by_release(&self, release_id: i64) -> Result<Vec<Track>>;
}
