use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub id: i64,
    /// Owning artist (identity provider user id). Immutable after creation.
    pub artist_id: Uuid,
    pub title: String,
    pub release_date: NaiveDate,
    pub upc: Option<String>,
    /// Unix seconds.
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewRelease {
    pub artist_id: Uuid,
    pub title: String,
    pub release_date: NaiveDate,
    pub upc: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReleaseChanges {
    pub title: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub upc: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: i64,
    pub release_id: i64,
    pub title: String,
    /// Seconds, always > 0.
    pub duration: i64,
    pub isrc: Option<String>,
    /// Legacy free-text pointer to the audio bytes.
    pub file_path: String,
    pub file_size: Option<i64>,
    pub audio_file_id: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewTrack {
    pub release_id: i64,
    pub title: String,
    pub duration: i64,
    pub isrc: Option<String>,
    pub file_path: String,
    pub file_size: Option<i64>,
    pub audio_file_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct TrackChanges {
    pub title: Option<String>,
    pub duration: Option<i64>,
    pub isrc: Option<String>,
    pub file_path: Option<String>,
    pub file_size: Option<i64>,
    pub audio_file_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AudioFile {
    pub id: i64,
    /// Opaque object-storage key.
    pub file_identifier: String,
    /// Signed URL captured at registration time. Advisory only.
    pub file_url: String,
    pub file_size: Option<i64>,
    pub checksum: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewAudioFile {
    pub file_identifier: String,
    pub file_url: String,
    pub file_size: Option<i64>,
    pub checksum: Option<String>,
}

/// Public detail view of a release, tracks joined in.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseWithTracks {
    #[serde(flatten)]
    pub release: Release,
    pub tracks: Vec<Track>,
}
