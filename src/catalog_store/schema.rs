//! SQLite schema for the catalogue database.
//!
//! Releases own tracks via a cascade foreign key; audio files are referenced
//! from tracks with SET NULL so deleting a registration never orphans a track.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

const RELEASES_TABLE: Table = Table {
    name: "releases",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("artist_id", &SqlType::Text, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("release_date", &SqlType::Text, non_null = true), // ISO date, sorts lexically
        sqlite_column!("upc", &SqlType::Text),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_releases_artist", "artist_id"),
        ("idx_releases_date", "release_date"),
    ],
    unique_constraints: &[],
};

const AUDIO_FILES_TABLE: Table = Table {
    name: "audio_files",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("file_identifier", &SqlType::Text, non_null = true),
        sqlite_column!("file_url", &SqlType::Text, non_null = true),
        sqlite_column!("file_size", &SqlType::Integer),
        sqlite_column!("checksum", &SqlType::Text),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_audio_files_identifier", "file_identifier")],
    unique_constraints: &[],
};

const TRACKS_TABLE: Table = Table {
    name: "tracks",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "release_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "releases",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("duration", &SqlType::Integer, non_null = true),
        sqlite_column!("isrc", &SqlType::Text),
        sqlite_column!("file_path", &SqlType::Text, non_null = true),
        sqlite_column!("file_size", &SqlType::Integer),
        sqlite_column!(
            "audio_file_id",
            &SqlType::Integer,
            foreign_key = Some(&ForeignKey {
                foreign_table: "audio_files",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::SetNull,
            })
        ),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_tracks_release", "release_id"),
        ("idx_tracks_audio_file", "audio_file_id"),
    ],
    unique_constraints: &[],
};

pub const CATALOG_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    // audio_files before tracks so the foreign key target exists
    tables: &[RELEASES_TABLE, AUDIO_FILES_TABLE, TRACKS_TABLE],
    migration: None,
}];
