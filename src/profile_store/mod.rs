mod sqlite_profile_store;

pub use sqlite_profile_store::SqliteProfileStore;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Artist profile, keyed by the identity provider's user id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArtistProfile {
    pub user_id: Uuid,
    pub biography: Option<String>,
    /// Opaque JSON-encoded string, stored as-is.
    pub social_links: Option<String>,
    /// Unix seconds, set once at creation.
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FanProfile {
    pub user_id: Uuid,
    pub subscription_active: bool,
    pub subscription_start_date: Option<DateTime<Utc>>,
    pub created_at: i64,
}

/// Storage for artist and fan profiles.
///
/// Creation is an upsert keyed by user id: posting a profile twice overwrites
/// the mutable fields in place and never touches `created_at`. The upsert is
/// a single atomic statement so concurrent upserts for the same user cannot
/// lose updates.
pub trait ProfileStore: Send + Sync {
    fn upsert_artist_profile(
        &self,
        user_id: Uuid,
        biography: Option<String>,
        social_links: Option<String>,
    ) -> Result<ArtistProfile>;

    fn get_artist_profile(&self, user_id: Uuid) -> Result<Option<ArtistProfile>>;

    /// Returns true if a row was deleted.
    fn delete_artist_profile(&self, user_id: Uuid) -> Result<bool>;

    fn upsert_fan_profile(
        &self,
        user_id: Uuid,
        subscription_active: bool,
        subscription_start_date: Option<DateTime<Utc>>,
    ) -> Result<FanProfile>;

    fn get_fan_profile(&self, user_id: Uuid) -> Result<Option<FanProfile>>;

    fn delete_fan_profile(&self, user_id: Uuid) -> Result<bool>;
}
