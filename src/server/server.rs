use anyhow::Result;
use std::time::{Duration, Instant};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::error::ApiError;
use super::guard::ensure_owner;
use super::session::{Session, TokenVerifier};
use super::state::*;
use super::{log_requests, ServerConfig};
use crate::catalog_store::{NewAudioFile, NewRelease, NewTrack, Release, ReleaseChanges, TrackChanges};
use crate::identity::SignUpOutcome;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
    };
    Json(stats)
}

fn require_non_blank(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        Err(ApiError::Validation(format!("{} must not be blank", field)))
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RegisterBody {
    pub email: String,
    pub password: String,
    pub user_type: String,
    pub bio: Option<String>,
}

#[derive(Deserialize, Debug)]
struct LoginBody {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthSuccessResponse {
    user_id: Uuid,
    token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_type: Option<String>,
}

async fn register(
    State(state): State<ServerState>,
    Json(body): Json<RegisterBody>,
) -> Result<Response, ApiError> {
    require_non_blank(&body.email, "email")?;
    require_non_blank(&body.password, "password")?;
    let user_type = body.user_type.to_lowercase();
    if user_type != "artist" && user_type != "fan" {
        return Err(ApiError::Validation(
            "userType must be either 'artist' or 'fan'".to_string(),
        ));
    }

    let outcome = state.identity.sign_up(&body.email, &body.password).await?;
    let (user_id, token) = match outcome {
        SignUpOutcome::Registered { user_id, token } => (user_id, Some(token)),
        SignUpOutcome::ConfirmationPending { user_id } => (user_id, None),
    };

    if user_type == "artist" {
        state
            .profile_store
            .upsert_artist_profile(user_id, body.bio, None)?;
    } else {
        state.profile_store.upsert_fan_profile(user_id, false, None)?;
    }
    info!("Registered {} {}", user_type, user_id);

    let response = match token {
        Some(token) => (
            StatusCode::CREATED,
            Json(json!({
                "userId": user_id,
                "token": token,
                "userType": user_type,
            })),
        ),
        None => (
            StatusCode::ACCEPTED,
            Json(json!({
                "userId": user_id,
                "userType": user_type,
                "message": "Confirmation required before signing in",
            })),
        ),
    };
    Ok(response.into_response())
}

async fn login(
    State(state): State<ServerState>,
    Json(body): Json<LoginBody>,
) -> Result<Json<AuthSuccessResponse>, ApiError> {
    require_non_blank(&body.email, "email")?;
    require_non_blank(&body.password, "password")?;

    let session = state.identity.sign_in(&body.email, &body.password).await?;

    let user_type = if state
        .profile_store
        .get_artist_profile(session.user_id)?
        .is_some()
    {
        Some("artist".to_string())
    } else if state
        .profile_store
        .get_fan_profile(session.user_id)?
        .is_some()
    {
        Some("fan".to_string())
    } else {
        None
    };

    Ok(Json(AuthSuccessResponse {
        user_id: session.user_id,
        token: session.token,
        user_type,
    }))
}

async fn logout(
    session: Session,
    State(identity): State<GuardedIdentityProvider>,
) -> Result<Response, ApiError> {
    identity.sign_out(&session.token).await?;
    Ok(Json(json!({ "message": "Logged out" })).into_response())
}

async fn delete_user(
    session: Session,
    State(state): State<ServerState>,
    Path(user_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    ensure_owner(&session, user_id)?;

    state.profile_store.delete_artist_profile(user_id)?;
    state.profile_store.delete_fan_profile(user_id)?;
    state.identity.delete_user(user_id).await?;
    info!("Deleted user {}", user_id);
    Ok(Json(json!({ "message": "User deleted" })).into_response())
}

// ---------------------------------------------------------------------------
// Profiles (always the caller's own)
// ---------------------------------------------------------------------------

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct ArtistProfileBody {
    pub biography: Option<String>,
    pub social_links: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct FanProfileBody {
    pub subscription_active: bool,
    pub subscription_start_date: Option<DateTime<Utc>>,
}

async fn post_artist_profile(
    session: Session,
    State(profile_store): State<GuardedProfileStore>,
    Json(body): Json<ArtistProfileBody>,
) -> Result<Response, ApiError> {
    let profile =
        profile_store.upsert_artist_profile(session.user_id, body.biography, body.social_links)?;
    Ok(Json(profile).into_response())
}

async fn get_artist_profile(
    session: Session,
    State(profile_store): State<GuardedProfileStore>,
) -> Result<Response, ApiError> {
    match profile_store.get_artist_profile(session.user_id)? {
        Some(profile) => Ok(Json(profile).into_response()),
        None => Err(ApiError::NotFound("Artist profile not found".to_string())),
    }
}

async fn delete_artist_profile(
    session: Session,
    State(profile_store): State<GuardedProfileStore>,
) -> Result<StatusCode, ApiError> {
    if profile_store.delete_artist_profile(session.user_id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Artist profile not found".to_string()))
    }
}

async fn post_fan_profile(
    session: Session,
    State(profile_store): State<GuardedProfileStore>,
    Json(body): Json<FanProfileBody>,
) -> Result<Response, ApiError> {
    let profile = profile_store.upsert_fan_profile(
        session.user_id,
        body.subscription_active,
        body.subscription_start_date,
    )?;
    Ok(Json(profile).into_response())
}

async fn get_fan_profile(
    session: Session,
    State(profile_store): State<GuardedProfileStore>,
) -> Result<Response, ApiError> {
    match profile_store.get_fan_profile(session.user_id)? {
        Some(profile) => Ok(Json(profile).into_response()),
        None => Err(ApiError::NotFound("Fan profile not found".to_string())),
    }
}

async fn delete_fan_profile(
    session: Session,
    State(profile_store): State<GuardedProfileStore>,
) -> Result<StatusCode, ApiError> {
    if profile_store.delete_fan_profile(session.user_id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Fan profile not found".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Releases
// ---------------------------------------------------------------------------

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct CreateReleaseBody {
    pub title: String,
    pub release_date: NaiveDate,
    pub upc: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct UpdateReleaseBody {
    pub title: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub upc: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct PageQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

/// The release must exist (404) and belong to the caller (403), in that order.
fn find_owned_release(
    catalog_store: &GuardedCatalogStore,
    session: &Session,
    release_id: i64,
) -> Result<Release, ApiError> {
    let release = catalog_store
        .get_release(release_id)?
        .ok_or_else(|| ApiError::NotFound("Release not found".to_string()))?;
    ensure_owner(session, release.artist_id)?;
    Ok(release)
}

async fn post_release(
    session: Session,
    State(state): State<ServerState>,
    Json(body): Json<CreateReleaseBody>,
) -> Result<Response, ApiError> {
    require_non_blank(&body.title, "title")?;
    // artist_id references the profile db, so the check lives here
    if state
        .profile_store
        .get_artist_profile(session.user_id)?
        .is_none()
    {
        return Err(ApiError::NotFound("Artist profile not found".to_string()));
    }

    let release = state.catalog_store.create_release(NewRelease {
        artist_id: session.user_id,
        title: body.title,
        release_date: body.release_date,
        upc: body.upc,
    })?;
    Ok((StatusCode::CREATED, Json(release)).into_response())
}

async fn get_release(
    _session: Session,
    State(catalog_store): State<GuardedCatalogStore>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let detail = catalog_store
        .get_release_with_tracks(id)?
        .ok_or_else(|| ApiError::NotFound("Release not found".to_string()))?;
    Ok(Json(detail).into_response())
}

async fn list_own_releases(
    session: Session,
    State(catalog_store): State<GuardedCatalogStore>,
) -> Result<Response, ApiError> {
    let releases = catalog_store.list_releases_by_artist(session.user_id)?;
    Ok(Json(releases).into_response())
}

async fn put_release(
    session: Session,
    State(catalog_store): State<GuardedCatalogStore>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateReleaseBody>,
) -> Result<Response, ApiError> {
    if let Some(title) = &body.title {
        require_non_blank(title, "title")?;
    }
    find_owned_release(&catalog_store, &session, id)?;

    let updated = catalog_store
        .update_release(
            id,
            ReleaseChanges {
                title: body.title,
                release_date: body.release_date,
                upc: body.upc,
            },
        )?
        .ok_or_else(|| ApiError::NotFound("Release not found".to_string()))?;
    Ok(Json(updated).into_response())
}

async fn delete_release(
    session: Session,
    State(catalog_store): State<GuardedCatalogStore>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    find_owned_release(&catalog_store, &session, id)?;
    catalog_store.delete_release(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_public_releases(
    State(state): State<ServerState>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let page = query.page.unwrap_or(0);
    let size = query.size.unwrap_or(state.config.default_page_size);
    if size == 0 || size > state.config.max_page_size {
        return Err(ApiError::Validation(format!(
            "size must be between 1 and {}",
            state.config.max_page_size
        )));
    }

    let releases = state.catalog_store.list_public_releases(page, size)?;
    Ok(Json(releases).into_response())
}

async fn get_public_release(
    State(catalog_store): State<GuardedCatalogStore>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let detail = catalog_store
        .get_release_with_tracks(id)?
        .ok_or_else(|| ApiError::NotFound("Release not found".to_string()))?;
    Ok(Json(detail).into_response())
}

async fn list_releases_by_artist(
    State(catalog_store): State<GuardedCatalogStore>,
    Path(artist_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let releases = catalog_store.list_releases_by_artist(artist_id)?;
    Ok(Json(releases).into_response())
}

// ---------------------------------------------------------------------------
// Tracks
// ---------------------------------------------------------------------------

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct CreateTrackBody {
    pub release_id: Option<i64>,
    pub title: String,
    pub duration: i64,
    pub isrc: Option<String>,
    pub file_path: String,
    pub file_size: Option<i64>,
    pub audio_file_id: Option<i64>,
}

/// Clients may pass the release and audio-file references as query
/// parameters instead of body fields; query wins when both are present.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct TrackRefsQuery {
    pub release_id: Option<i64>,
    pub audio_file_id: Option<i64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct UpdateTrackBody {
    pub title: Option<String>,
    pub duration: Option<i64>,
    pub isrc: Option<String>,
    pub file_path: Option<String>,
    pub file_size: Option<i64>,
    pub audio_file_id: Option<i64>,
}

fn validate_duration(duration: i64) -> Result<(), ApiError> {
    if duration <= 0 {
        Err(ApiError::Validation(
            "duration must be greater than zero".to_string(),
        ))
    } else {
        Ok(())
    }
}

fn validate_audio_file_reference(
    catalog_store: &GuardedCatalogStore,
    audio_file_id: Option<i64>,
) -> Result<(), ApiError> {
    if let Some(id) = audio_file_id {
        if catalog_store.get_audio_file(id)?.is_none() {
            return Err(ApiError::NotFound(format!("Audio file {} not found", id)));
        }
    }
    Ok(())
}

fn create_track_for(
    session: &Session,
    catalog_store: &GuardedCatalogStore,
    release_id: i64,
    audio_file_id: Option<i64>,
    body: CreateTrackBody,
) -> Result<Response, ApiError> {
    require_non_blank(&body.title, "title")?;
    require_non_blank(&body.file_path, "filePath")?;
    validate_duration(body.duration)?;

    find_owned_release(catalog_store, session, release_id)?;
    validate_audio_file_reference(catalog_store, audio_file_id)?;

    let track = catalog_store.create_track(NewTrack {
        release_id,
        title: body.title,
        duration: body.duration,
        isrc: body.isrc,
        file_path: body.file_path,
        file_size: body.file_size,
        audio_file_id,
    })?;
    Ok((StatusCode::CREATED, Json(track)).into_response())
}

async fn post_track(
    session: Session,
    State(catalog_store): State<GuardedCatalogStore>,
    Query(refs): Query<TrackRefsQuery>,
    Json(body): Json<CreateTrackBody>,
) -> Result<Response, ApiError> {
    let release_id = refs
        .release_id
        .or(body.release_id)
        .ok_or_else(|| ApiError::Validation("releaseId must be supplied".to_string()))?;
    let audio_file_id = refs.audio_file_id.or(body.audio_file_id);
    create_track_for(&session, &catalog_store, release_id, audio_file_id, body)
}

async fn post_release_track(
    session: Session,
    State(catalog_store): State<GuardedCatalogStore>,
    Path(release_id): Path<i64>,
    Json(body): Json<CreateTrackBody>,
) -> Result<Response, ApiError> {
    let audio_file_id = body.audio_file_id;
    create_track_for(&session, &catalog_store, release_id, audio_file_id, body)
}

async fn list_all_tracks(
    _session: Session,
    State(catalog_store): State<GuardedCatalogStore>,
) -> Result<Response, ApiError> {
    let tracks = catalog_store.list_tracks()?;
    Ok(Json(tracks).into_response())
}

async fn get_track(
    _session: Session,
    State(catalog_store): State<GuardedCatalogStore>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let track = catalog_store
        .get_track(id)?
        .ok_or_else(|| ApiError::NotFound("Track not found".to_string()))?;
    Ok(Json(track).into_response())
}

async fn put_track(
    session: Session,
    State(catalog_store): State<GuardedCatalogStore>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateTrackBody>,
) -> Result<Response, ApiError> {
    if let Some(title) = &body.title {
        require_non_blank(title, "title")?;
    }
    if let Some(file_path) = &body.file_path {
        require_non_blank(file_path, "filePath")?;
    }
    if let Some(duration) = body.duration {
        validate_duration(duration)?;
    }

    let track = catalog_store
        .get_track(id)?
        .ok_or_else(|| ApiError::NotFound("Track not found".to_string()))?;
    find_owned_release(&catalog_store, &session, track.release_id)?;
    validate_audio_file_reference(&catalog_store, body.audio_file_id)?;

    let updated = catalog_store
        .update_track(
            id,
            TrackChanges {
                title: body.title,
                duration: body.duration,
                isrc: body.isrc,
                file_path: body.file_path,
                file_size: body.file_size,
                audio_file_id: body.audio_file_id,
            },
        )?
        .ok_or_else(|| ApiError::NotFound("Track not found".to_string()))?;
    Ok(Json(updated).into_response())
}

async fn delete_track(
    session: Session,
    State(catalog_store): State<GuardedCatalogStore>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let track = catalog_store
        .get_track(id)?
        .ok_or_else(|| ApiError::NotFound("Track not found".to_string()))?;
    find_owned_release(&catalog_store, &session, track.release_id)?;
    catalog_store.delete_track(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_tracks_by_release(
    _session: Session,
    State(catalog_store): State<GuardedCatalogStore>,
    Path(release_id): Path<i64>,
) -> Result<Response, ApiError> {
    if catalog_store.get_release(release_id)?.is_none() {
        return Err(ApiError::NotFound("Release not found".to_string()));
    }
    let tracks = catalog_store.list_tracks_by_release(release_id)?;
    Ok(Json(tracks).into_response())
}

// ---------------------------------------------------------------------------
// Audio files
// ---------------------------------------------------------------------------

const DEFAULT_AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct UploadUrlQuery {
    pub file_name: String,
    pub content_type: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RegisterAudioFileBody {
    pub file_key: String,
    pub file_size: Option<i64>,
    pub checksum: Option<String>,
}

async fn get_upload_url(
    _session: Session,
    State(url_issuer): State<GuardedUrlIssuer>,
    Query(query): Query<UploadUrlQuery>,
) -> Result<Response, ApiError> {
    require_non_blank(&query.file_name, "fileName")?;
    let content_type = query
        .content_type
        .filter(|ct| !ct.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_AUDIO_CONTENT_TYPE.to_string());

    let grant = url_issuer
        .issue_upload_url(&query.file_name, &content_type)
        .await?;
    Ok(Json(grant).into_response())
}

async fn post_register_audio_file(
    _session: Session,
    State(state): State<ServerState>,
    Json(body): Json<RegisterAudioFileBody>,
) -> Result<Response, ApiError> {
    require_non_blank(&body.file_key, "fileKey")?;

    // The stored URL is a snapshot; playback always derives a fresh one.
    let file_url = state.url_issuer.issue_download_url(&body.file_key).await?;
    let audio_file = state.catalog_store.register_audio_file(NewAudioFile {
        file_identifier: body.file_key,
        file_url,
        file_size: body.file_size,
        checksum: body.checksum,
    })?;
    Ok((StatusCode::CREATED, Json(audio_file)).into_response())
}

async fn get_stream_url(
    _session: Session,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let audio_file = state
        .catalog_store
        .get_audio_file(id)?
        .ok_or_else(|| ApiError::NotFound("Audio file not found".to_string()))?;

    let streaming_url = state
        .url_issuer
        .issue_download_url(&audio_file.file_identifier)
        .await?;
    Ok(Json(json!({ "streamingUrl": streaming_url })).into_response())
}

// ---------------------------------------------------------------------------
// Router assembly
// ---------------------------------------------------------------------------

pub fn make_app(
    config: ServerConfig,
    profile_store: GuardedProfileStore,
    catalog_store: GuardedCatalogStore,
    identity: GuardedIdentityProvider,
    url_issuer: GuardedUrlIssuer,
    token_verifier: TokenVerifier,
) -> Result<Router> {
    let state = ServerState {
        config: config.clone(),
        start_time: Instant::now(),
        profile_store,
        catalog_store,
        identity,
        url_issuer,
        token_verifier,
    };

    let auth_routes: Router = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/user/{user_id}", delete(delete_user))
        .with_state(state.clone());

    let artist_profile_routes: Router = Router::new()
        .route("/", post(post_artist_profile))
        .route("/", get(get_artist_profile))
        .route("/", delete(delete_artist_profile))
        .with_state(state.clone());

    let fan_profile_routes: Router = Router::new()
        .route("/", post(post_fan_profile))
        .route("/", get(get_fan_profile))
        .route("/", delete(delete_fan_profile))
        .with_state(state.clone());

    let release_routes: Router = Router::new()
        .route("/", post(post_release))
        .route("/", get(list_own_releases))
        .route("/public", get(list_public_releases))
        .route("/public/{id}", get(get_public_release))
        .route("/artist/{artist_id}", get(list_releases_by_artist))
        .route("/{id}/tracks", post(post_release_track))
        .route("/{id}", get(get_release))
        .route("/{id}", put(put_release))
        .route("/{id}", delete(delete_release))
        .with_state(state.clone());

    let track_routes: Router = Router::new()
        .route("/", post(post_track))
        .route("/", get(list_all_tracks))
        .route("/release/{release_id}", get(list_tracks_by_release))
        .route("/{id}", get(get_track))
        .route("/{id}", put(put_track))
        .route("/{id}", delete(delete_track))
        .with_state(state.clone());

    let audio_file_routes: Router = Router::new()
        .route("/upload", get(get_upload_url))
        .route("/register", post(post_register_audio_file))
        .route("/{id}/stream", get(get_stream_url))
        .with_state(state.clone());

    let mut app: Router = Router::new()
        .route("/", get(home))
        .with_state(state.clone())
        .nest("/api/auth", auth_routes)
        .nest("/api/artist-profiles", artist_profile_routes)
        .nest("/api/fan-profiles", fan_profile_routes)
        .nest("/api/releases", release_routes)
        .nest("/api/tracks", track_routes)
        .nest("/api/audio-files", audio_file_routes);

    app = app.layer(middleware::from_fn_with_state(state, log_requests));

    Ok(app)
}

pub async fn run_server(
    config: ServerConfig,
    profile_store: GuardedProfileStore,
    catalog_store: GuardedCatalogStore,
    identity: GuardedIdentityProvider,
    url_issuer: GuardedUrlIssuer,
    token_verifier: TokenVerifier,
) -> Result<()> {
    let port = config.port;
    let app = make_app(
        config,
        profile_store,
        catalog_store,
        identity,
        url_issuer,
        token_verifier,
    )?;

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Listening on port {}", port);

    Ok(axum::serve(listener, app).await?)
}
