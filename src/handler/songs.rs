use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::{Extension, Router};
use tracing::instrument;
use validator::Validate;

use crate::AppState;
use crate::access::{LookupPolicy, pipeline, writes};
use crate::dtos::{CreateSongDto, SongsPaginationResponseDto, SongsQueryParams, UpdateSongDto, parse_uuid};
use crate::error::{ErrorMessage, HttpError};
use crate::handler::classify_caller;
use crate::middleware::JWTAuthMiddleware;

pub fn songs_handler() -> Router<AppState> {
    Router::new()
        .route("/", get(get_songs).post(create_song))
        .route("/filters", get(get_song_filters))
        .route(
            "/{song_id}",
            get(get_song).put(update_song).delete(delete_song),
        )
}

#[instrument(skip_all, fields(user_id = %jwt.identity.id))]
pub async fn get_songs(
    Query(params): Query<SongsQueryParams>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;
    let target = params.target()?;
    let query = params.song_query()?;

    let caller = classify_caller(&app_state, &jwt, LookupPolicy::DowngradeOnRead).await?;

    let page = pipeline::songs_for_user(
        &app_state.db_client,
        caller.capabilities,
        caller.identity.id,
        target,
        &query,
    )
    .await?;

    Ok(Json(SongsPaginationResponseDto::new(page, &query)))
}

#[instrument(skip_all, fields(user_id = %jwt.identity.id))]
pub async fn get_song_filters(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let caller = classify_caller(&app_state, &jwt, LookupPolicy::DowngradeOnRead).await?;

    let options =
        pipeline::song_filter_options(&app_state.db_client, caller.capabilities, caller.identity.id)
            .await?;

    Ok(Json(options))
}

#[instrument(skip_all, fields(user_id = %jwt.identity.id))]
pub async fn get_song(
    Path(song_id): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let song_id = parse_uuid(&song_id, ErrorMessage::InvalidSongId)?;

    let caller = classify_caller(&app_state, &jwt, LookupPolicy::DowngradeOnRead).await?;

    let song = pipeline::visible_song(
        &app_state.db_client,
        caller.capabilities,
        caller.identity.id,
        song_id,
    )
    .await?;

    Ok(Json(song))
}

#[instrument(skip_all, fields(user_id = %jwt.identity.id))]
pub async fn create_song(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<CreateSongDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let caller = classify_caller(&app_state, &jwt, LookupPolicy::Strict).await?;

    let song = writes::create_song(&app_state.db_client, caller.capabilities, body.into()).await?;

    Ok((StatusCode::CREATED, Json(song)))
}

#[instrument(skip_all, fields(user_id = %jwt.identity.id))]
pub async fn update_song(
    Path(song_id): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<UpdateSongDto>,
) -> Result<impl IntoResponse, HttpError> {
    let song_id = parse_uuid(&song_id, ErrorMessage::InvalidSongId)?;
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let caller = classify_caller(&app_state, &jwt, LookupPolicy::Strict).await?;

    let song =
        writes::update_song(&app_state.db_client, caller.capabilities, song_id, body.into()).await?;

    Ok(Json(song))
}

#[instrument(skip_all, fields(user_id = %jwt.identity.id))]
pub async fn delete_song(
    Path(song_id): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let song_id = parse_uuid(&song_id, ErrorMessage::InvalidSongId)?;

    let caller = classify_caller(&app_state, &jwt, LookupPolicy::Strict).await?;

    writes::delete_song(&app_state.db_client, caller.capabilities, song_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
