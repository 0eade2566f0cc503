use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, put};
use axum::{Extension, Router};
use tracing::instrument;

use crate::AppState;
use crate::access::{LookupPolicy, pipeline, sequencer, writes};
use crate::dtos::{
    CreateLessonDto, LessonSongStatusDto, LessonsQueryParams, LessonsResponseDto, UpdateLessonDto,
    parse_uuid,
};
use crate::error::{ErrorMessage, HttpError};
use crate::handler::classify_caller;
use crate::middleware::JWTAuthMiddleware;

pub fn lessons_handler() -> Router<AppState> {
    Router::new()
        .route("/", get(get_lessons).post(create_lesson))
        .route(
            "/{lesson_id}",
            get(get_lesson).put(update_lesson).delete(delete_lesson),
        )
        .route(
            "/{lesson_id}/songs/{song_id}",
            put(set_lesson_song).delete(remove_lesson_song),
        )
}

#[instrument(skip_all, fields(user_id = %jwt.identity.id))]
pub async fn get_lessons(
    Query(params): Query<LessonsQueryParams>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let target = params.target()?;
    let options = params.list_options()?;

    let caller = classify_caller(&app_state, &jwt, LookupPolicy::DowngradeOnRead).await?;

    let lessons = pipeline::lessons_for_user(
        &app_state.db_client,
        caller.capabilities,
        caller.identity.id,
        target,
        &options,
    )
    .await?;

    Ok(Json(LessonsResponseDto { lessons }))
}

#[instrument(skip_all, fields(user_id = %jwt.identity.id))]
pub async fn create_lesson(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<CreateLessonDto>,
) -> Result<impl IntoResponse, HttpError> {
    let input = body.into_input()?;

    let caller = classify_caller(&app_state, &jwt, LookupPolicy::Strict).await?;

    let lesson = sequencer::create_lesson(
        &app_state.db_client,
        caller.capabilities,
        caller.identity.id,
        input,
    )
    .await?;

    Ok(Json(lesson))
}

#[instrument(skip_all, fields(user_id = %jwt.identity.id))]
pub async fn get_lesson(
    Path(lesson_id): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let lesson_id = parse_uuid(&lesson_id, ErrorMessage::InvalidLessonId)?;

    let caller = classify_caller(&app_state, &jwt, LookupPolicy::DowngradeOnRead).await?;

    let detail = pipeline::lesson_detail(
        &app_state.db_client,
        caller.capabilities,
        caller.identity.id,
        lesson_id,
    )
    .await?;

    Ok(Json(detail))
}

#[instrument(skip_all, fields(user_id = %jwt.identity.id))]
pub async fn update_lesson(
    Path(lesson_id): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<UpdateLessonDto>,
) -> Result<impl IntoResponse, HttpError> {
    let lesson_id = parse_uuid(&lesson_id, ErrorMessage::InvalidLessonId)?;
    let changes = body.into_changes()?;

    let caller = classify_caller(&app_state, &jwt, LookupPolicy::Strict).await?;

    let lesson = writes::update_lesson(
        &app_state.db_client,
        caller.capabilities,
        caller.identity.id,
        lesson_id,
        changes,
    )
    .await?;

    Ok(Json(lesson))
}

#[instrument(skip_all, fields(user_id = %jwt.identity.id))]
pub async fn delete_lesson(
    Path(lesson_id): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let lesson_id = parse_uuid(&lesson_id, ErrorMessage::InvalidLessonId)?;

    let caller = classify_caller(&app_state, &jwt, LookupPolicy::Strict).await?;

    writes::delete_lesson(
        &app_state.db_client,
        caller.capabilities,
        caller.identity.id,
        lesson_id,
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip_all, fields(user_id = %jwt.identity.id))]
pub async fn set_lesson_song(
    Path((lesson_id, song_id)): Path<(String, String)>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<LessonSongStatusDto>,
) -> Result<impl IntoResponse, HttpError> {
    let lesson_id = parse_uuid(&lesson_id, ErrorMessage::InvalidLessonId)?;
    let song_id = parse_uuid(&song_id, ErrorMessage::InvalidSongId)?;

    let caller = classify_caller(&app_state, &jwt, LookupPolicy::Strict).await?;

    let row = writes::set_song_status(
        &app_state.db_client,
        caller.capabilities,
        caller.identity.id,
        lesson_id,
        song_id,
        body.status,
    )
    .await?;

    Ok(Json(row))
}

#[instrument(skip_all, fields(user_id = %jwt.identity.id))]
pub async fn remove_lesson_song(
    Path((lesson_id, song_id)): Path<(String, String)>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let lesson_id = parse_uuid(&lesson_id, ErrorMessage::InvalidLessonId)?;
    let song_id = parse_uuid(&song_id, ErrorMessage::InvalidSongId)?;

    let caller = classify_caller(&app_state, &jwt, LookupPolicy::Strict).await?;

    writes::remove_song_from_lesson(
        &app_state.db_client,
        caller.capabilities,
        caller.identity.id,
        lesson_id,
        song_id,
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
