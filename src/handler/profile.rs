use axum::extract::State;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::{Extension, Router};
use tracing::instrument;
use validator::Validate;

use crate::AppState;
use crate::access::{Capabilities, LookupPolicy, writes};
use crate::dtos::{ProfileResponseDto, UpdateProfileDto};
use crate::error::{ErrorMessage, HttpError};
use crate::handler::classify_caller;
use crate::middleware::JWTAuthMiddleware;

pub fn profile_handler() -> Router<AppState> {
    Router::new().route("/me", get(get_me).put(update_me))
}

/// Classify strictly and create the profile on first sight.
#[instrument(skip_all, fields(user_id = %jwt.identity.id))]
pub async fn get_me(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let caller = classify_caller(&app_state, &jwt, LookupPolicy::Strict).await?;
    let profile = caller
        .profile
        .ok_or_else(|| HttpError::server_error(ErrorMessage::ServerError.to_string()))?;

    Ok(Json(ProfileResponseDto {
        profile,
        capabilities: caller.capabilities,
    }))
}

#[instrument(skip_all, fields(user_id = %jwt.identity.id))]
pub async fn update_me(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<UpdateProfileDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    // makes sure the row exists before updating it
    let caller = classify_caller(&app_state, &jwt, LookupPolicy::Strict).await?;

    let profile = writes::update_profile_names(
        &app_state.db_client,
        caller.identity.id,
        body.first_name.as_deref(),
        body.last_name.as_deref(),
    )
    .await?;

    Ok(Json(ProfileResponseDto {
        capabilities: Capabilities::from_profile(&profile),
        profile,
    }))
}
