pub mod lessons;
pub mod profile;
pub mod songs;

use crate::{
    AppState,
    access::{Classification, LookupPolicy, roles::classify},
    error::HttpError,
    middleware::JWTAuthMiddleware,
};

/// Resolve the caller's capabilities. Handlers call this only after their
/// input has been validated.
pub async fn classify_caller(
    app_state: &AppState,
    jwt: &JWTAuthMiddleware,
    policy: LookupPolicy,
) -> Result<Classification, HttpError> {
    Ok(classify(&app_state.db_client, Some(&jwt.identity), policy).await?)
}
