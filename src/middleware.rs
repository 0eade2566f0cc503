use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::IntoResponse,
};

use axum_extra::extract::cookie::CookieJar;

use crate::{
    AppState,
    access::Identity,
    error::{ErrorMessage, HttpError},
    utils::token,
};

/// Request extension holding the verified caller identity.
///
/// Only the token is checked here. Profiles and capabilities are resolved by
/// handlers after input validation, so malformed requests never reach the
/// store.
///
/// ```ignore
/// async fn my_handler(Extension(auth): Extension<JWTAuthMiddleware>) {
///     // auth.identity.id
/// }
/// ```
#[derive(Debug, Clone)]
pub struct JWTAuthMiddleware {
    pub identity: Identity,
}

/// Extract and verify the identity token.
///
/// Token sources, in order:
/// - the `access_token` cookie (browser clients)
/// - `Authorization: Bearer <token>` (API clients)
///
/// Returns 401 when no token is present or it does not verify.
pub async fn auth(
    cookie_jar: CookieJar,
    State(app_state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let token = cookie_jar
        .get("access_token")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|auth_header| auth_header.to_str().ok())
                .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
                .map(str::to_owned)
        })
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_string()))?;

    let identity = token::decode_token(token, app_state.env.jwt_secret.as_bytes())?;

    req.extensions_mut().insert(JWTAuthMiddleware { identity });

    Ok(next.run(req).await)
}
