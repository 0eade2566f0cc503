use axum::{Router, middleware};
use tower_http::trace::TraceLayer;

use crate::{
    AppState,
    handler::{lessons::lessons_handler, profile::profile_handler, songs::songs_handler},
    middleware::auth,
};

pub fn create_router(app_state: AppState) -> Router {
    let api_route = Router::new()
        .nest("/songs", songs_handler())
        .nest("/lessons", lessons_handler())
        .nest("/profile", profile_handler())
        // every route needs a verified identity
        .layer(middleware::from_fn_with_state(app_state.clone(), auth))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    Router::new().nest("/api", api_route)
}
