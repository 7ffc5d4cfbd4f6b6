use axum::routing::any;
use axum::Router;
use tower_http::trace::TraceLayer;

use super::handlers::get_value;
use super::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", any(get_value))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
