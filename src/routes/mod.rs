// Route modules
pub mod subscription;

use crate::{
    app_state::AppState,
    middleware::{jwt_auth_middleware, logging_middleware},
};
use axum::{middleware, routing::post, Router};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_v1_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// API v1 routes
fn api_v1_routes(state: AppState) -> Router<AppState> {
    // Identity is optional at the layer; the handler rejects anonymous callers
    let callable_routes = Router::new()
        .route(
            "/subscriptions/verify",
            post(subscription::verify_subscription),
        )
        .layer(middleware::from_fn_with_state(state, jwt_auth_middleware));

    Router::new()
        .merge(callable_routes)
        .layer(middleware::from_fn(logging_middleware))
}
