use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::auth_layer::user_auth_middleware;
use crate::service::Repositories;
use crate::{fitness_routes, reminder_routes, social_routes, user_routes};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// The full HTTP surface. Everything except health and signup needs a caller identity.
pub fn app<S: Repositories>(state: Arc<S>) -> Router {
    let authenticated = Router::new()
        .nest("/social", social_routes::router::<S>())
        .merge(user_routes::router::<S>())
        .merge(fitness_routes::router::<S>())
        .merge(reminder_routes::router::<S>())
        .route_layer(from_fn_with_state(state.clone(), user_auth_middleware::<S>));

    Router::new()
        .route("/health", get(health))
        .route("/users/signup", post(user_routes::register_user::<S>))
        .merge(authenticated)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
