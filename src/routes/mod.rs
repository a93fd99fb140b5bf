//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router serves the JSON API consumed by the front-end: portal
//! auth, the user directory, notes/test generation and test attempts. CORS,
//! gzip and request tracing are applied to every route.

pub mod attempts;
pub mod auth;
pub mod directory;
pub mod generate;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::method_not_allowed;
use crate::state::AppState;

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/generateNotes",
            post(generate::generate_notes).fallback(method_not_allowed),
        )
        .route(
            "/api/generateTest",
            post(generate::generate_test).fallback(method_not_allowed),
        )
        .route("/api/auth/login/{role}", post(auth::login))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/demo-credentials/{role}", get(auth::demo_credentials))
        .route("/api/auth/guard", get(auth::guard))
        .route("/api/students", get(directory::list_students))
        .route("/api/users/{id}", get(directory::get_user))
        .route("/api/users/{id}/classes", get(directory::user_classes))
        .route("/api/parents/{id}/children", get(directory::parent_children))
        .route("/api/classes", get(directory::list_classes))
        .route("/api/tests/attempts", post(attempts::create))
        .route("/api/tests/attempts/{id}", get(attempts::get).delete(attempts::delete))
        .route("/api/tests/attempts/{id}/answer", post(attempts::answer))
        .route("/api/tests/attempts/{id}/next", post(attempts::next))
        .route("/api/tests/attempts/{id}/previous", post(attempts::previous))
        .route("/api/tests/attempts/{id}/submit", post(attempts::submit))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
