//! Generation routes: `POST /api/generateNotes` and `POST /api/generateTest`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiJson};
use crate::routes::auth::AuthUser;
use crate::services::generate::{self, GenerateError, Question};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ContentBody {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct NotesResponse {
    pub notes: String,
}

#[derive(Debug, Serialize)]
pub struct TestResponse {
    pub questions: Vec<Question>,
}

pub(crate) fn generate_error(err: GenerateError) -> ApiError {
    let status = match &err {
        GenerateError::EmptyContent => StatusCode::BAD_REQUEST,
        GenerateError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        GenerateError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        GenerateError::NoNotes | GenerateError::UnparseableTest { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        GenerateError::Llm(e) => {
            tracing::error!(error = %e, "generate: upstream call failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let api = ApiError::from_code(status, &err);
    match err {
        GenerateError::UnparseableTest { raw } => api.with_raw(raw),
        _ => api,
    }
}

/// `POST /api/generateNotes`: `{content}` → `{notes}`.
pub async fn generate_notes(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<ContentBody>,
) -> Result<Json<NotesResponse>, ApiError> {
    let notes = generate::generate_notes(&state, &auth.user.id, &body.content)
        .await
        .map_err(generate_error)?;
    Ok(Json(NotesResponse { notes }))
}

/// `POST /api/generateTest`: `{content}` → `{questions}`.
pub async fn generate_test(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<ContentBody>,
) -> Result<Json<TestResponse>, ApiError> {
    let questions = generate::generate_test(&state, &auth.user.id, &body.content)
        .await
        .map_err(generate_error)?;
    Ok(Json(TestResponse { questions }))
}

#[cfg(test)]
#[path = "generate_test.rs"]
mod tests;
