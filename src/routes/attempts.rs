//! Test attempt routes under `/api/tests/attempts`.
//!
//! Attempts belong to the user that created them. Every lookup is scoped by
//! the session user, so someone else's attempt id answers 404.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiJson};
use crate::routes::auth::AuthUser;
use crate::routes::generate::generate_error;
use crate::services::generate::{self, Question};
use crate::services::quiz::{AttemptView, QuizError, TestAttempt};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateAttemptBody {
    pub questions: Option<Vec<Question>>,
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct AnswerBody {
    pub option: String,
}

pub(crate) fn quiz_error(err: &QuizError) -> ApiError {
    let status = match err {
        QuizError::Finished => StatusCode::CONFLICT,
        QuizError::NoQuestions
        | QuizError::MalformedQuestion { .. }
        | QuizError::InvalidOption
        | QuizError::NotAnswered => StatusCode::BAD_REQUEST,
    };
    ApiError::from_code(status, err)
}

fn attempt_not_found() -> ApiError {
    ApiError::not_found("Test attempt")
}

/// `POST /api/tests/attempts`: start an attempt from questions, or generate them from content.
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<CreateAttemptBody>,
) -> Result<(StatusCode, Json<AttemptView>), ApiError> {
    let questions = match (body.questions, body.content) {
        (Some(questions), _) => questions,
        (None, Some(content)) => generate::generate_test(&state, &auth.user.id, &content)
            .await
            .map_err(generate_error)?,
        (None, None) => return Err(ApiError::bad_request("questions or content is required")),
    };

    let attempt = TestAttempt::new(questions).map_err(|e| quiz_error(&e))?;
    let id = state.attempts.insert(&auth.user.id, attempt).await;
    tracing::info!(%id, user_id = %auth.user.id, "quiz: attempt started");

    let view = state
        .attempts
        .view(id, &auth.user.id)
        .await
        .ok_or_else(attempt_not_found)?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /api/tests/attempts/{id}`
pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AttemptView>, ApiError> {
    state
        .attempts
        .view(id, &auth.user.id)
        .await
        .map(Json)
        .ok_or_else(attempt_not_found)
}

/// Run a state transition and return the updated view.
async fn transition(
    state: &AppState,
    auth: &AuthUser,
    id: Uuid,
    f: impl FnOnce(&mut TestAttempt) -> Result<(), QuizError>,
) -> Result<Json<AttemptView>, ApiError> {
    let (outcome, view) = state
        .attempts
        .update(id, &auth.user.id, f)
        .await
        .ok_or_else(attempt_not_found)?;
    outcome.map_err(|e| quiz_error(&e))?;
    Ok(Json(view))
}

/// `POST /api/tests/attempts/{id}/answer`: `{option}`.
pub async fn answer(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<AnswerBody>,
) -> Result<Json<AttemptView>, ApiError> {
    transition(&state, &auth, id, |t| t.select_answer(&body.option)).await
}

/// `POST /api/tests/attempts/{id}/next`
pub async fn next(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AttemptView>, ApiError> {
    transition(&state, &auth, id, TestAttempt::next).await
}

/// `POST /api/tests/attempts/{id}/previous`
pub async fn previous(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AttemptView>, ApiError> {
    transition(&state, &auth, id, TestAttempt::previous).await
}

/// `POST /api/tests/attempts/{id}/submit`
pub async fn submit(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AttemptView>, ApiError> {
    let view = transition(&state, &auth, id, |t| {
        t.submit();
        Ok(())
    })
    .await?;
    tracing::info!(%id, user_id = %auth.user.id, score = ?view.score, total = view.total, "quiz: attempt finished");
    Ok(view)
}

/// `DELETE /api/tests/attempts/{id}`: discard an attempt (the "retake" reset).
pub async fn delete(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    if state.attempts.remove(id, &auth.user.id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(attempt_not_found())
    }
}

#[cfg(test)]
#[path = "attempts_test.rs"]
mod tests;
