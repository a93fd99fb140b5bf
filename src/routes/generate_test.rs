use std::sync::Arc;

use super::*;
use crate::llm::types::LlmError;
use crate::rate_limit::RateLimitError;
use crate::state::test_helpers::{self, MockLlm};

async fn student(state: &AppState) -> AuthUser {
    AuthUser { user: test_helpers::seeded_user(state, "student-1").await, token: String::new() }
}

fn content(text: &str) -> ApiJson<ContentBody> {
    ApiJson(ContentBody { content: text.into() })
}

#[test]
fn content_defaults_to_empty() {
    let body: ContentBody = serde_json::from_str("{}").unwrap();
    assert!(body.content.is_empty());
}

#[test]
fn error_statuses() {
    assert_eq!(generate_error(GenerateError::EmptyContent).status, StatusCode::BAD_REQUEST);
    assert_eq!(generate_error(GenerateError::NotConfigured).status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(generate_error(GenerateError::NoNotes).status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        generate_error(GenerateError::Llm(LlmError::ApiRequest("timeout".into()))).status,
        StatusCode::INTERNAL_SERVER_ERROR
    );
    let limited = RateLimitError::PerUserExceeded { limit: 1, window_secs: 60 };
    assert_eq!(generate_error(GenerateError::RateLimited(limited)).status, StatusCode::TOO_MANY_REQUESTS);
}

#[test]
fn unparseable_error_carries_raw() {
    let err = generate_error(GenerateError::UnparseableTest { raw: "oops".into() });
    let json = serde_json::to_value(&err.body).unwrap();
    assert_eq!(json["message"], "Failed to parse model response");
    assert_eq!(json["raw"], "oops");
}

#[tokio::test]
async fn notes_ok() {
    let state = test_helpers::test_app_state_with_llm(Arc::new(MockLlm::text("## Cells")));
    let Json(resp) = generate_notes(State(state.clone()), student(&state).await, content("Biology"))
        .await
        .unwrap();
    assert_eq!(resp.notes, "## Cells");
}

#[tokio::test]
async fn notes_no_text_is_500_with_message() {
    let state = test_helpers::test_app_state_with_llm(Arc::new(MockLlm::text("")));
    let err = generate_notes(State(state.clone()), student(&state).await, content("Biology"))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.body.message, "No notes generated");
}

#[tokio::test]
async fn blank_content_is_400() {
    let state = test_helpers::test_app_state_with_llm(Arc::new(MockLlm::text("x")));
    let err = generate_test(State(state.clone()), student(&state).await, content(""))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn no_llm_is_503() {
    let state = test_helpers::test_app_state();
    let err = generate_notes(State(state.clone()), student(&state).await, content("x"))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_ok() {
    let reply = r#"{"questions":[{"question":"q","options":["a","b","c","d"],"correctAnswer":"b"}]}"#;
    let state = test_helpers::test_app_state_with_llm(Arc::new(MockLlm::text(reply)));
    let Json(resp) = generate_test(State(state.clone()), student(&state).await, content("x"))
        .await
        .unwrap();
    assert_eq!(resp.questions.len(), 1);
    assert_eq!(resp.questions[0].correct_answer, "b");
}

#[tokio::test]
async fn test_garbage_is_500_with_raw() {
    let state = test_helpers::test_app_state_with_llm(Arc::new(MockLlm::text("I cannot do that")));
    let err = generate_test(State(state.clone()), student(&state).await, content("x"))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.body.raw.as_deref(), Some("I cannot do that"));
}
