use std::sync::Arc;

use super::*;
use crate::services::quiz::Phase;
use crate::state::test_helpers::{self, MockLlm};

async fn auth_as(state: &AppState, id: &str) -> AuthUser {
    AuthUser { user: test_helpers::seeded_user(state, id).await, token: String::new() }
}

fn questions() -> Vec<Question> {
    vec![
        Question { question: "1 + 1?".into(), options: vec!["1".into(), "2".into()], correct_answer: "2".into() },
        Question { question: "2 + 2?".into(), options: vec!["4".into(), "5".into()], correct_answer: "4".into() },
    ]
}

async fn start(state: &AppState, user: &str) -> Uuid {
    let body = CreateAttemptBody { questions: Some(questions()), content: None };
    let (status, Json(view)) = create(State(state.clone()), auth_as(state, user).await, ApiJson(body))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    view.id
}

fn answer_body(option: &str) -> ApiJson<AnswerBody> {
    ApiJson(AnswerBody { option: option.into() })
}

#[tokio::test]
async fn full_walkthrough() {
    let state = test_helpers::test_app_state();
    let id = start(&state, "student-1").await;

    let Json(view) = answer(State(state.clone()), auth_as(&state, "student-1").await, Path(id), answer_body("2"))
        .await
        .unwrap();
    assert_eq!(view.question.as_ref().unwrap().selected_answer.as_deref(), Some("2"));

    let Json(view) = next(State(state.clone()), auth_as(&state, "student-1").await, Path(id))
        .await
        .unwrap();
    assert_eq!(view.current_index, 1);
    assert_eq!(view.progress_percent, 50);

    answer(State(state.clone()), auth_as(&state, "student-1").await, Path(id), answer_body("5"))
        .await
        .unwrap();
    let Json(view) = next(State(state.clone()), auth_as(&state, "student-1").await, Path(id))
        .await
        .unwrap();
    assert_eq!(view.phase, Phase::Finished);
    assert_eq!(view.score, Some(1));
    assert_eq!(view.results.unwrap().len(), 2);
}

#[tokio::test]
async fn next_without_answer_is_400() {
    let state = test_helpers::test_app_state();
    let id = start(&state, "student-1").await;
    let err = next(State(state.clone()), auth_as(&state, "student-1").await, Path(id))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    assert_eq!(err.body.code, "E_NOT_ANSWERED");
}

#[tokio::test]
async fn invalid_option_is_400() {
    let state = test_helpers::test_app_state();
    let id = start(&state, "student-1").await;
    let err = answer(State(state.clone()), auth_as(&state, "student-1").await, Path(id), answer_body("3"))
        .await
        .unwrap_err();
    assert_eq!(err.body.code, "E_INVALID_OPTION");
}

#[tokio::test]
async fn previous_at_start_is_noop() {
    let state = test_helpers::test_app_state();
    let id = start(&state, "student-1").await;
    let Json(view) = previous(State(state.clone()), auth_as(&state, "student-1").await, Path(id))
        .await
        .unwrap();
    assert_eq!(view.current_index, 0);
}

#[tokio::test]
async fn submit_early_then_answer_is_409() {
    let state = test_helpers::test_app_state();
    let id = start(&state, "student-1").await;
    let Json(view) = submit(State(state.clone()), auth_as(&state, "student-1").await, Path(id))
        .await
        .unwrap();
    assert_eq!(view.score, Some(0));

    let err = answer(State(state.clone()), auth_as(&state, "student-1").await, Path(id), answer_body("2"))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn other_users_get_404() {
    let state = test_helpers::test_app_state();
    let id = start(&state, "student-1").await;

    let err = get(State(state.clone()), auth_as(&state, "student-2").await, Path(id))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::NOT_FOUND);

    let err = delete(State(state.clone()), auth_as(&state, "admin-1").await, Path(id))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::NOT_FOUND);

    assert!(get(State(state.clone()), auth_as(&state, "student-1").await, Path(id)).await.is_ok());
}

#[tokio::test]
async fn delete_resets() {
    let state = test_helpers::test_app_state();
    let id = start(&state, "student-1").await;
    let status = delete(State(state.clone()), auth_as(&state, "student-1").await, Path(id))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(get(State(state.clone()), auth_as(&state, "student-1").await, Path(id)).await.is_err());
}

#[tokio::test]
async fn create_requires_questions_or_content() {
    let state = test_helpers::test_app_state();
    let body = CreateAttemptBody { questions: None, content: None };
    let err = create(State(state.clone()), auth_as(&state, "student-1").await, ApiJson(body))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);

    let body = CreateAttemptBody { questions: Some(Vec::new()), content: None };
    let err = create(State(state.clone()), auth_as(&state, "student-1").await, ApiJson(body))
        .await
        .unwrap_err();
    assert_eq!(err.body.code, "E_NO_QUESTIONS");
}

#[tokio::test]
async fn create_from_content_generates_questions() {
    let reply = r#"[{"question":"q","options":["a","b","c","d"],"correctAnswer":"c"}]"#;
    let state = test_helpers::test_app_state_with_llm(Arc::new(MockLlm::text(reply)));
    let body = CreateAttemptBody { questions: None, content: Some("Chapter 1".into()) };
    let (_, Json(view)) = create(State(state.clone()), auth_as(&state, "student-1").await, ApiJson(body))
        .await
        .unwrap();
    assert_eq!(view.total, 1);
    assert_eq!(view.question.unwrap().options.len(), 4);
}

#[tokio::test]
async fn create_from_content_without_llm_is_503() {
    let state = test_helpers::test_app_state();
    let body = CreateAttemptBody { questions: None, content: Some("Chapter 1".into()) };
    let err = create(State(state.clone()), auth_as(&state, "student-1").await, ApiJson(body))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn create_rejects_malformed_supplied_questions() {
    let state = test_helpers::test_app_state();
    let mut bad = questions();
    bad[1].correct_answer = "7".into();
    let body = CreateAttemptBody { questions: Some(bad), content: None };
    let err = create(State(state.clone()), auth_as(&state, "student-1").await, ApiJson(body))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    assert_eq!(err.body.code, "E_MALFORMED_QUESTION");
}
