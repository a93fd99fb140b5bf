use std::sync::Arc;

use super::*;
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::state::test_helpers::{self, MockLlm};

const QUESTIONS_JSON: &str = r#"[
  {"question": "2 + 2?", "options": ["3", "4", "5", "6"], "correctAnswer": "4"},
  {"question": "Capital of France?", "options": ["Paris", "Rome", "Madrid", "Berlin"], "correctAnswer": "Paris"}
]"#;

// =============================================================================
// prompts
// =============================================================================

#[test]
fn notes_prompt_wraps_content() {
    let prompt = notes_prompt("photosynthesis");
    assert!(prompt.starts_with("You are a helpful assistant. Generate **well-structured notes**"));
    assert!(prompt.contains("Use bullet points, headings, and subheadings where appropriate."));
    assert!(prompt.ends_with("Text:\n\"\"\"photosynthesis\"\"\""));
}

#[test]
fn test_prompt_asks_for_json() {
    let prompt = test_prompt("cells");
    assert!(prompt.starts_with("Generate 5 multiple-choice questions based on the content below.\n"));
    assert!(prompt.contains("- an \"options\" array (length 4)\n"));
    assert!(prompt.contains("- a \"correctAnswer\" field\n\nRespond in JSON format only."));
    assert!(prompt.ends_with("Content: \"\"\"cells\"\"\""));
}

// =============================================================================
// parse_questions
// =============================================================================

#[test]
fn parse_bare_array() {
    let questions = parse_questions(QUESTIONS_JSON).unwrap();
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[1].correct_answer, "Paris");
}

#[test]
fn parse_wrapped_object() {
    let text = format!(r#"{{"questions": {QUESTIONS_JSON}}}"#);
    assert_eq!(parse_questions(&text).unwrap().len(), 2);
}

#[test]
fn parse_strips_code_fence() {
    let fenced = format!("```json\n{QUESTIONS_JSON}\n```");
    assert_eq!(parse_questions(&fenced).unwrap().len(), 2);

    let bare_fence = format!("```\n{QUESTIONS_JSON}```");
    assert_eq!(parse_questions(&bare_fence).unwrap().len(), 2);
}

#[test]
fn parse_failure_keeps_raw_text() {
    let err = parse_questions("Sure! Here are your questions:").unwrap_err();
    match err {
        GenerateError::UnparseableTest { raw } => assert_eq!(raw, "Sure! Here are your questions:"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn parse_rejects_empty_list() {
    assert!(matches!(parse_questions("[]"), Err(GenerateError::UnparseableTest { .. })));
    assert!(matches!(parse_questions(r#"{"questions": []}"#), Err(GenerateError::UnparseableTest { .. })));
}

#[test]
fn parse_rejects_answer_outside_options() {
    let text = r#"[{"question": "q", "options": ["a", "b"], "correctAnswer": "c"}]"#;
    assert!(matches!(parse_questions(text), Err(GenerateError::UnparseableTest { .. })));
}

#[test]
fn parse_rejects_missing_fields() {
    let text = r#"[{"question": "q", "options": ["a", "b"]}]"#;
    assert!(parse_questions(text).is_err());
}

#[test]
fn question_uses_camel_case_on_the_wire() {
    let q = Question { question: "q".into(), options: vec!["a".into()], correct_answer: "a".into() };
    let json = serde_json::to_value(&q).unwrap();
    assert_eq!(json["correctAnswer"], "a");
}

// =============================================================================
// generate_notes / generate_test
// =============================================================================

#[tokio::test]
async fn notes_returns_first_text_block() {
    let mock = Arc::new(MockLlm::text("# Notes\n- point"));
    let state = test_helpers::test_app_state_with_llm(mock.clone());

    let notes = generate_notes(&state, "student-1", "Some chapter").await.unwrap();
    assert_eq!(notes, "# Notes\n- point");

    let prompts = mock.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0], notes_prompt("Some chapter"));
}

#[tokio::test]
async fn notes_without_text_is_no_notes() {
    let state = test_helpers::test_app_state_with_llm(Arc::new(MockLlm::text("   ")));
    let err = generate_notes(&state, "student-1", "x").await.unwrap_err();
    assert!(matches!(err, GenerateError::NoNotes));
    assert_eq!(err.to_string(), "No notes generated");
}

#[tokio::test]
async fn blank_content_is_rejected_before_llm_call() {
    let mock = Arc::new(MockLlm::text("unused"));
    let state = test_helpers::test_app_state_with_llm(mock.clone());
    let err = generate_notes(&state, "student-1", "  \n ").await.unwrap_err();
    assert!(matches!(err, GenerateError::EmptyContent));
    assert!(mock.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_llm_is_not_configured() {
    let state = test_helpers::test_app_state();
    let err = generate_test(&state, "student-1", "x").await.unwrap_err();
    assert!(matches!(err, GenerateError::NotConfigured));
}

#[tokio::test]
async fn upstream_error_propagates() {
    let mock = MockLlm::new(vec![Err(LlmError::ApiResponse { status: 503, body: "busy".into() })]);
    let state = test_helpers::test_app_state_with_llm(Arc::new(mock));
    let err = generate_notes(&state, "student-1", "x").await.unwrap_err();
    assert!(matches!(err, GenerateError::Llm(_)));
    assert!(err.retryable());
}

#[tokio::test]
async fn test_generation_parses_questions() {
    let mock = Arc::new(MockLlm::text(QUESTIONS_JSON));
    let state = test_helpers::test_app_state_with_llm(mock.clone());
    let questions = generate_test(&state, "student-1", "Arithmetic").await.unwrap();
    assert_eq!(questions[0].options.len(), 4);
    assert_eq!(mock.prompts.lock().unwrap()[0], test_prompt("Arithmetic"));
}

#[tokio::test]
async fn test_generation_reports_raw_on_garbage() {
    let state = test_helpers::test_app_state_with_llm(Arc::new(MockLlm::text("not json")));
    match generate_test(&state, "student-1", "x").await.unwrap_err() {
        GenerateError::UnparseableTest { raw } => assert_eq!(raw, "not json"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn rate_limit_applies_per_user() {
    let mut state = test_helpers::test_app_state_with_llm(Arc::new(MockLlm::new(Vec::new())));
    state.rate_limiter = RateLimiter::new(RateLimitConfig { per_user_limit: 1, ..RateLimitConfig::default() });

    generate_notes(&state, "student-1", "x").await.unwrap();
    let err = generate_notes(&state, "student-1", "x").await.unwrap_err();
    assert!(matches!(err, GenerateError::RateLimited(_)));
    assert_eq!(err.error_code(), "E_RATE_LIMITED");

    generate_notes(&state, "student-2", "x").await.unwrap();
}

#[tokio::test]
async fn token_usage_is_charged() {
    let mut state = test_helpers::test_app_state_with_llm(Arc::new(MockLlm::new(Vec::new())));
    // Mock replies report 30 tokens each.
    state.rate_limiter = RateLimiter::new(RateLimitConfig { token_budget: 30, ..RateLimitConfig::default() });

    generate_notes(&state, "parent-1", "x").await.unwrap();
    let err = generate_notes(&state, "parent-1", "x").await.unwrap_err();
    assert!(matches!(
        err,
        GenerateError::RateLimited(RateLimitError::TokenBudgetExceeded { .. })
    ));
}
