//! Notes and test generation.
//!
//! DESIGN
//! ======
//! Each request becomes exactly one upstream chat call: the pasted content is
//! wrapped in a fixed prompt, sent to the client `AppState.llm` holds,
//! and the first text block is returned as notes or parsed into questions.
//! There is no retry. Requests are gated by the shared rate limiter, keyed by
//! the signed-in user, and reported token usage is charged afterwards.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::env_parse;
use crate::error::ErrorCode;
use crate::llm::types::{ChatResponse, LlmError, Message};
use crate::rate_limit::RateLimitError;
use crate::state::AppState;

const DEFAULT_AI_MAX_TOKENS: u32 = 4096;

fn ai_max_tokens() -> u32 {
    static VALUE: OnceLock<u32> = OnceLock::new();
    *VALUE.get_or_init(|| env_parse("AI_MAX_TOKENS", DEFAULT_AI_MAX_TOKENS))
}

// =============================================================================
// TYPES
// =============================================================================

/// One multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

impl Question {
    /// Non-blank text, at least one option, and an answer among the options.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.question.trim().is_empty() && !self.options.is_empty() && self.options.contains(&self.correct_answer)
    }
}

/// Shapes the model is known to answer with.
#[derive(Deserialize)]
#[serde(untagged)]
enum TestPayload {
    Bare(Vec<Question>),
    Wrapped { questions: Vec<Question> },
}

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("LLM is not configured")]
    NotConfigured,
    #[error("Content is required")]
    EmptyContent,
    #[error("No notes generated")]
    NoNotes,
    #[error("Failed to parse model response")]
    UnparseableTest { raw: String },
    #[error("{0}")]
    Llm(#[from] LlmError),
    #[error("rate limited: {0}")]
    RateLimited(#[from] RateLimitError),
}

impl ErrorCode for GenerateError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotConfigured => "E_LLM_NOT_CONFIGURED",
            Self::EmptyContent => "E_EMPTY_CONTENT",
            Self::NoNotes => "E_NO_NOTES",
            Self::UnparseableTest { .. } => "E_UNPARSEABLE_TEST",
            Self::Llm(e) => e.error_code(),
            Self::RateLimited(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Llm(e) => e.retryable(),
            Self::RateLimited(_) => true,
            _ => false,
        }
    }
}

// =============================================================================
// PROMPTS
// =============================================================================

#[must_use]
pub fn notes_prompt(content: &str) -> String {
    format!(
        "You are a helpful assistant. Generate **well-structured notes** from the following content. \n\
         Use bullet points, headings, and subheadings where appropriate.\n\n\
         Text:\n\"\"\"{content}\"\"\""
    )
}

#[must_use]
pub fn test_prompt(content: &str) -> String {
    format!(
        "Generate 5 multiple-choice questions based on the content below.\n\
         Each question must have:\n\
         - a \"question\" field\n\
         - an \"options\" array (length 4)\n\
         - a \"correctAnswer\" field\n\n\
         Respond in JSON format only.\n\n\
         Content: \"\"\"{content}\"\"\""
    )
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Turn pasted study material into formatted notes.
///
/// # Errors
///
/// Blank content, missing LLM config, rate limits, upstream failures, and a
/// response without text all surface as [`GenerateError`].
pub async fn generate_notes(state: &AppState, user_id: &str, content: &str) -> Result<String, GenerateError> {
    let response = complete(state, user_id, "notes", content, notes_prompt).await?;
    response
        .first_text()
        .map(str::to_owned)
        .ok_or(GenerateError::NoNotes)
}

/// Turn pasted study material into a multiple-choice test.
///
/// # Errors
///
/// As [`generate_notes`], plus [`GenerateError::UnparseableTest`] carrying the
/// raw model text when it is not a usable question list.
pub async fn generate_test(state: &AppState, user_id: &str, content: &str) -> Result<Vec<Question>, GenerateError> {
    let response = complete(state, user_id, "test", content, test_prompt).await?;
    let raw = response.first_text().unwrap_or_default();
    parse_questions(raw).inspect_err(|_| {
        warn!(%user_id, raw_len = raw.len(), "generate: model returned unparseable test");
    })
}

async fn complete(
    state: &AppState,
    user_id: &str,
    kind: &'static str,
    content: &str,
    prompt: fn(&str) -> String,
) -> Result<ChatResponse, GenerateError> {
    if content.trim().is_empty() {
        return Err(GenerateError::EmptyContent);
    }
    let Some(llm) = &state.llm else {
        return Err(GenerateError::NotConfigured);
    };

    state.rate_limiter.check_and_record(user_id)?;
    info!(%user_id, kind, content_len = content.len(), model = llm.model(), "generate: request");

    let messages = [Message::user(prompt(content))];
    let response = llm.chat(ai_max_tokens(), "", &messages).await?;

    state
        .rate_limiter
        .record_tokens(user_id, response.total_tokens());
    info!(
        %user_id,
        kind,
        model = %response.model,
        stop_reason = %response.stop_reason,
        input_tokens = response.input_tokens,
        output_tokens = response.output_tokens,
        "generate: response"
    );
    Ok(response)
}

// =============================================================================
// PARSING
// =============================================================================

/// Parse model output into questions.
///
/// Accepts a bare JSON array or `{"questions": [...]}`, optionally wrapped in
/// a markdown code fence. Every question needs text, at least one option and
/// a correct answer that is one of its options.
///
/// # Errors
///
/// Returns [`GenerateError::UnparseableTest`] with the raw model text.
pub fn parse_questions(text: &str) -> Result<Vec<Question>, GenerateError> {
    let unparseable = || GenerateError::UnparseableTest { raw: text.to_owned() };

    let questions = match serde_json::from_str::<TestPayload>(strip_code_fence(text)) {
        Ok(TestPayload::Bare(questions) | TestPayload::Wrapped { questions }) => questions,
        Err(_) => return Err(unparseable()),
    };

    let valid = !questions.is_empty() && questions.iter().all(Question::is_well_formed);
    if valid { Ok(questions) } else { Err(unparseable()) }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (```json) when the fence has its own line.
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
#[path = "generate_test.rs"]
mod tests;
