//! Google Gemini `generateContent` client.
//!
//! Thin HTTP wrapper around `/models/{model}:generateContent`. The key goes in
//! the `x-goog-api-key` header rather than the query string so it never shows
//! up in request logs. Pure parsing in `parse_response` for testability.

use serde::{Deserialize, Serialize};

use super::config::LlmTimeouts;
use super::types::{ChatResponse, ContentBlock, LlmError, Message};

// =============================================================================
// CLIENT
// =============================================================================

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: String, timeouts: LlmTimeouts) -> Result<Self, LlmError> {
        let http = super::build_http_client(timeouts)?;
        Ok(Self { http, api_key, base_url })
    }

    pub async fn chat(
        &self,
        model: &str,
        max_tokens: u32,
        system: &str,
        messages: &[Message],
    ) -> Result<ChatResponse, LlmError> {
        let body = build_request(max_tokens, system, messages);
        let url = format!("{}/models/{model}:generateContent", self.base_url);

        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::ApiRequest(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::ApiRequest(e.to_string()))?;

        if status != 200 {
            return Err(LlmError::ApiResponse { status, body: text });
        }

        parse_response(&text, model)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    contents: Vec<WireContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize, Default)]
struct WireContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Serialize, Deserialize)]
struct WirePart {
    #[serde(default)]
    text: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    thought: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: UsageMetadata,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: WireContent,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

fn text_part(text: &str) -> WirePart {
    WirePart { text: text.to_string(), thought: false }
}

fn build_request(max_tokens: u32, system: &str, messages: &[Message]) -> GenerateRequest {
    let system_instruction =
        (!system.trim().is_empty()).then(|| WireContent { role: None, parts: vec![text_part(system)] });
    // Gemini names the assistant role "model".
    let contents = messages
        .iter()
        .map(|m| WireContent {
            role: Some(if m.role == "assistant" { "model".into() } else { m.role.clone() }),
            parts: vec![text_part(&m.content)],
        })
        .collect();
    GenerateRequest { system_instruction, contents, generation_config: GenerationConfig { max_output_tokens: max_tokens } }
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_response(json: &str, requested_model: &str) -> Result<ChatResponse, LlmError> {
    let api: GenerateResponse = serde_json::from_str(json).map_err(|e| LlmError::ApiParse(e.to_string()))?;

    let mut content = Vec::new();
    let mut finish_reason = None;
    if let Some(candidate) = api.candidates.into_iter().next() {
        finish_reason = candidate.finish_reason;
        for part in candidate.content.parts {
            if part.thought {
                content.push(ContentBlock::Thinking { thinking: part.text });
            } else if !part.text.is_empty() {
                content.push(ContentBlock::Text { text: part.text });
            }
        }
    }

    let stop_reason = match finish_reason.as_deref() {
        Some("MAX_TOKENS") => "max_tokens",
        Some("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT") => "refusal",
        _ => "end_turn",
    };

    Ok(ChatResponse {
        content,
        model: api.model_version.unwrap_or_else(|| requested_model.to_string()),
        stop_reason: stop_reason.to_string(),
        input_tokens: api.usage_metadata.prompt_token_count,
        output_tokens: api.usage_metadata.candidates_token_count,
    })
}

#[cfg(test)]
#[path = "gemini_test.rs"]
mod tests;
