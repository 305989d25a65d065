//! Gemini `generateContent` backend.
//!
//! Sends the full conversation on every call: photos travel as base64
//! `inlineData` parts, the session's system instruction as
//! `systemInstruction`, and web search is enabled through the
//! `google_search` tool so the model can cross-reference Discogs.
//!
//! The key is read once at construction; see [`GeminiBackend::from_config`].

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::backend::{Conversation, Part, ReasoningBackend, Role};
use crate::config::AgentConfig;
use crate::error::AgentError;

/// Reasoning backend backed by the Gemini REST API.
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    thinking_budget: Option<u32>,
    web_search: bool,
}

impl GeminiBackend {
    /// Build a backend with an explicit key.
    ///
    /// # Errors
    ///
    /// [`AgentError::Credential`] when `api_key` is blank.
    pub fn new(config: &AgentConfig, api_key: &str) -> Result<Self, AgentError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(AgentError::Credential(
                "the Gemini API key is empty".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            thinking_budget: (config.thinking_budget > 0).then_some(config.thinking_budget),
            web_search: config.web_search,
        })
    }

    /// Build a backend with the key from the environment variable named by
    /// `agent.api_key_env`.
    pub fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        let key = std::env::var(&config.api_key_env).map_err(|_| {
            AgentError::Credential(format!("{} environment variable not set", config.api_key_env))
        })?;
        Self::new(config, &key)
    }

    fn build_request<'a>(
        &self,
        system_instruction: &'a str,
        conversation: &'a Conversation,
    ) -> GenerateContentRequest<'a> {
        let contents = conversation
            .turns()
            .iter()
            .map(|turn| Content {
                role: match turn.role {
                    Role::User => "user",
                    Role::Model => "model",
                },
                parts: turn.parts.iter().map(to_wire_part).collect(),
            })
            .collect();

        GenerateContentRequest {
            contents,
            system_instruction: Some(SystemInstruction {
                parts: vec![WirePart::Text {
                    text: system_instruction.into(),
                }],
            }),
            tools: if self.web_search {
                vec![Tool {
                    google_search: EmptyObject {},
                }]
            } else {
                vec![]
            },
            generation_config: self.thinking_budget.map(|budget| GenerationConfig {
                thinking_config: ThinkingConfig {
                    thinking_budget: budget,
                },
            }),
        }
    }
}

#[async_trait]
impl ReasoningBackend for GeminiBackend {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, system_instruction: &str, conversation: &Conversation) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = self.build_request(system_instruction, conversation);

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Gemini API request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("{}", describe_http_error(status, &body_text));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to decode Gemini response: {}", e))?;
        extract_text(parsed)
    }
}

fn to_wire_part(part: &Part) -> WirePart<'_> {
    match part {
        Part::Text(text) => WirePart::Text {
            text: text.as_str().into(),
        },
        Part::Image(image) => WirePart::InlineData {
            inline_data: InlineData {
                mime_type: &image.mime_type,
                data: BASE64_STANDARD.encode(&image.bytes),
            },
        },
    }
}

/// Concatenate the text parts of the first candidate. Thought summaries
/// and tool traces carry no text and are skipped.
fn extract_text(response: GenerateContentResponse) -> Result<String> {
    let text: String = response
        .candidates
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter(|p| !p.thought.unwrap_or(false))
                .filter_map(|p| p.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        bail!("Empty response from agent");
    }
    Ok(text)
}

fn describe_http_error(status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<ErrorWrapper>(body)
        .ok()
        .map(|w| match (w.error.status, w.error.message) {
            (Some(s), Some(m)) => format!("{}: {}", s, m),
            (None, Some(m)) => m,
            (Some(s), None) => s,
            (None, None) => body.to_string(),
        })
        .unwrap_or_else(|| body.to_string());
    format!("Gemini API error {}: {}", status.as_u16(), detail)
}

// ============ Wire types ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<WirePart<'a>>,
}

#[derive(Serialize)]
struct SystemInstruction<'a> {
    parts: Vec<WirePart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WirePart<'a> {
    Text {
        text: std::borrow::Cow<'a, str>,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Serialize)]
struct Tool {
    google_search: EmptyObject,
}

#[derive(Serialize)]
struct EmptyObject {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    thinking_config: ThinkingConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
    thought: Option<bool>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::ImageInput;

    fn backend() -> GeminiBackend {
        GeminiBackend::new(&AgentConfig::default(), "test-key").unwrap()
    }

    #[test]
    fn test_blank_key_is_credential_error() {
        let err = GeminiBackend::new(&AgentConfig::default(), "   ").err().unwrap();
        assert!(matches!(err, AgentError::Credential(_)));
    }

    #[test]
    fn test_request_carries_history_images_and_tools() {
        let mut conversation = Conversation::new();
        conversation.push(
            Role::User,
            vec![
                Part::Image(ImageInput::from_bytes(vec![1, 2, 3], "image/png")),
                Part::Text("Identify".into()),
            ],
        );
        conversation.push(Role::Model, vec![Part::Text("{}".into())]);
        conversation.push(Role::User, vec![Part::Text("UK-1973".into())]);

        let b = backend();
        let json = serde_json::to_value(b.build_request("system", &conversation)).unwrap();

        let contents = json["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[0]["parts"][0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(contents[0]["parts"][0]["inlineData"]["data"], "AQID");
        assert_eq!(contents[2]["parts"][0]["text"], "UK-1973");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "system");
        assert!(json["tools"][0]["google_search"].is_object());
        assert_eq!(json["generationConfig"]["thinkingConfig"]["thinkingBudget"], 8192);
    }

    #[test]
    fn test_extract_text_skips_thoughts() {
        let resp: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"pondering","thought":true},{"text":"{\"status\":"},{"text":"\"error\"}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(resp).unwrap(), r#"{"status":"error"}"#);
    }

    #[test]
    fn test_extract_text_empty_is_error() {
        let resp: GenerateContentResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert_eq!(extract_text(resp).unwrap_err().to_string(), "Empty response from agent");
    }

    #[test]
    fn test_describe_http_error_uses_api_message() {
        let msg = describe_http_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#,
        );
        assert_eq!(msg, "Gemini API error 400: INVALID_ARGUMENT: API key not valid.");
        assert_eq!(
            describe_http_error(StatusCode::BAD_GATEWAY, "upstream"),
            "Gemini API error 502: upstream"
        );
    }
}
