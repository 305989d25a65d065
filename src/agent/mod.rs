//! Conversational identification agent.
//!
//! An [`IdentificationAgent`] owns one identification session: the fixed
//! system instruction, the [`Conversation`] handle, and the state of the
//! clarification protocol.
//!
//! ```text
//!          start_analysis            complete
//!   Idle ──────────────▶ Analyzing ─────────────▶ Complete
//!                          │   ▲   error
//!   clarification_needed   │   │  ─────────────▶ Errored
//!                          ▼   │ reply
//!                  AwaitingClarification
//! ```
//!
//! Every turn returns an [`AgentResponse`]; backend failures and
//! unparsable replies become `status = error` instead of propagating.
//! The only fallible step is construction, which fails with
//! [`AgentError::Credential`] when no backend key is available.
//!
//! Turns take `&mut self`, so two turns can never be in flight on the same
//! session. Discarding a session means dropping the agent.

pub mod backend;
pub mod gemini;
pub mod parse;
pub mod prompt;

pub use backend::{Conversation, Part, ReasoningBackend, Role, Turn};
pub use gemini::GeminiBackend;

use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::images::ImageInput;
use crate::models::{AgentResponse, Outcome, ResponseStatus};

/// Outcome message when a reply does not match the response schema.
pub const PARSE_FAILURE: &str = "Failed to parse JSON from model response";

const START_CONTEXT: &str = "Failed to initialize analysis";
const REPLY_CONTEXT: &str = "Error processing reply";

/// Where a session is in the clarification protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// Constructed; no turn sent yet.
    Idle,
    /// A turn is in flight.
    Analyzing,
    /// The last turn asked a question; exactly one reply is expected.
    AwaitingClarification,
    /// A draft record is available.
    Complete,
    /// The session failed; start a new one to retry.
    Errored,
}

impl AgentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentState::Complete | AgentState::Errored)
    }
}

/// Secrets handed to a session at construction and never changed.
#[derive(Clone, Default)]
pub struct Credentials {
    pub api_key: String,
    pub catalog_token: Option<String>,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, catalog_token: Option<String>) -> Self {
        Self {
            api_key: api_key.into(),
            catalog_token,
        }
    }

    fn has_catalog_token(&self) -> bool {
        self.catalog_token
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("catalog_token", &self.catalog_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// One identification session against a reasoning backend.
pub struct IdentificationAgent {
    backend: Box<dyn ReasoningBackend>,
    system_instruction: String,
    conversation: Conversation,
    state: AgentState,
    turns: usize,
    last_response: Option<AgentResponse>,
}

impl IdentificationAgent {
    /// Open a session against Gemini.
    ///
    /// # Errors
    ///
    /// [`AgentError::Credential`] when `credentials.api_key` is blank; no
    /// session is created and no turn is attempted.
    pub fn new(config: &AgentConfig, credentials: Credentials) -> Result<Self, AgentError> {
        let backend = GeminiBackend::new(config, &credentials.api_key)?;
        Ok(Self::with_backend(
            Box::new(backend),
            credentials.has_catalog_token(),
        ))
    }

    /// Open a session against any backend.
    pub fn with_backend(backend: Box<dyn ReasoningBackend>, catalog_connected: bool) -> Self {
        Self {
            backend,
            system_instruction: prompt::system_instruction(catalog_connected),
            conversation: Conversation::new(),
            state: AgentState::Idle,
            turns: 0,
            last_response: None,
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Number of turns sent to the backend so far.
    pub fn turn_count(&self) -> usize {
        self.turns
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn last_response(&self) -> Option<&AgentResponse> {
        self.last_response.as_ref()
    }

    /// Send the photo batch with the identification instruction.
    ///
    /// Only valid from [`AgentState::Idle`]; otherwise an error response is
    /// returned and the session is left untouched. Whether the batch is
    /// sufficient (front and back covers) is judged by the model and
    /// reported through `isValid` / `validationWarning`, not enforced here.
    pub async fn start_analysis(&mut self, images: Vec<ImageInput>) -> AgentResponse {
        if self.state != AgentState::Idle {
            return AgentResponse::error(
                START_CONTEXT,
                "an analysis was already started in this session",
            );
        }

        info!(images = images.len(), "starting analysis");
        let mut parts: Vec<Part> = images.into_iter().map(Part::Image).collect();
        parts.push(Part::Text(prompt::IDENTIFY_INSTRUCTION.to_string()));
        self.run_turn(parts, START_CONTEXT).await
    }

    /// Answer the pending question with text, a photo, or both.
    ///
    /// With neither, a generic "continue" instruction is sent so the turn
    /// is never empty. Only valid from
    /// [`AgentState::AwaitingClarification`].
    pub async fn reply(&mut self, text: Option<String>, image: Option<ImageInput>) -> AgentResponse {
        if self.state != AgentState::AwaitingClarification {
            return AgentResponse::error(REPLY_CONTEXT, "the agent is not waiting for an answer");
        }

        let text = text.filter(|t| !t.trim().is_empty());
        let parts = match (text, image) {
            (text, Some(image)) => vec![
                Part::Image(image),
                Part::Text(text.unwrap_or_else(|| prompt::IMAGE_ONLY_REPLY.to_string())),
            ],
            (Some(text), None) => vec![Part::Text(text)],
            (None, None) => vec![Part::Text(prompt::CONTINUE_INSTRUCTION.to_string())],
        };
        self.run_turn(parts, REPLY_CONTEXT).await
    }

    async fn run_turn(&mut self, parts: Vec<Part>, context: &str) -> AgentResponse {
        self.state = AgentState::Analyzing;
        self.turns += 1;
        self.conversation.push(Role::User, parts);
        debug!(
            turn = self.turns,
            history = self.conversation.len(),
            backend = self.backend.name(),
            "sending turn"
        );

        let response = match self
            .backend
            .generate(&self.system_instruction, &self.conversation)
            .await
        {
            Ok(text) => {
                self.conversation.push(Role::Model, vec![Part::Text(text.clone())]);
                match parse::parse_response(&text) {
                    Ok(response) => response,
                    Err(e) => {
                        warn!(turn = self.turns, error = %e, "reply did not match schema");
                        AgentResponse {
                            logs: vec![format!("{}: {} ({})", context, PARSE_FAILURE, e)],
                            outcome: Outcome::Error(PARSE_FAILURE.to_string()),
                        }
                    }
                }
            }
            Err(e) => {
                warn!(turn = self.turns, error = %e, "backend turn failed");
                self.conversation.pop_unanswered();
                AgentResponse::error(context, e.to_string())
            }
        };

        self.state = match response.status() {
            ResponseStatus::Complete => AgentState::Complete,
            ResponseStatus::ClarificationNeeded => AgentState::AwaitingClarification,
            ResponseStatus::Error => AgentState::Errored,
        };
        info!(turn = self.turns, status = response.status().as_str(), "turn finished");
        self.last_response = Some(response.clone());
        response
    }
}
