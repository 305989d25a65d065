//! Reasoning backend abstraction and the conversation it extends.
//!
//! A [`Conversation`] is the handle to one multi-turn exchange. It is owned
//! by a single [`IdentificationAgent`](super::IdentificationAgent) and
//! handed to the backend by reference on every turn, so each request
//! carries the complete history (observed catalog numbers, earlier
//! answers) rather than a fresh prompt.

use anyhow::Result;
use async_trait::async_trait;

use crate::images::ImageInput;

/// Author of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

/// One piece of a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    Image(ImageInput),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

/// Ordered turn history of one identification session.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub(crate) fn push(&mut self, role: Role, parts: Vec<Part>) {
        self.turns.push(Turn { role, parts });
    }

    /// Drop a user turn that never got an answer.
    pub(crate) fn pop_unanswered(&mut self) {
        if matches!(self.turns.last(), Some(t) if t.role == Role::User) {
            self.turns.pop();
        }
    }
}

/// A multimodal model that answers the latest user turn of a conversation.
///
/// # Example
///
/// ```rust
/// use anyhow::Result;
/// use async_trait::async_trait;
/// use crate_digger::agent::{Conversation, ReasoningBackend};
///
/// struct Canned(&'static str);
///
/// #[async_trait]
/// impl ReasoningBackend for Canned {
///     fn name(&self) -> &str { "canned" }
///
///     async fn generate(&self, _system: &str, _conversation: &Conversation) -> Result<String> {
///         Ok(self.0.to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    /// Short identifier used in logs (e.g. the model name).
    fn name(&self) -> &str;

    /// Send the whole conversation and return the model's raw reply text.
    ///
    /// The last turn in `conversation` is the user turn to answer.
    async fn generate(&self, system_instruction: &str, conversation: &Conversation)
        -> Result<String>;
}
