//! Provider Trait and Conversation History

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Standing instructions to the model.
    System,
    /// The human side of the conversation.
    User,
    /// The model side of the conversation.
    Assistant,
}

/// One message in the conversation, in the wire shape both backends use.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message author.
    pub role: Role,
    /// Message body.
    pub content: String,
}

impl ChatMessage {
    /// A system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// A user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// An assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Shared, clonable conversation history.
///
/// Providers push the user message before a request and roll it back on
/// transport failure, so a failed turn leaves no trace.
#[derive(Clone, Debug, Default)]
pub struct ChatHistory {
    inner: Arc<Mutex<Vec<ChatMessage>>>,
}

impl ChatHistory {
    /// Create an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace (or install) the system message at the front.
    pub fn set_system_message(&self, content: &str) {
        let mut messages = self.inner.lock();
        messages.retain(|m| m.role != Role::System);
        messages.insert(0, ChatMessage::system(content));
    }

    /// Append a message.
    pub fn push(&self, message: ChatMessage) {
        self.inner.lock().push(message);
    }

    /// Remove the most recent message, if any.
    pub fn pop_last(&self) {
        self.inner.lock().pop();
    }

    /// Forget the conversation. With `reset_system` the system message goes
    /// too; otherwise it is the only survivor.
    pub fn reset(&self, reset_system: bool) {
        let mut messages = self.inner.lock();
        if reset_system {
            messages.clear();
        } else {
            messages.retain(|m| m.role == Role::System);
        }
    }

    /// A copy of the current messages, for building a request body.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.inner.lock().clone()
    }

    /// Number of messages, system included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the history holds no messages at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// A chat backend.
///
/// Implementations own their [`ChatHistory`] and keep it consistent across
/// successes, failures, and resets.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Short backend name, for logs.
    fn name(&self) -> &'static str;

    /// Install the standing instructions.
    fn set_system_message(&self, content: &str);

    /// Forget the conversation; see [`ChatHistory::reset`].
    fn reset_chat(&self, reset_system: bool);

    /// Optional: poke the backend so the first real turn is fast.
    async fn warm_up(&self) {}

    /// One full-reply request.
    async fn send_message(&self, message: &str) -> String;

    /// One streaming request. Chunks arrive on the returned receiver;
    /// dropping it cancels the stream.
    async fn stream_message(&self, message: &str) -> mpsc::Receiver<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn system_message_replaces_existing() {
        let history = ChatHistory::new();
        history.set_system_message("first");
        history.push(ChatMessage::user("hi"));
        history.set_system_message("second");

        let messages = history.snapshot();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ChatMessage::system("second"));
        assert_eq!(messages[1], ChatMessage::user("hi"));
    }

    #[test]
    fn reset_can_keep_the_system_message() {
        let history = ChatHistory::new();
        history.set_system_message("rules");
        history.push(ChatMessage::user("hi"));
        history.push(ChatMessage::assistant("hello"));

        history.reset(false);
        assert_eq!(history.snapshot(), vec![ChatMessage::system("rules")]);

        history.push(ChatMessage::user("hi again"));
        history.reset(true);
        assert!(history.is_empty());
    }

    #[test]
    fn pop_last_rolls_back_one_message() {
        let history = ChatHistory::new();
        history.push(ChatMessage::user("doomed"));
        history.pop_last();
        assert!(history.is_empty());
        // Popping empty history is harmless.
        history.pop_last();
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("x")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"x"}"#);
    }
}
