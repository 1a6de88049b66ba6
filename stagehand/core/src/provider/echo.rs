//! Echo Backend
//!
//! Streams the user's own input back in small chunks with realistic delays.
//! Useful offline: whatever you type, commands included, gets performed.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::traits::{AiProvider, ChatHistory, ChatMessage};

/// A backend that echoes the user's input.
pub struct EchoProvider {
    initial_delay: Duration,
    chunk_delay: Duration,
    chunk_size: usize,
    history: ChatHistory,
}

impl Default for EchoProvider {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            chunk_delay: Duration::from_millis(40),
            chunk_size: 4,
            history: ChatHistory::new(),
        }
    }
}

impl EchoProvider {
    /// Create an echo backend with default pacing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stream arbitrary text in `chunk_size` pieces.
    pub(crate) fn stream_text(&self, text: String) -> mpsc::Receiver<String> {
        let pieces: Vec<String> = text
            .chars()
            .collect::<Vec<_>>()
            .chunks(self.chunk_size)
            .map(|piece| piece.iter().collect())
            .collect();
        self.stream_chunks(pieces)
    }

    /// Stream pre-cut chunks verbatim, preserving their boundaries.
    pub(crate) fn stream_chunks(&self, chunks: Vec<String>) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(32);
        let initial_delay = self.initial_delay;
        let chunk_delay = self.chunk_delay;
        tokio::spawn(async move {
            tokio::time::sleep(initial_delay).await;
            for chunk in chunks {
                if tx.send(chunk).await.is_err() {
                    // Receiver gone; the turn was cancelled.
                    return;
                }
                tokio::time::sleep(chunk_delay).await;
            }
        });
        rx
    }
}

#[async_trait]
impl AiProvider for EchoProvider {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn set_system_message(&self, content: &str) {
        self.history.set_system_message(content);
    }

    fn reset_chat(&self, reset_system: bool) {
        self.history.reset(reset_system);
    }

    async fn send_message(&self, message: &str) -> String {
        self.history.push(ChatMessage::user(message));
        self.history.push(ChatMessage::assistant(message));
        message.to_string()
    }

    async fn stream_message(&self, message: &str) -> mpsc::Receiver<String> {
        self.history.push(ChatMessage::user(message));
        self.history.push(ChatMessage::assistant(message));
        self.stream_text(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test(start_paused = true)]
    async fn echoes_input_in_chunks() {
        let provider = EchoProvider::new();
        let mut rx = provider.stream_message("hello there").await;

        let mut chunks = Vec::new();
        while let Some(chunk) = rx.recv().await {
            chunks.push(chunk);
        }
        assert!(chunks.len() > 1);
        assert_eq!(chunks.concat(), "hello there");
    }

    #[tokio::test]
    async fn records_both_sides_of_the_exchange() {
        let provider = EchoProvider::new();
        let reply = provider.send_message("hi").await;
        assert_eq!(reply, "hi");

        provider.reset_chat(true);
        let _ = provider.send_message("after reset").await;
    }
}
