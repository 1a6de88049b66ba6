//! Mistral Backend
//!
//! Talks to Mistral's OpenAI-style `/v1/chat/completions` endpoint with
//! bearer auth. Streaming replies arrive as server-sent events: `data: `
//! lines carrying JSON deltas, terminated by `data: [DONE]`.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::traits::{AiProvider, ChatHistory, ChatMessage};

/// A Mistral API chat backend.
pub struct MistralProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f64,
    timeout: Duration,
    history: ChatHistory,
}

#[derive(Deserialize)]
struct Completion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct StreamCompletion {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

impl MistralProvider {
    /// Create a backend against an API base URL like
    /// `https://api.mistral.ai`.
    #[must_use]
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        temperature: f64,
        timeout: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature,
            timeout,
            history: ChatHistory::new(),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn body(&self, stream: bool, messages: &[ChatMessage]) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "stream": stream,
        })
    }

    async fn post(&self, body: &serde_json::Value) -> Result<reqwest::Response, String> {
        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|error| error.to_string())?;
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            if detail.trim().is_empty() {
                Err(status.to_string())
            } else {
                Err(detail)
            }
        }
    }
}

#[async_trait]
impl AiProvider for MistralProvider {
    fn name(&self) -> &'static str {
        "mistral"
    }

    fn set_system_message(&self, content: &str) {
        self.history.set_system_message(content);
    }

    fn reset_chat(&self, reset_system: bool) {
        self.history.reset(reset_system);
    }

    async fn send_message(&self, message: &str) -> String {
        self.history.push(ChatMessage::user(message));
        let body = self.body(false, &self.history.snapshot());

        let response = match self.post(&body).await {
            Ok(response) => response,
            Err(detail) => {
                self.history.pop_last();
                return format!("Error: {detail}");
            }
        };

        match response.json::<Completion>().await {
            Ok(completion) => {
                let content = completion
                    .choices
                    .into_iter()
                    .next()
                    .map(|choice| choice.message.content)
                    .unwrap_or_default();
                self.history.push(ChatMessage::assistant(content.clone()));
                content
            }
            Err(error) => {
                self.history.pop_last();
                format!("Error: {error}")
            }
        }
    }

    async fn stream_message(&self, message: &str) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(64);
        self.history.push(ChatMessage::user(message));
        let body = self.body(true, &self.history.snapshot());

        let response = match self.post(&body).await {
            Ok(response) => response,
            Err(detail) => {
                self.history.pop_last();
                let _ = tx.send(format!("Error: {detail}")).await;
                return rx;
            }
        };

        let history = self.history.clone();
        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut line_buffer = String::new();
            let mut full_reply = String::new();

            while let Some(piece) = stream.next().await {
                let bytes = match piece {
                    Ok(bytes) => bytes,
                    Err(error) => {
                        warn!(%error, "mistral stream broke mid-reply");
                        history.pop_last();
                        let _ = tx.send(format!("Error: {error}")).await;
                        return;
                    }
                };
                line_buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(newline) = line_buffer.find('\n') {
                    let line = line_buffer[..newline].trim().to_string();
                    line_buffer.drain(..=newline);
                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();
                    if data == "[DONE]" {
                        history.push(ChatMessage::assistant(full_reply));
                        return;
                    }
                    let completion: StreamCompletion = match serde_json::from_str(data) {
                        Ok(completion) => completion,
                        Err(error) => {
                            debug!(%error, "skipping malformed stream event");
                            continue;
                        }
                    };
                    let Some(fragment) = completion
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|choice| choice.delta.content)
                    else {
                        continue;
                    };
                    if fragment.is_empty() {
                        continue;
                    }
                    full_reply.push_str(&fragment);
                    if tx.send(fragment).await.is_err() {
                        history.pop_last();
                        return;
                    }
                }
            }

            // EOF without a DONE marker; keep what arrived.
            if full_reply.is_empty() {
                history.pop_last();
            } else {
                history.push(ChatMessage::assistant(full_reply));
            }
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // Port 9 (discard) is unassigned on the loopback, so the connect is
    // refused immediately and the test runs offline.
    fn unreachable_provider() -> MistralProvider {
        MistralProvider::new(
            "http://127.0.0.1:9",
            "key",
            "test-model",
            0.8,
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn failed_stream_rolls_back_history_and_speaks_the_error() {
        let provider = unreachable_provider();
        provider.set_system_message("rules");
        let before = provider.history.len();

        let mut rx = provider.stream_message("hello").await;
        let chunk = rx.recv().await.expect("one spoken error chunk");
        assert!(chunk.starts_with("Error: "), "got: {chunk}");
        assert!(rx.recv().await.is_none());

        assert_eq!(provider.history.len(), before);
    }

    #[tokio::test]
    async fn failed_send_rolls_back_history_and_speaks_the_error() {
        let provider = unreachable_provider();
        provider.set_system_message("rules");
        let before = provider.history.len();

        let reply = provider.send_message("hello").await;
        assert!(reply.starts_with("Error: "), "got: {reply}");
        assert_eq!(provider.history.len(), before);
    }
}
