//! Ollama Backend
//!
//! Talks to a local Ollama server over its `/api/chat` endpoint. Streaming
//! replies arrive as newline-delimited JSON objects; each carries a
//! `message.content` fragment, and the final one sets `done`.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::traits::{AiProvider, ChatHistory, ChatMessage};

/// A local Ollama chat backend.
pub struct OllamaProvider {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f64,
    timeout: Duration,
    history: ChatHistory,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl OllamaProvider {
    /// Create a backend against a server base URL like
    /// `http://localhost:11434`.
    #[must_use]
    pub fn new(base_url: &str, model: &str, temperature: f64, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature,
            timeout,
            history: ChatHistory::new(),
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn body(&self, stream: bool, messages: &[ChatMessage]) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": messages,
            "stream": stream,
            "options": { "temperature": self.temperature },
        })
    }

    async fn post(&self, body: &serde_json::Value) -> Result<reqwest::Response, String> {
        let response = self
            .http
            .post(self.chat_url())
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|error| error.to_string())?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_detail(response).await)
        }
    }
}

/// Pull the server's error message out of a failed response, falling back
/// to the raw body or the status line.
async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    match response.text().await {
        Ok(body) => match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => parsed.error,
            Err(_) if !body.trim().is_empty() => body,
            Err(_) => status.to_string(),
        },
        Err(_) => status.to_string(),
    }
}

#[async_trait]
impl AiProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn set_system_message(&self, content: &str) {
        self.history.set_system_message(content);
    }

    fn reset_chat(&self, reset_system: bool) {
        self.history.reset(reset_system);
    }

    async fn warm_up(&self) {
        debug!(model = %self.model, "warming up ollama model");
        let body = self.body(false, &[ChatMessage::user("Reply with a single word.")]);
        if let Err(error) = self.post(&body).await {
            debug!(%error, "warm-up request failed");
        }
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

        match response.json::<ChatChunk>().await {
            Ok(chunk) => {
                let content = chunk.message.map(|m| m.content).unwrap_or_default();
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
                        warn!(%error, "ollama stream broke mid-reply");
                        history.pop_last();
                        let _ = tx.send(format!("Error: {error}")).await;
                        return;
                    }
                };
                line_buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(newline) = line_buffer.find('\n') {
                    let line = line_buffer[..newline].trim().to_string();
                    line_buffer.drain(..=newline);
                    if line.is_empty() {
                        continue;
                    }
                    let chunk: ChatChunk = match serde_json::from_str(&line) {
                        Ok(chunk) => chunk,
                        Err(error) => {
                            debug!(%error, "skipping malformed stream line");
                            continue;
                        }
                    };
                    if let Some(fragment) = chunk.message {
                        if !fragment.content.is_empty() {
                            full_reply.push_str(&fragment.content);
                            if tx.send(fragment.content).await.is_err() {
                                // Turn cancelled; the partial reply is lost
                                // on purpose.
                                history.pop_last();
                                return;
                            }
                        }
                    }
                    if chunk.done {
                        history.push(ChatMessage::assistant(full_reply));
                        return;
                    }
                }
            }

            // EOF without a done marker; keep what arrived.
            if full_reply.is_empty() {
                history.pop_last();
            } else {
                history.push(ChatMessage::assistant(full_reply));
            }
        });

        rx
    }
}
