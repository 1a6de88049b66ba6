//! AI Backends
//!
//! Everything upstream of the lexer: the [`AiProvider`] trait, the shared
//! conversation [`ChatHistory`], and the concrete backends:
//!
//! - [`OllamaProvider`]: local Ollama server, NDJSON streaming.
//! - [`MistralProvider`]: Mistral's OpenAI-style API, SSE streaming.
//! - [`EchoProvider`]: repeats the user's input back in small chunks, for
//!   offline development.
//! - [`ScriptedProvider`]: canned replies keyed by input, exercising every
//!   command in the vocabulary.
//!
//! Streaming hands back a plain `mpsc::Receiver<String>` of chunks; the
//! receiver going away simply cancels the stream. Providers never fail a
//! turn: transport errors roll the user message back out of the history and
//! surface as a literal `Error: ...` chunk the character reads out.

mod echo;
mod mistral;
mod ollama;
mod scripted;
mod traits;

pub use echo::EchoProvider;
pub use mistral::MistralProvider;
pub use ollama::OllamaProvider;
pub use scripted::ScriptedProvider;
pub use traits::{AiProvider, ChatHistory, ChatMessage, Role};
