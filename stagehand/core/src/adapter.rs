//! Provider Adapter
//!
//! Builds the configured backend and teaches it the command vocabulary
//! through the system message. The prompt lists every legal wire token
//! verbatim, generated from [`vocab`](crate::vocab) so the prompt can never
//! drift from what the dispatcher accepts.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::config::{ConfigError, ProviderConfig, StagehandConfig};
use crate::provider::{
    AiProvider, EchoProvider, MistralProvider, OllamaProvider, ScriptedProvider,
};
use crate::vocab::{self, ChatCommand, EmoteSlot, FlowCommand};

/// The configured backend plus its standing instructions.
pub struct AiAdapter {
    provider: Arc<dyn AiProvider>,
}

impl AiAdapter {
    /// Build the backend named by the configuration and install the
    /// vocabulary prompt.
    pub fn new(config: &StagehandConfig) -> Result<Self, ConfigError> {
        let provider = create_provider(&config.provider)?;
        info!(
            provider = provider.name(),
            model = %config.provider.model,
            "ai adapter ready"
        );
        provider.set_system_message(&system_message(&config.bot_name));
        Ok(Self { provider })
    }

    /// A handle to the underlying provider, for flow commands that reset
    /// its history.
    #[must_use]
    pub fn provider(&self) -> Arc<dyn AiProvider> {
        Arc::clone(&self.provider)
    }

    /// Poke the backend so the first turn is fast.
    pub async fn warm_up(&self) {
        self.provider.warm_up().await;
    }

    /// Forget the conversation, keeping the system message unless
    /// `reset_system` is set.
    pub fn reset_chat(&self, reset_system: bool) {
        self.provider.reset_chat(reset_system);
    }

    /// One streaming turn.
    pub async fn stream_message(&self, message: &str) -> mpsc::Receiver<String> {
        self.provider.stream_message(message).await
    }

    /// One full-reply turn.
    pub async fn send_message(&self, message: &str) -> String {
        self.provider.send_message(message).await
    }
}

fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn AiProvider>, ConfigError> {
    Ok(match config.kind.as_str() {
        "echo" => Arc::new(EchoProvider::new()),
        "scripted" => Arc::new(ScriptedProvider::new()),
        "ollama" => Arc::new(OllamaProvider::new(
            &config.api_url,
            &config.model,
            config.temperature,
            config.timeout,
        )),
        "mistral" => Arc::new(MistralProvider::new(
            &config.api_url,
            &config.api_key,
            &config.model,
            config.temperature,
            config.timeout,
        )),
        other => {
            return Err(ConfigError::ValidationError(format!(
                "unknown provider kind '{other}'"
            )))
        }
    })
}

/// The standing instructions, with every legal command token listed.
fn system_message(bot_name: &str) -> String {
    let expressions = vocab::primary_expression_wires().join(", ");
    let blush = vocab::blush_wires().join(", ");
    let arm_left = vocab::arm_wires(EmoteSlot::ArmLeft).join(", ");
    let arm_right = vocab::arm_wires(EmoteSlot::ArmRight).join(", ");
    let arm_both = vocab::arm_wires(EmoteSlot::ArmBoth).join(", ");
    let exit = ChatCommand::Flow(FlowCommand::ExitChat).wire();
    let reset = ChatCommand::Flow(FlowCommand::ResetChat).wire();
    let split = ChatCommand::Flow(FlowCommand::SplitMessage).wire();

    format!(
        "You are {bot_name}, a character on screen talking with the user. \
Keep your replies short and conversational; they are read aloud one \
character at a time.

You can act while you speak by placing commands inline in your reply. \
A command starts with #! and is removed from the spoken text; it takes \
effect exactly where it stands. Use them to match your face and arms to \
what you are saying at that moment.

Facial expressions: {expressions}
Blush overlays (stack on any expression): {blush}
Left arm: {arm_left}
Right arm: {arm_right}
Both arms: {arm_both}

Conversation control:
- {split}: end the current speech bubble and continue in a new one. Use it \
between paragraphs instead of long pauses.
- {reset}: forget the whole conversation, if the user asks you to.
- {exit}: say a short goodbye first, then end the conversation.

Rules:
- Only use the commands listed above, spelled exactly as shown.
- Never invent new commands and never mention the commands in your spoken \
text.
- Change expression when your mood changes; you do not need to clear it \
first."
    )
}
