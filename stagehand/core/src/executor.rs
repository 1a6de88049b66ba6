//! Command Dispatcher
//!
//! Takes raw command paths the writer releases at their reveal positions,
//! decodes them against the [`vocab`](crate::vocab), and applies them:
//! emotes go to the [`CharacterStage`], flow commands steer the writer and
//! the provider history. Unknown paths are logged and dropped; a model that
//! hallucinates a command must never corrupt the performance.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::provider::AiProvider;
use crate::stage::{CharacterStage, InteractionQuery};
use crate::vocab::{ArmPose, ChatCommand, EmoteCommand, Expression, FlowCommand, BOT_CHARACTER};
use crate::writer::ChatWriter;

/// A command that could not be applied.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A flow command arrived while no writer session was live. Flow
    /// commands reshape the session, so this indicates a wiring bug in the
    /// caller rather than bad model output.
    #[error("flow command dispatched with no active writer session")]
    NoSession,
}

/// Applies decoded commands to the stage, the writer, and the provider.
pub struct ChatExecutor {
    stage: Arc<dyn CharacterStage>,
    interaction: Arc<dyn InteractionQuery>,
    provider: Arc<dyn AiProvider>,
}

impl ChatExecutor {
    /// Create an executor over the host seams and the provider whose
    /// history flow commands may reset.
    #[must_use]
    pub fn new(
        stage: Arc<dyn CharacterStage>,
        interaction: Arc<dyn InteractionQuery>,
        provider: Arc<dyn AiProvider>,
    ) -> Self {
        Self {
            stage,
            interaction,
            provider,
        }
    }

    /// Decode and run one raw command path.
    ///
    /// Anything outside the vocabulary is dropped silently; the surrounding
    /// text has already been typed without it, exactly as if the command
    /// never appeared.
    pub async fn run(&self, raw: &str, writer: &mut ChatWriter) -> Result<(), DispatchError> {
        let Some(command) = ChatCommand::decode(raw) else {
            debug!(raw, "dropping unrecognized command");
            return Ok(());
        };
        debug!(command = %command, "running command");

        match command {
            ChatCommand::Emote(emote) => {
                self.apply_emote(&emote);
                Ok(())
            }
            ChatCommand::Flow(flow) => {
                if !writer.has_session() {
                    return Err(DispatchError::NoSession);
                }
                self.run_flow(flow, writer).await;
                Ok(())
            }
        }
    }

    async fn run_flow(&self, flow: FlowCommand, writer: &mut ChatWriter) {
        match flow {
            FlowCommand::ResetChat => {
                info!("model requested a conversation reset");
                self.provider.reset_chat(false);
            }
            FlowCommand::ExitChat => {
                info!("model requested to leave the conversation");
                writer.stop(true).await;
            }
            FlowCommand::SplitMessage => {
                // Hold the cursor, let the user finish reading, then start
                // the next bubble with arms lowered.
                writer.pause();
                writer.wait_for_advance().await;
                self.reset_bot_arms();
                writer.clear();
                writer.resume();
            }
        }
    }

    fn apply_emote(&self, emote: &EmoteCommand) {
        if emote.is_arm() && self.interaction.forbids_arm_motion() {
            debug!(command = %ChatCommand::Emote(*emote), "arm motion suppressed");
            return;
        }
        self.stage.set_emote(BOT_CHARACTER, emote, false);
    }

    // ========================================================================
    // Rig resets
    // ========================================================================

    /// Lower both arms to the resting pose, subject to the same suppression
    /// as model-issued arm commands.
    pub fn reset_bot_arms(&self) {
        self.apply_emote(&EmoteCommand::ArmBoth(ArmPose::DownNormal));
    }

    /// Return the face to neutral.
    pub fn reset_bot_expression(&self) {
        self.apply_emote(&EmoteCommand::Expression(Expression::Clear));
    }

    /// Return the whole rig to its default state.
    pub fn reset_bot_emotes(&self, instant: bool) {
        self.stage.set_default_emote(BOT_CHARACTER, instant);
    }
}
