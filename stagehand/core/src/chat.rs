//! Conversation Engine
//!
//! Ties the whole pipeline together and drives one turn at a time on a
//! single task:
//!
//! ```text
//!   user input ─▶ AiAdapter.stream_message ─▶ chunks
//!                                              │
//!        ┌── select! ─────────────────────────┬┘
//!        │ chunk arrived  ─▶ ChatParser.parse │
//!        │ writer tick    ─▶ reveal + run due commands
//!        └────────────────────────────────────┘
//! ```
//!
//! The lexer is the only appender and the engine the only drainer, so
//! buffer positions and the command queue never race. A turn ends when the
//! stream closes and everything is revealed, or earlier on a hard stop.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::adapter::AiAdapter;
use crate::config::{ConfigError, StagehandConfig};
use crate::executor::{ChatExecutor, DispatchError};
use crate::parser::ChatParser;
use crate::stage::{CharacterStage, DialogSurface, InteractionQuery, SurfaceId, TranscriptSink};
use crate::sync::{EventBus, Gate};
use crate::writer::{ChatWriter, WriterConfig};

/// Speaker name user lines are recorded under.
pub const USER_SPEAKER: &str = "You";

/// How one call to [`ChatEngine::process_user_input`] ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// A full reply was performed.
    Completed,
    /// The conversation ended, by local command or `ExitChat`.
    Exited,
    /// The history was wiped by the local `reset` command.
    Reset,
    /// The rig was reset by the local `clear` command.
    Cleared,
    /// Blank input; nothing happened.
    Ignored,
}

enum Step {
    Chunk(Option<String>),
    Tick,
}

/// One conversation with one character.
pub struct ChatEngine {
    adapter: AiAdapter,
    parser: ChatParser,
    writer: ChatWriter,
    executor: ChatExecutor,
    transcript: Arc<dyn TranscriptSink>,
    active: bool,
}

impl ChatEngine {
    /// Wire up the pipeline over the host seams.
    pub fn new(
        config: &StagehandConfig,
        surface: Arc<dyn DialogSurface>,
        stage: Arc<dyn CharacterStage>,
        interaction: Arc<dyn InteractionQuery>,
        transcript: Arc<dyn TranscriptSink>,
        bus: EventBus,
        gate: Gate<SurfaceId>,
    ) -> Result<Self, ConfigError> {
        let adapter = AiAdapter::new(config)?;
        let writer_config = WriterConfig {
            reveal_rate: config.reveal_rate,
            speaker: config.bot_name.clone(),
        };
        let writer = ChatWriter::new(surface, transcript.clone(), bus, gate, &writer_config);
        let executor = ChatExecutor::new(stage, interaction, adapter.provider());

        Ok(Self {
            adapter,
            parser: ChatParser::new(),
            writer,
            executor,
            transcript,
            active: false,
        })
    }

    /// Begin the conversation and warm the backend up.
    pub async fn start(&mut self) {
        self.active = true;
        self.adapter.warm_up().await;
    }

    /// Whether the conversation is still going.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// End the conversation from the host side.
    pub async fn stop(&mut self, wait_for_advance: bool) {
        self.writer.stop(wait_for_advance).await;
        self.executor.reset_bot_emotes(false);
        self.active = false;
    }

    /// Handle one line of user input: local commands first, blank input
    /// ignored, anything else becomes a full model turn.
    pub async fn process_user_input(&mut self, input: &str) -> Result<TurnOutcome, DispatchError> {
        match input.trim().to_lowercase().as_str() {
            "" => return Ok(TurnOutcome::Ignored),
            "exit" => {
                info!("user left the conversation");
                self.stop(false).await;
                return Ok(TurnOutcome::Exited);
            }
            "reset" => {
                info!("user wiped the conversation history");
                self.adapter.reset_chat(false);
                return Ok(TurnOutcome::Reset);
            }
            "clear" => {
                self.executor.reset_bot_emotes(false);
                return Ok(TurnOutcome::Cleared);
            }
            _ => {}
        }

        self.transcript.append(USER_SPEAKER, input);
        self.run_turn(input).await
    }

    async fn run_turn(&mut self, input: &str) -> Result<TurnOutcome, DispatchError> {
        debug!("starting model turn");
        self.parser
            .prepare(&mut self.writer, &self.executor)
            .await;
        let mut chunks = self.adapter.stream_message(input).await;

        let result = self.drive(&mut chunks).await;
        if result.is_err() {
            // Leave no holds behind on the failure path.
            self.writer.stop(false).await;
        }
        result?;

        if self.writer.is_stopped() {
            self.executor.reset_bot_emotes(false);
            self.active = false;
            return Ok(TurnOutcome::Exited);
        }
        Ok(TurnOutcome::Completed)
    }

    /// Interleave stream chunks with reveal ticks until the stream closes,
    /// then finish the reveal and flush.
    async fn drive(&mut self, chunks: &mut mpsc::Receiver<String>) -> Result<(), DispatchError> {
        loop {
            if self.writer.is_stopped() {
                return Ok(());
            }
            let step = tokio::select! {
                chunk = chunks.recv() => Step::Chunk(chunk),
                () = self.writer.tick() => Step::Tick,
            };
            match step {
                Step::Chunk(Some(chunk)) => {
                    self.parser
                        .parse(&chunk, &mut self.writer, &self.executor)
                        .await?;
                }
                Step::Chunk(None) => break,
                Step::Tick => self.drain_due().await?,
            }
        }
        self.finish_turn().await
    }

    async fn finish_turn(&mut self) -> Result<(), DispatchError> {
        self.parser
            .flush(&mut self.writer, &self.executor)
            .await?;
        while !self.writer.all_revealed() && !self.writer.is_stopped() {
            self.writer.tick().await;
            self.drain_due().await?;
        }
        // Commands anchored to the very end of the reply.
        self.drain_due().await?;
        if !self.writer.is_stopped() {
            self.writer.flush().await;
        }
        Ok(())
    }

    async fn drain_due(&mut self) -> Result<(), DispatchError> {
        while let Some(raw) = self.writer.pop_due() {
            self.executor.run(&raw, &mut self.writer).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingStage, StubInteraction, StubSurface, VecTranscript};
    use pretty_assertions::assert_eq;

    fn engine() -> (ChatEngine, Arc<RecordingStage>, Arc<VecTranscript>) {
        let bus = EventBus::new();
        let surface = Arc::new(StubSurface::new(1, bus.clone()));
        let stage = Arc::new(RecordingStage::new());
        let interaction = Arc::new(StubInteraction::new());
        let transcript = Arc::new(VecTranscript::new());

        let mut config = StagehandConfig::default();
        config.provider.kind = "echo".to_string();

        let engine = ChatEngine::new(
            &config,
            surface,
            stage.clone(),
            interaction,
            transcript.clone(),
            bus,
            Gate::new(),
        )
        .unwrap();
        (engine, stage, transcript)
    }

    #[tokio::test(start_paused = true)]
    async fn blank_input_is_ignored() {
        let (mut engine, _stage, transcript) = engine();
        engine.start().await;
        let outcome = engine.process_user_input("   ").await.unwrap();
        assert_eq!(outcome, TurnOutcome::Ignored);
        assert!(transcript.lines().is_empty());
        assert!(engine.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn local_exit_ends_the_conversation() {
        let (mut engine, stage, _transcript) = engine();
        engine.start().await;
        let outcome = engine.process_user_input("Exit").await.unwrap();
        assert_eq!(outcome, TurnOutcome::Exited);
        assert!(!engine.is_active());
        // Leaving resets the rig.
        assert_eq!(stage.defaults().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn local_clear_resets_the_rig_only() {
        let (mut engine, stage, _transcript) = engine();
        engine.start().await;
        let outcome = engine.process_user_input("clear").await.unwrap();
        assert_eq!(outcome, TurnOutcome::Cleared);
        assert!(engine.is_active());
        assert_eq!(stage.defaults().len(), 1);
    }
}
