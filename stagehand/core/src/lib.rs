//! # stagehand-core
//!
//! Turns a chunked LLM reply stream into a live performance: text revealed
//! one character at a time into a dialogue surface, with inline
//! `#!target.slot.item` commands lifted out of the text and executed at the
//! exact moment their position scrolls into view.
//!
//! ```text
//!                    ┌────────────┐ chunks ┌────────────┐
//!   user input ────▶ │ AiAdapter  │ ─────▶ │ ChatParser │
//!                    │ (provider) │        │  (lexer)   │
//!                    └────────────┘        └─────┬──────┘
//!                                     text │     │ commands
//!                                          ▼     ▼
//!                    ┌───────────────────────────────────┐
//!                    │ ChatWriter                        │
//!                    │  buffer · reveal cursor · queue   │
//!                    └───────┬──────────────────┬────────┘
//!                   reveal   │                  │ due commands
//!                            ▼                  ▼
//!                    ┌──────────────┐   ┌──────────────┐
//!                    │ DialogSurface│   │ ChatExecutor │──▶ CharacterStage
//!                    │    (host)    │   │ (dispatcher) │──▶ flow control
//!                    └──────────────┘   └──────────────┘
//! ```
//!
//! The host supplies the widgets and the character rig through the traits
//! in [`stage`]; everything else is engine-agnostic. [`chat::ChatEngine`]
//! drives a whole conversation; the lower layers are public for hosts that
//! need finer control.

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod adapter;
pub mod chat;
pub mod config;
pub mod executor;
pub mod parser;
pub mod provider;
pub mod stage;
pub mod sync;
pub mod test_support;
pub mod vocab;
pub mod writer;

pub use adapter::AiAdapter;
pub use chat::{ChatEngine, TurnOutcome};
pub use config::{ConfigError, StagehandConfig};
pub use executor::{ChatExecutor, DispatchError};
pub use parser::ChatParser;
pub use provider::{AiProvider, ChatHistory, ChatMessage, Role};
pub use stage::{CharacterStage, DialogSurface, InteractionQuery, SurfaceId, TranscriptSink};
pub use sync::{EventBus, Gate};
pub use vocab::{ArmPose, ChatCommand, EmoteCommand, Expression, FlowCommand};
pub use writer::{ChatWriter, EnqueueOutcome, WriterConfig, WriterPhase};
