//! Host Integration Seams
//!
//! The crate never talks to a concrete UI toolkit or game engine. Everything
//! it needs from the embedding host comes through the four traits here:
//!
//! ```text
//!   ChatWriter ──▶ DialogSurface      (text widget: set text, reveal count)
//!   ChatExecutor ─▶ CharacterStage    (rig: expressions, arm poses)
//!               └▶ InteractionQuery   (may arms move right now?)
//!   both ────────▶ TranscriptSink     (finished bubbles, user lines)
//! ```
//!
//! Hosts fire the events in [`events`] on the shared [`EventBus`] to report
//! surface lifecycle and user acknowledgement.
//!
//! [`EventBus`]: crate::sync::EventBus

use crate::vocab::EmoteCommand;

/// Identifies one dialogue surface to the gate that suppresses its
/// default input handling.
pub type SurfaceId = u64;

/// Bus event names making up the host contract.
pub mod events {
    /// The surface finished opening and can accept text.
    pub const READY: &str = "dialog-ready";

    /// The user acknowledged the current text (click, key press).
    pub const ADVANCE: &str = "dialog-advance";

    /// The surface finished its teardown after the final bubble.
    pub const FINISHED: &str = "dialog-finished";
}

/// A text widget the writer reveals into.
///
/// `set_text` and `set_visible_characters` are called from the reveal loop
/// at the configured character rate; implementations should be cheap.
pub trait DialogSurface: Send + Sync {
    /// Stable id of this surface, used as the gate key.
    fn id(&self) -> SurfaceId;

    /// Open or focus the widget. The host fires [`events::READY`] once the
    /// widget can accept text, possibly before this returns.
    fn open(&self);

    /// Close the widget at the end of a conversation.
    fn close(&self);

    /// Replace the widget's full text. Revealed count is unchanged.
    fn set_text(&self, text: &str);

    /// Set how many leading characters of the text are visible.
    fn set_visible_characters(&self, count: usize);
}

/// The character rig emote commands apply to.
pub trait CharacterStage: Send + Sync {
    /// Apply one emote to a character. `instant` skips transition animation.
    fn set_emote(&self, character: &str, emote: &EmoteCommand, instant: bool);

    /// Return a character's whole rig to its default state.
    fn set_default_emote(&self, character: &str, instant: bool);
}

/// Synchronous host predicate consulted before arm motion.
pub trait InteractionQuery: Send + Sync {
    /// Whether arm emotes must be suppressed right now, for example while
    /// the character is physically held.
    fn forbids_arm_motion(&self) -> bool;
}

/// Destination for finished dialogue lines.
pub trait TranscriptSink: Send + Sync {
    /// Record one finished line under a speaker name.
    fn append(&self, speaker: &str, text: &str);
}
