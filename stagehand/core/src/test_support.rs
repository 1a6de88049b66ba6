//! In-Memory Host Doubles
//!
//! Stub implementations of the [`stage`](crate::stage) traits for unit and
//! integration tests. They record every call and drive the event bus the
//! way a real host would: a [`StubSurface`] fires [`events::READY`] and
//! [`events::FINISHED`] as soon as it opens, so sessions never block on a
//! missing UI.
//!
//! [`events::READY`]: crate::stage::events::READY
//! [`events::FINISHED`]: crate::stage::events::FINISHED

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::stage::{events, CharacterStage, DialogSurface, InteractionQuery, SurfaceId, TranscriptSink};
use crate::sync::EventBus;
use crate::vocab::EmoteCommand;

/// A dialogue surface that records writer calls and acknowledges its own
/// lifecycle events immediately.
pub struct StubSurface {
    id: SurfaceId,
    bus: EventBus,
    text: Mutex<String>,
    visible: AtomicUsize,
    closed: AtomicBool,
}

impl StubSurface {
    /// Create a surface with the given id on a shared bus.
    #[must_use]
    pub fn new(id: SurfaceId, bus: EventBus) -> Self {
        Self {
            id,
            bus,
            text: Mutex::new(String::new()),
            visible: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// The last full text the writer set.
    #[must_use]
    pub fn text(&self) -> String {
        self.text.lock().clone()
    }

    /// The last visible character count the writer set.
    #[must_use]
    pub fn visible(&self) -> usize {
        self.visible.load(Ordering::SeqCst)
    }

    /// Whether the surface has been closed.
    #[must_use]
    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl DialogSurface for StubSurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    fn open(&self) {
        self.closed.store(false, Ordering::SeqCst);
        // A real host fires these asynchronously; firing both here relies on
        // the writer capturing them before open.
        self.bus.fire(events::READY);
        self.bus.fire(events::FINISHED);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn set_text(&self, text: &str) {
        *self.text.lock() = text.to_string();
    }

    fn set_visible_characters(&self, count: usize) {
        self.visible.store(count, Ordering::SeqCst);
    }
}

/// One recorded [`CharacterStage::set_emote`] call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmoteCall {
    /// Character the emote was applied to.
    pub character: String,
    /// The emote itself.
    pub emote: EmoteCommand,
    /// Whether transition animation was skipped.
    pub instant: bool,
}

/// A character rig that records every emote applied to it.
#[derive(Default)]
pub struct RecordingStage {
    emotes: Mutex<Vec<EmoteCall>>,
    defaults: Mutex<Vec<(String, bool)>>,
}

impl RecordingStage {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every emote call so far, in order.
    #[must_use]
    pub fn emotes(&self) -> Vec<EmoteCall> {
        self.emotes.lock().clone()
    }

    /// Every rig reset so far, in order.
    #[must_use]
    pub fn defaults(&self) -> Vec<(String, bool)> {
        self.defaults.lock().clone()
    }
}

impl CharacterStage for RecordingStage {
    fn set_emote(&self, character: &str, emote: &EmoteCommand, instant: bool) {
        self.emotes.lock().push(EmoteCall {
            character: character.to_string(),
            emote: *emote,
            instant,
        });
    }

    fn set_default_emote(&self, character: &str, instant: bool) {
        self.defaults.lock().push((character.to_string(), instant));
    }
}

/// An interaction predicate tests can flip at will.
#[derive(Default)]
pub struct StubInteraction {
    forbid: AtomicBool,
}

impl StubInteraction {
    /// Create a predicate that initially allows arm motion.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow or forbid arm motion from now on.
    pub fn set_forbid(&self, forbid: bool) {
        self.forbid.store(forbid, Ordering::SeqCst);
    }
}

impl InteractionQuery for StubInteraction {
    fn forbids_arm_motion(&self) -> bool {
        self.forbid.load(Ordering::SeqCst)
    }
}

/// A transcript that collects lines in memory.
#[derive(Default)]
pub struct VecTranscript {
    lines: Mutex<Vec<(String, String)>>,
}

impl VecTranscript {
    /// Create an empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All `(speaker, text)` lines so far.
    #[must_use]
    pub fn lines(&self) -> Vec<(String, String)> {
        self.lines.lock().clone()
    }
}

impl TranscriptSink for VecTranscript {
    fn append(&self, speaker: &str, text: &str) {
        self.lines.lock().push((speaker.to_string(), text.to_string()));
    }
}

/// Spawn a task that fires [`events::ADVANCE`] every `period`, standing in
/// for a user who acknowledges each bubble. Abort the handle when done.
pub fn advance_pump(bus: EventBus, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            bus.fire(events::ADVANCE);
        }
    })
}
