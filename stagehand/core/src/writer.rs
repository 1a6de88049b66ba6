//! Position-Synchronized Writer
//!
//! Reveals buffered reply text into a [`DialogSurface`] one character at a
//! time, and holds back commands until the reveal cursor reaches the exact
//! character position where each command appeared in the stream:
//!
//! ```text
//!   append ──▶ [ buffer .. text_start .. text_end .. len ]
//!                             └── visible window ──┘
//!   enqueue ─▶ pending: FIFO of (position, raw command)
//!   tick ────▶ text_end += 1, surface shows one more character
//!   pop_due ─▶ front command whose position <= text_end
//! ```
//!
//! The writer owns buffer positions and timing only; command semantics live
//! in [`ChatExecutor`]. A session runs from [`ChatWriter::prepare`] to
//! [`ChatWriter::flush`] (or a hard [`ChatWriter::stop`]); outside a session
//! every mutation is a no-op.
//!
//! [`ChatExecutor`]: crate::executor::ChatExecutor

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Interval;
use tracing::{debug, trace};

use crate::stage::{events, DialogSurface, SurfaceId, TranscriptSink};
use crate::sync::{EventBus, Gate};

/// Writer tuning knobs.
#[derive(Clone, Debug)]
pub struct WriterConfig {
    /// Characters revealed per second.
    pub reveal_rate: f64,
    /// Speaker name finished bubbles are committed under.
    pub speaker: String,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            reveal_rate: 30.0,
            speaker: "Bot".to_string(),
        }
    }
}

/// Coarse writer state, mainly for logging and assertions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriterPhase {
    /// No session.
    Idle,
    /// Session open, everything buffered so far is revealed.
    Ready,
    /// Unrevealed characters remain.
    Revealing,
    /// Reveal suspended while a command runs.
    Paused,
    /// Hard-stopped; stays until the next [`ChatWriter::prepare`].
    Stopped,
}

/// Outcome of [`ChatWriter::enqueue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub enum EnqueueOutcome {
    /// The reveal cursor already passed the command's position; the caller
    /// must run it now (pausing the writer around the run).
    Immediate,
    /// Held in the pending queue until the cursor reaches its position.
    Queued,
    /// No session, or the session is stopped; the command is discarded.
    Dropped,
}

#[derive(Debug)]
struct PendingCommand {
    /// Buffer position the command must wait for.
    position: usize,
    raw: String,
}

struct WriterSession {
    /// Every literal character appended this session, committed or not.
    buffer: Vec<char>,
    /// Start of the current bubble within `buffer`.
    text_start: usize,
    /// Reveal cursor; characters in `text_start..text_end` are on screen.
    text_end: usize,
    /// Characters visible in the current bubble. Always
    /// `text_end - text_start`.
    visible_count: usize,
    pending: VecDeque<PendingCommand>,
    paused: bool,
    stopped: bool,
    interval: Interval,
}

impl WriterSession {
    fn new(period: Duration) -> Self {
        Self {
            buffer: Vec::new(),
            text_start: 0,
            text_end: 0,
            visible_count: 0,
            pending: VecDeque::new(),
            paused: false,
            stopped: false,
            interval: tokio::time::interval(period),
        }
    }
}

/// Reveals reply text into a dialogue surface in sync with command
/// positions.
pub struct ChatWriter {
    surface: Arc<dyn DialogSurface>,
    transcript: Arc<dyn TranscriptSink>,
    bus: EventBus,
    gate: Gate<SurfaceId>,
    reveal_period: Duration,
    speaker: String,
    session: Option<WriterSession>,
    /// Set by a hard stop, cleared by the next `prepare`.
    stopped_latch: bool,
}

impl ChatWriter {
    /// Create a writer over a surface and transcript.
    #[must_use]
    pub fn new(
        surface: Arc<dyn DialogSurface>,
        transcript: Arc<dyn TranscriptSink>,
        bus: EventBus,
        gate: Gate<SurfaceId>,
        config: &WriterConfig,
    ) -> Self {
        Self {
            surface,
            transcript,
            bus,
            gate,
            reveal_period: Duration::from_secs_f64(1.0 / config.reveal_rate),
            speaker: config.speaker.clone(),
            session: None,
            stopped_latch: false,
        }
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    /// Open a fresh session: reset leftover state, lock the surface's own
    /// input handling, open the surface, and wait for it to become ready.
    ///
    /// [`events::READY`] and [`events::FINISHED`] are captured up front, so
    /// a surface that fires either before this task gets to wait does not
    /// deadlock the session.
    pub async fn prepare(&mut self) {
        self.reset();
        self.stopped_latch = false;
        debug!("preparing writer session");

        self.bus.capture(events::READY);
        self.bus.capture(events::FINISHED);
        self.gate.lock(self.surface.id(), 0);
        self.surface.open();
        self.bus.wait_for(events::READY).await;

        self.session = Some(WriterSession::new(self.reveal_period));
        self.surface.set_text("");
        self.surface.set_visible_characters(0);
    }

    /// Finish the session: commit whatever the current bubble shows, hand
    /// input handling back to the surface, and wait for its teardown.
    pub async fn flush(&mut self) {
        if self.session.is_none() {
            return;
        }
        debug!("flushing writer session");
        self.clear();
        self.gate.unlock(&self.surface.id());
        self.bus.wait_for(events::FINISHED).await;
        self.reset();
    }

    /// Hard-stop the session, discarding unrevealed text and pending
    /// commands. With `wait_for_advance` the stop waits for one user
    /// acknowledgement first, so the last revealed text can be read.
    ///
    /// The writer stays [`WriterPhase::Stopped`] until the next `prepare`.
    pub async fn stop(&mut self, wait_for_advance: bool) {
        {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            if session.stopped {
                return;
            }
            session.stopped = true;
        }
        debug!(wait_for_advance, "stopping writer");
        if wait_for_advance {
            self.bus.wait_for(events::ADVANCE).await;
        }
        self.surface.close();
        self.reset();
        self.stopped_latch = true;
    }

    /// Drop all session state and release every externally visible hold:
    /// the gate lock and both captured events. Safe to call at any time.
    fn reset(&mut self) {
        self.session = None;
        self.gate.unlock(&self.surface.id());
        self.bus.release_capture(events::READY);
        self.bus.release_capture(events::FINISHED);
    }

    // ========================================================================
    // Buffering
    // ========================================================================

    /// Append literal text to the reveal buffer. No-op outside a live
    /// session.
    pub fn append(&mut self, text: &str) {
        {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            if session.stopped {
                return;
            }
            session.buffer.extend(text.chars());
        }
        self.sync_surface();
    }

    /// Register a command at the current end of the buffer.
    pub fn enqueue(&mut self, raw: &str) -> EnqueueOutcome {
        let Some(session) = self.session.as_mut() else {
            return EnqueueOutcome::Dropped;
        };
        if session.stopped {
            return EnqueueOutcome::Dropped;
        }
        let position = session.buffer.len();
        if session.text_end >= position {
            trace!(raw, position, "command position already revealed");
            return EnqueueOutcome::Immediate;
        }
        trace!(raw, position, "command queued");
        session.pending.push_back(PendingCommand {
            position,
            raw: raw.to_string(),
        });
        EnqueueOutcome::Queued
    }

    // ========================================================================
    // Reveal loop
    // ========================================================================

    /// Wait one reveal period, then reveal the next character if the writer
    /// is neither paused nor stopped nor caught up.
    ///
    /// Pends forever outside a session, so it can sit in a `select!` arm
    /// unconditionally. Cancel-safe.
    pub async fn tick(&mut self) {
        match self.session.as_mut() {
            Some(session) => {
                session.interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
        self.reveal_next();
    }

    fn reveal_next(&mut self) {
        let visible = {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            if session.paused || session.stopped || session.text_end >= session.buffer.len() {
                return;
            }
            session.text_end += 1;
            session.visible_count += 1;
            session.visible_count
        };
        self.surface.set_visible_characters(visible);
    }

    /// Pop the front pending command if the reveal cursor has reached its
    /// position. Call repeatedly after each tick; several commands can share
    /// one position.
    pub fn pop_due(&mut self) -> Option<String> {
        let session = self.session.as_mut()?;
        if session.stopped {
            return None;
        }
        match session.pending.front() {
            Some(cmd) if cmd.position <= session.text_end => {
                session.pending.pop_front().map(|cmd| cmd.raw)
            }
            _ => None,
        }
    }

    /// Suspend the reveal. Ticks keep passing but reveal nothing.
    pub fn pause(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.paused = true;
        }
    }

    /// Resume a paused reveal.
    pub fn resume(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.paused = false;
        }
    }

    // ========================================================================
    // Bubble control
    // ========================================================================

    /// Commit the visible bubble to the transcript and start the next bubble
    /// empty. Pending command positions are absolute and unaffected.
    pub fn clear(&mut self) {
        let committed = {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            let shown: String = session.buffer
                [session.text_start..session.text_start + session.visible_count]
                .iter()
                .collect();
            session.text_start = session.text_end;
            session.visible_count = 0;
            shown
        };
        if !committed.is_empty() {
            self.transcript.append(&self.speaker, &committed);
        }
        self.sync_surface();
    }

    /// Wait for one user acknowledgement of the current text.
    pub async fn wait_for_advance(&self) {
        self.bus.wait_for(events::ADVANCE).await;
    }

    fn sync_surface(&self) {
        if let Some(session) = &self.session {
            let window: String = session.buffer[session.text_start..].iter().collect();
            self.surface.set_text(&window);
            self.surface.set_visible_characters(session.visible_count);
        }
    }

    // ========================================================================
    // Observation
    // ========================================================================

    /// Current coarse phase.
    #[must_use]
    pub fn phase(&self) -> WriterPhase {
        match &self.session {
            None if self.stopped_latch => WriterPhase::Stopped,
            None => WriterPhase::Idle,
            Some(session) if session.stopped => WriterPhase::Stopped,
            Some(session) if session.paused => WriterPhase::Paused,
            Some(session) if session.text_end < session.buffer.len() => WriterPhase::Revealing,
            Some(_) => WriterPhase::Ready,
        }
    }

    /// Whether a session is live.
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Whether the writer was hard-stopped since the last `prepare`.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped_latch
            || self
                .session
                .as_ref()
                .is_some_and(|session| session.stopped)
    }

    /// Whether every buffered character has been revealed. Trivially true
    /// outside a session.
    #[must_use]
    pub fn all_revealed(&self) -> bool {
        self.session
            .as_ref()
            .map_or(true, |session| session.text_end >= session.buffer.len())
    }

    /// Whether the current bubble has no text yet, revealed or not.
    #[must_use]
    pub fn window_is_empty(&self) -> bool {
        self.session
            .as_ref()
            .map_or(true, |session| session.buffer.len() == session.text_start)
    }

    /// The text currently visible in the bubble.
    #[must_use]
    pub fn visible_text(&self) -> String {
        self.session.as_ref().map_or_else(String::new, |session| {
            session.buffer[session.text_start..session.text_start + session.visible_count]
                .iter()
                .collect()
        })
    }

    /// Number of commands still waiting for their position.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.session
            .as_ref()
            .map_or(0, |session| session.pending.len())
    }
}
