//! Incremental Stream Lexer
//!
//! Splits a chunked reply stream into literal text and `#!` command tokens,
//! feeding both into the [`ChatWriter`] so commands stay anchored to the
//! exact character position where they appeared:
//!
//! ```text
//!   chunk ─▶ per char ─▶ literal  ─▶ writer.append (1 char)
//!                     └▶ command ─▶ writer.enqueue (at current position)
//! ```
//!
//! The lexer carries its state across chunk boundaries, so a sentinel,
//! a command token, or a CRLF pair split between two chunks lexes exactly
//! as it would in one piece. Whitespace outside commands is collapsed: a
//! run of any mix of spaces, tabs, and newlines becomes one `'\n'` if the
//! run contained a line break, else one `' '`, and the separator is only
//! emitted once the next literal character arrives. Runs at the start of a
//! bubble or at the end of the stream therefore vanish.

use tracing::trace;

use crate::executor::{ChatExecutor, DispatchError};
use crate::vocab::{ChatCommand, EmoteCommand, EXPRESSION_CLEAR};
use crate::writer::{ChatWriter, EnqueueOutcome};

/// Chunk-boundary-tolerant lexer over one reply stream.
#[derive(Debug, Default)]
pub struct ChatParser {
    /// A lone `'#'` was seen; the next character decides whether it opens a
    /// command or gets emitted as literal text.
    pending_sentinel: bool,
    /// Accumulating a command token.
    in_command: bool,
    token: String,
    /// A whitespace run is waiting for the next literal character.
    sep_pending: bool,
    /// The pending run contained a line break.
    sep_has_newline: bool,
    /// A `'\r'` was just processed; a directly following `'\n'` is part of
    /// the same line break and gets swallowed.
    swallow_lf: bool,
}

impl ChatParser {
    /// Create a lexer in its initial state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a turn: reset lexer state, lower the character's arms, and open
    /// a writer session.
    pub async fn prepare(&mut self, writer: &mut ChatWriter, executor: &ChatExecutor) {
        *self = Self::default();
        executor.reset_bot_arms();
        writer.prepare().await;
    }

    /// Lex one stream chunk. Chunk boundaries carry no meaning; feeding a
    /// reply one byte at a time produces the same result as one big chunk.
    pub async fn parse(
        &mut self,
        chunk: &str,
        writer: &mut ChatWriter,
        executor: &ChatExecutor,
    ) -> Result<(), DispatchError> {
        trace!(len = chunk.len(), "lexing chunk");
        for c in chunk.chars() {
            self.feed(c, writer, executor).await?;
        }
        Ok(())
    }

    /// End of stream: close a still-open token, emit a dangling `'#'`, and
    /// drop any trailing separator.
    pub async fn flush(
        &mut self,
        writer: &mut ChatWriter,
        executor: &ChatExecutor,
    ) -> Result<(), DispatchError> {
        if self.in_command {
            self.close_token(writer, executor).await?;
        }
        if self.pending_sentinel {
            self.pending_sentinel = false;
            self.emit('#', writer);
        }
        *self = Self::default();
        Ok(())
    }

    // ========================================================================
    // Per-character lexing
    // ========================================================================

    async fn feed(
        &mut self,
        c: char,
        writer: &mut ChatWriter,
        executor: &ChatExecutor,
    ) -> Result<(), DispatchError> {
        if self.swallow_lf {
            self.swallow_lf = false;
            if c == '\n' {
                return Ok(());
            }
        }
        if c == '\r' {
            // Treat the carriage return as the line break itself and swallow
            // a directly following '\n'.
            self.swallow_lf = true;
            return self.feed_normalized('\n', writer, executor).await;
        }
        let c = if c == '\t' { ' ' } else { c };
        self.feed_normalized(c, writer, executor).await
    }

    async fn feed_normalized(
        &mut self,
        c: char,
        writer: &mut ChatWriter,
        executor: &ChatExecutor,
    ) -> Result<(), DispatchError> {
        if self.pending_sentinel {
            self.pending_sentinel = false;
            if c == '!' {
                self.in_command = true;
                self.token.clear();
                return Ok(());
            }
            // Just a literal hash after all.
            self.emit('#', writer);
        }

        if self.in_command {
            if c == '#' {
                self.close_token(writer, executor).await?;
                self.pending_sentinel = true;
            } else if c.is_whitespace() {
                self.close_token(writer, executor).await?;
                self.sep_pending = true;
                self.sep_has_newline |= c == '\n';
            } else {
                self.token.push(c);
            }
            return Ok(());
        }

        if c == '#' {
            self.pending_sentinel = true;
            return Ok(());
        }

        if c.is_whitespace() {
            self.sep_pending = true;
            self.sep_has_newline |= c == '\n';
            return Ok(());
        }

        self.emit(c, writer);
        Ok(())
    }

    /// Emit one literal character, preceded by the pending separator unless
    /// the bubble is still empty.
    fn emit(&mut self, c: char, writer: &mut ChatWriter) {
        if self.sep_pending {
            let sep = if self.sep_has_newline { '\n' } else { ' ' };
            self.sep_pending = false;
            self.sep_has_newline = false;
            if !writer.window_is_empty() {
                let mut buf = [0u8; 4];
                writer.append(sep.encode_utf8(&mut buf));
            }
        }
        let mut buf = [0u8; 4];
        writer.append(c.encode_utf8(&mut buf));
    }

    /// Close the current command token and hand it to the writer at the
    /// current buffer position. Primary expressions get a synthetic
    /// expression reset queued in front of them, so moods replace each
    /// other instead of blending.
    async fn close_token(
        &mut self,
        writer: &mut ChatWriter,
        executor: &ChatExecutor,
    ) -> Result<(), DispatchError> {
        self.in_command = false;
        let token = std::mem::take(&mut self.token);
        if token.is_empty() {
            return Ok(());
        }
        trace!(%token, "command token closed");

        if let Some(ChatCommand::Emote(EmoteCommand::Expression(e))) = ChatCommand::decode(&token) {
            if e.is_primary() {
                self.dispatch(EXPRESSION_CLEAR, writer, executor).await?;
            }
        }
        self.dispatch(&token, writer, executor).await
    }

    /// Enqueue a command; if its position is already revealed, run it right
    /// now with the reveal paused.
    async fn dispatch(
        &mut self,
        raw: &str,
        writer: &mut ChatWriter,
        executor: &ChatExecutor,
    ) -> Result<(), DispatchError> {
        match writer.enqueue(raw) {
            EnqueueOutcome::Queued | EnqueueOutcome::Dropped => Ok(()),
            EnqueueOutcome::Immediate => {
                writer.pause();
                let result = executor.run(raw, writer).await;
                writer.resume();
                result
            }
        }
    }
}
