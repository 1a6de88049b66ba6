//! Scripted Backend
//!
//! Canned replies keyed by the user's input, one per feature worth
//! demonstrating: expressions, arms, whitespace soup, sentinels split
//! across chunk boundaries, and each flow command. Anything else falls
//! through to plain echo.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::echo::EchoProvider;
use super::traits::AiProvider;

/// A demo backend with one canned reply per vocabulary feature.
#[derive(Default)]
pub struct ScriptedProvider {
    echo: EchoProvider,
}

/// Script chunks are streamed verbatim, so a script can deliberately break
/// a sentinel or a command token across chunk boundaries.
fn script(message: &str) -> Option<&'static [&'static str]> {
    Some(match message.trim() {
        "1" => &[
            "#!bot.Expression.Happy Here's a happy face! ",
            "#!bot.Expression.VeryAngry Now I'm furious. ",
            "#!bot.Expression.Blush A little blush on top. ",
            "#!bot.Expression.NoBlush #!bot.Expression.Clear All calm again.",
        ],
        "2" => &[
            "#!bot.ArmBoth.UpHi Hello there! ",
            "#!bot.ArmL.UpPoint Let me make a point. ",
            "#!bot.ArmR.DownClenched Grr. ",
            "#!bot.ArmBoth.DownNormal At ease.",
        ],
        "3" => &[
            "Too   many\t\tspaces, \n\n\n blank    lines, \r\nand\rstray returns.",
        ],
        "4" => &["A sentinel split acro", "ss chunks: #", "!bot.Expre", "ssion.Shock see?"],
        "5" => &["This is farewell. #!flow.ExitChat This text is never shown."],
        "6" => &["Forget everything. #!flow.ResetChat The history is gone now."],
        "7" => &["First bubble ends here. #!flow.SplitMessage Second bubble starts fresh."],
        _ => return None,
    })
}

impl ScriptedProvider {
    /// Create a scripted backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AiProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn set_system_message(&self, content: &str) {
        self.echo.set_system_message(content);
    }

    fn reset_chat(&self, reset_system: bool) {
        self.echo.reset_chat(reset_system);
    }

    async fn send_message(&self, message: &str) -> String {
        match script(message) {
            Some(chunks) => chunks.concat(),
            None => self.echo.send_message(message).await,
        }
    }

    async fn stream_message(&self, message: &str) -> mpsc::Receiver<String> {
        match script(message) {
            Some(chunks) => self
                .echo
                .stream_chunks(chunks.iter().map(|chunk| (*chunk).to_string()).collect()),
            None => self.echo.stream_message(message).await,
        }
    }
}
