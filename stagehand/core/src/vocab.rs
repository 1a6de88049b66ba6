//! Stage Direction Vocabulary
//!
//! The closed set of inline commands a model may embed in its replies.
//! Commands travel on the wire as `#!bot.<slot>.<item>` emote tokens or
//! `#!flow.<action>` conversation directives; this module owns both
//! directions of that mapping:
//!
//! - [`ChatCommand::decode`] turns a dotted path into a typed command, or
//!   `None` for anything outside the vocabulary.
//! - [`ChatCommand::wire`] renders the sentinel-prefixed token used when
//!   teaching the model its vocabulary in the system message.
//!
//! Everything downstream of decoding works on these enums; raw strings never
//! reach the stage.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Token prefix that switches the parser from literal text to a command.
pub const SENTINEL: &str = "#!";

/// The only character the vocabulary can currently direct.
pub const BOT_CHARACTER: &str = "bot";

/// Wire category for conversation control directives, which target the
/// turn rather than a character.
pub const FLOW_CATEGORY: &str = "flow";

/// Wire path of the synthetic expression reset inserted before every
/// primary expression change.
pub const EXPRESSION_CLEAR: &str = "bot.Expression.Clear";

// ============================================================================
// Emotes
// ============================================================================

/// Facial expression states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expression {
    /// Deep sadness.
    VerySad,
    /// Mild sadness.
    Sad,
    /// Mild happiness.
    Happy,
    /// Open joy.
    VeryHappy,
    /// Mild surprise.
    Shock,
    /// Strong surprise.
    VeryShock,
    /// Mild anger.
    Angry,
    /// Strong anger.
    VeryAngry,
    /// Light blush overlay.
    Blush,
    /// Heavy blush overlay.
    VeryBlush,
    /// Return to the neutral face.
    Clear,
}

impl Expression {
    /// The eight mood expressions the model picks from. Blush overlays and
    /// [`Expression::Clear`] are deliberately not in this list.
    pub const PRIMARY: [Self; 8] = [
        Self::VerySad,
        Self::Sad,
        Self::Happy,
        Self::VeryHappy,
        Self::Shock,
        Self::VeryShock,
        Self::Angry,
        Self::VeryAngry,
    ];

    /// Blush overlays, stacking on top of whatever mood is shown.
    pub const BLUSH: [Self; 2] = [Self::Blush, Self::VeryBlush];

    /// Whether this is one of the eight mood expressions.
    ///
    /// Only primary expressions get an automatic reset inserted before them;
    /// overlays and the reset itself do not.
    #[must_use]
    pub fn is_primary(self) -> bool {
        Self::PRIMARY.contains(&self)
    }

    fn item_name(self) -> &'static str {
        match self {
            Self::VerySad => "VerySad",
            Self::Sad => "Sad",
            Self::Happy => "Happy",
            Self::VeryHappy => "VeryHappy",
            Self::Shock => "Shock",
            Self::VeryShock => "VeryShock",
            Self::Angry => "Angry",
            Self::VeryAngry => "VeryAngry",
            Self::Blush => "Blush",
            Self::VeryBlush => "VeryBlush",
            Self::Clear => "Clear",
        }
    }

    fn from_item(item: &str) -> Option<Self> {
        Some(match item {
            "VerySad" => Self::VerySad,
            "Sad" => Self::Sad,
            "Happy" => Self::Happy,
            "VeryHappy" => Self::VeryHappy,
            "Shock" => Self::Shock,
            "VeryShock" => Self::VeryShock,
            "Angry" => Self::Angry,
            "VeryAngry" => Self::VeryAngry,
            "Blush" => Self::Blush,
            "VeryBlush" => Self::VeryBlush,
            "Clear" => Self::Clear,
            _ => return None,
        })
    }
}

/// Arm poses, applicable to either arm alone or both together.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArmPose {
    /// Raised, index finger pointing.
    UpPoint,
    /// Raised in a greeting wave.
    UpHi,
    /// Raised in a lecturing gesture.
    UpLecture,
    /// Resting at the side.
    DownNormal,
    /// Lowered with a clenched fist.
    DownClenched,
}

impl ArmPose {
    /// Every pose, in prompt order.
    pub const ALL: [Self; 5] = [
        Self::UpPoint,
        Self::UpHi,
        Self::UpLecture,
        Self::DownNormal,
        Self::DownClenched,
    ];

    fn item_name(self) -> &'static str {
        match self {
            Self::UpPoint => "UpPoint",
            Self::UpHi => "UpHi",
            Self::UpLecture => "UpLecture",
            Self::DownNormal => "DownNormal",
            Self::DownClenched => "DownClenched",
        }
    }

    fn from_item(item: &str) -> Option<Self> {
        Some(match item {
            "UpPoint" => Self::UpPoint,
            "UpHi" => Self::UpHi,
            "UpLecture" => Self::UpLecture,
            "DownNormal" => Self::DownNormal,
            "DownClenched" => Self::DownClenched,
            _ => return None,
        })
    }
}

/// The character rig slot an emote applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmoteSlot {
    /// The face.
    Expression,
    /// Left arm only.
    ArmLeft,
    /// Right arm only.
    ArmRight,
    /// Both arms together.
    ArmBoth,
}

impl EmoteSlot {
    /// Wire name of the slot.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Expression => "Expression",
            Self::ArmLeft => "ArmL",
            Self::ArmRight => "ArmR",
            Self::ArmBoth => "ArmBoth",
        }
    }
}

/// A single visual change to the character rig.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmoteCommand {
    /// Set the facial expression.
    Expression(Expression),
    /// Pose the left arm.
    ArmLeft(ArmPose),
    /// Pose the right arm.
    ArmRight(ArmPose),
    /// Pose both arms.
    ArmBoth(ArmPose),
}

impl EmoteCommand {
    /// The rig slot this command targets.
    #[must_use]
    pub fn slot(self) -> EmoteSlot {
        match self {
            Self::Expression(_) => EmoteSlot::Expression,
            Self::ArmLeft(_) => EmoteSlot::ArmLeft,
            Self::ArmRight(_) => EmoteSlot::ArmRight,
            Self::ArmBoth(_) => EmoteSlot::ArmBoth,
        }
    }

    /// Wire name of the target state within the slot.
    #[must_use]
    pub fn item_name(self) -> &'static str {
        match self {
            Self::Expression(e) => e.item_name(),
            Self::ArmLeft(p) | Self::ArmRight(p) | Self::ArmBoth(p) => p.item_name(),
        }
    }

    /// Whether this command moves an arm. Arm motion can be vetoed by the
    /// host while the character is physically engaged.
    #[must_use]
    pub fn is_arm(self) -> bool {
        !matches!(self, Self::Expression(_))
    }
}

// ============================================================================
// Flow control
// ============================================================================

/// Commands that steer the conversation rather than the rig.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowCommand {
    /// Forget the conversation history, keeping the system message.
    ResetChat,
    /// Finish the current reveal, then leave the conversation.
    ExitChat,
    /// Commit the text shown so far and continue in a fresh bubble.
    SplitMessage,
}

impl FlowCommand {
    fn name(self) -> &'static str {
        match self {
            Self::ResetChat => "ResetChat",
            Self::ExitChat => "ExitChat",
            Self::SplitMessage => "SplitMessage",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "ResetChat" => Self::ResetChat,
            "ExitChat" => Self::ExitChat,
            "SplitMessage" => Self::SplitMessage,
            _ => return None,
        })
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Any command the vocabulary admits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatCommand {
    /// A visual change to the character.
    Emote(EmoteCommand),
    /// A conversation control action.
    Flow(FlowCommand),
}

impl ChatCommand {
    /// Decode a dotted command path (without the sentinel).
    ///
    /// Returns `None` for anything that is not exactly a known path; there
    /// is no partial or fuzzy matching.
    #[must_use]
    pub fn decode(raw: &str) -> Option<Self> {
        let mut parts = raw.split('.');
        let target = parts.next()?;

        if target == FLOW_CATEGORY {
            let name = parts.next()?;
            if parts.next().is_some() {
                return None;
            }
            return FlowCommand::from_name(name).map(Self::Flow);
        }
        if target != BOT_CHARACTER {
            return None;
        }

        let slot = parts.next()?;
        let item = parts.next()?;
        if parts.next().is_some() {
            return None;
        }

        match slot {
            "Expression" => Expression::from_item(item)
                .map(|e| Self::Emote(EmoteCommand::Expression(e))),
            "ArmL" => ArmPose::from_item(item).map(|p| Self::Emote(EmoteCommand::ArmLeft(p))),
            "ArmR" => ArmPose::from_item(item).map(|p| Self::Emote(EmoteCommand::ArmRight(p))),
            "ArmBoth" => ArmPose::from_item(item).map(|p| Self::Emote(EmoteCommand::ArmBoth(p))),
            _ => None,
        }
    }

    /// The dotted path form, without the sentinel.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::Emote(emote) => format!(
                "{BOT_CHARACTER}.{}.{}",
                emote.slot().name(),
                emote.item_name()
            ),
            Self::Flow(flow) => format!("{FLOW_CATEGORY}.{}", flow.name()),
        }
    }

    /// The full wire token, sentinel included.
    #[must_use]
    pub fn wire(&self) -> String {
        format!("{SENTINEL}{}", self.encode())
    }
}

impl fmt::Display for ChatCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

// ============================================================================
// Prompt material
// ============================================================================

/// Wire tokens for the eight mood expressions.
#[must_use]
pub fn primary_expression_wires() -> Vec<String> {
    Expression::PRIMARY
        .iter()
        .map(|e| ChatCommand::Emote(EmoteCommand::Expression(*e)).wire())
        .collect()
}

/// Wire tokens for the blush overlays.
#[must_use]
pub fn blush_wires() -> Vec<String> {
    Expression::BLUSH
        .iter()
        .map(|e| ChatCommand::Emote(EmoteCommand::Expression(*e)).wire())
        .collect()
}

/// Wire tokens for every pose of one arm slot.
#[must_use]
pub fn arm_wires(slot: EmoteSlot) -> Vec<String> {
    ArmPose::ALL
        .iter()
        .map(|p| {
            let emote = match slot {
                EmoteSlot::ArmLeft => EmoteCommand::ArmLeft(*p),
                EmoteSlot::ArmRight => EmoteCommand::ArmRight(*p),
                _ => EmoteCommand::ArmBoth(*p),
            };
            ChatCommand::Emote(emote).wire()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_expression() {
        assert_eq!(
            ChatCommand::decode("bot.Expression.VeryHappy"),
            Some(ChatCommand::Emote(EmoteCommand::Expression(
                Expression::VeryHappy
            )))
        );
    }

    #[test]
    fn decodes_arm_slots() {
        assert_eq!(
            ChatCommand::decode("bot.ArmL.UpPoint"),
            Some(ChatCommand::Emote(EmoteCommand::ArmLeft(ArmPose::UpPoint)))
        );
        assert_eq!(
            ChatCommand::decode("bot.ArmR.DownClenched"),
            Some(ChatCommand::Emote(EmoteCommand::ArmRight(
                ArmPose::DownClenched
            )))
        );
        assert_eq!(
            ChatCommand::decode("bot.ArmBoth.UpHi"),
            Some(ChatCommand::Emote(EmoteCommand::ArmBoth(ArmPose::UpHi)))
        );
    }

    #[test]
    fn decodes_flow_commands() {
        assert_eq!(
            ChatCommand::decode("flow.ExitChat"),
            Some(ChatCommand::Flow(FlowCommand::ExitChat))
        );
        assert_eq!(
            ChatCommand::decode("flow.ResetChat"),
            Some(ChatCommand::Flow(FlowCommand::ResetChat))
        );
        assert_eq!(
            ChatCommand::decode("flow.SplitMessage"),
            Some(ChatCommand::Flow(FlowCommand::SplitMessage))
        );
    }

    #[test]
    fn rejects_unknown_paths() {
        assert_eq!(ChatCommand::decode("bot.Expression.NoBlush"), None);
        assert_eq!(ChatCommand::decode("bot.Dance"), None);
        assert_eq!(ChatCommand::decode("user.Expression.Happy"), None);
        assert_eq!(ChatCommand::decode("bot"), None);
        assert_eq!(ChatCommand::decode(""), None);
        assert_eq!(ChatCommand::decode("bot.Expression.Happy.Extra"), None);
        assert_eq!(ChatCommand::decode("bot.expression.happy"), None);
        // Flow directives live under their own category, not the character.
        assert_eq!(ChatCommand::decode("bot.ExitChat"), None);
        assert_eq!(ChatCommand::decode("flow.Dance"), None);
        assert_eq!(ChatCommand::decode("flow.ExitChat.Now"), None);
        assert_eq!(ChatCommand::decode("flow"), None);
    }

    #[test]
    fn encode_round_trips_decode() {
        let cmd = ChatCommand::Emote(EmoteCommand::ArmBoth(ArmPose::DownNormal));
        assert_eq!(ChatCommand::decode(&cmd.encode()), Some(cmd));
        assert_eq!(cmd.wire(), "#!bot.ArmBoth.DownNormal");

        let cmd = ChatCommand::Flow(FlowCommand::SplitMessage);
        assert_eq!(ChatCommand::decode(&cmd.encode()), Some(cmd));
        assert_eq!(cmd.wire(), "#!flow.SplitMessage");
    }

    #[test]
    fn expression_clear_is_valid_but_not_primary() {
        let decoded = ChatCommand::decode(EXPRESSION_CLEAR);
        assert_eq!(
            decoded,
            Some(ChatCommand::Emote(EmoteCommand::Expression(
                Expression::Clear
            )))
        );
        assert!(!Expression::Clear.is_primary());
        assert!(!Expression::Blush.is_primary());
        assert!(Expression::VeryAngry.is_primary());
    }

    #[test]
    fn prompt_lists_carry_sentinels() {
        let wires = primary_expression_wires();
        assert_eq!(wires.len(), 8);
        assert!(wires.iter().all(|w| w.starts_with(SENTINEL)));
        assert_eq!(arm_wires(EmoteSlot::ArmLeft)[0], "#!bot.ArmL.UpPoint");
    }
}
