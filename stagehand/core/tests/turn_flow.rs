//! End-to-end turns through the whole pipeline, using the echo and
//! scripted backends so the model's reply is fully under test control.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use stagehand_core::chat::{ChatEngine, TurnOutcome, USER_SPEAKER};
use stagehand_core::config::StagehandConfig;
use stagehand_core::stage::SurfaceId;
use stagehand_core::sync::{EventBus, Gate};
use stagehand_core::test_support::{
    advance_pump, RecordingStage, StubInteraction, StubSurface, VecTranscript,
};
use stagehand_core::vocab::{ArmPose, EmoteCommand, Expression};

struct World {
    engine: ChatEngine,
    surface: Arc<StubSurface>,
    stage: Arc<RecordingStage>,
    interaction: Arc<StubInteraction>,
    transcript: Arc<VecTranscript>,
    bus: EventBus,
    gate: Gate<SurfaceId>,
}

fn world(provider_kind: &str) -> World {
    let bus = EventBus::new();
    let gate = Gate::new();
    let surface = Arc::new(StubSurface::new(1, bus.clone()));
    let stage = Arc::new(RecordingStage::new());
    let interaction = Arc::new(StubInteraction::new());
    let transcript = Arc::new(VecTranscript::new());

    let mut config = StagehandConfig::default();
    config.provider.kind = provider_kind.to_string();
    config.bot_name = "Bot".to_string();

    let engine = ChatEngine::new(
        &config,
        surface.clone(),
        stage.clone(),
        interaction.clone(),
        transcript.clone(),
        bus.clone(),
        gate.clone(),
    )
    .unwrap();

    World {
        engine,
        surface,
        stage,
        interaction,
        transcript,
        bus,
        gate,
    }
}

fn bot_lines(transcript: &VecTranscript) -> Vec<String> {
    transcript
        .lines()
        .into_iter()
        .filter(|(speaker, _)| speaker == "Bot")
        .map(|(_, text)| text)
        .collect()
}

#[tokio::test(start_paused = true)]
async fn a_full_turn_performs_text_and_emotes() {
    let mut w = world("echo");
    w.engine.start().await;

    let outcome = w
        .engine
        .process_user_input("Hello #!bot.Expression.Happy world")
        .await
        .unwrap();

    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(
        w.transcript.lines(),
        vec![
            (
                USER_SPEAKER.to_string(),
                "Hello #!bot.Expression.Happy world".to_string()
            ),
            ("Bot".to_string(), "Hello world".to_string()),
        ]
    );

    // Arm reset at prepare, then the auto-clear, then the expression.
    let emotes: Vec<_> = w.stage.emotes().iter().map(|call| call.emote).collect();
    assert_eq!(
        emotes,
        vec![
            EmoteCommand::ArmBoth(ArmPose::DownNormal),
            EmoteCommand::Expression(Expression::Clear),
            EmoteCommand::Expression(Expression::Happy),
        ]
    );

    // The turn leaves nothing held: gate open, writer idle, still active.
    assert!(!w.gate.is_locked(&1));
    assert!(w.engine.is_active());
}

#[tokio::test(start_paused = true)]
async fn exit_chat_truncates_the_reply_and_ends_the_conversation() {
    let mut w = world("echo");
    w.engine.start().await;
    let pump = advance_pump(w.bus.clone(), Duration::from_millis(100));

    let outcome = w
        .engine
        .process_user_input("Farewell. #!flow.ExitChat This text is never shown.")
        .await
        .unwrap();
    pump.abort();

    assert_eq!(outcome, TurnOutcome::Exited);
    assert!(!w.engine.is_active());
    assert!(w.surface.closed());

    // The discarded tail never reaches the transcript; the hard stop drops
    // the whole bubble.
    assert!(bot_lines(&w.transcript).is_empty());
    assert!(!w.gate.is_locked(&1));
    // Leaving resets the rig to defaults.
    assert_eq!(w.stage.defaults().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn split_message_produces_two_bubbles() {
    let mut w = world("echo");
    w.engine.start().await;
    let pump = advance_pump(w.bus.clone(), Duration::from_millis(100));

    let outcome = w
        .engine
        .process_user_input("First bubble. #!flow.SplitMessage Second bubble.")
        .await
        .unwrap();
    pump.abort();

    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(
        bot_lines(&w.transcript),
        vec!["First bubble.".to_string(), "Second bubble.".to_string()]
    );

    // The split lowers the arms between bubbles.
    let emotes: Vec<_> = w.stage.emotes().iter().map(|call| call.emote).collect();
    assert_eq!(
        emotes
            .iter()
            .filter(|e| **e == EmoteCommand::ArmBoth(ArmPose::DownNormal))
            .count(),
        2 // once at prepare, once at the split
    );
}

#[tokio::test(start_paused = true)]
async fn flow_directives_ride_their_own_wire_category() {
    let mut w = world("echo");
    w.engine.start().await;
    let pump = advance_pump(w.bus.clone(), Duration::from_millis(100));

    let outcome = w
        .engine
        .process_user_input("A #!flow.SplitMessage B")
        .await
        .unwrap();
    pump.abort();

    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(
        bot_lines(&w.transcript),
        vec!["A".to_string(), "B".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn whitespace_soup_is_normalized() {
    let mut w = world("scripted");
    w.engine.start().await;

    let outcome = w.engine.process_user_input("3").await.unwrap();
    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(
        bot_lines(&w.transcript),
        vec!["Too many spaces,\nblank lines,\nand\nstray returns.".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn sentinel_split_across_stream_chunks_still_executes() {
    let mut w = world("scripted");
    w.engine.start().await;

    let outcome = w.engine.process_user_input("4").await.unwrap();
    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(
        bot_lines(&w.transcript),
        vec!["A sentinel split across chunks: see?".to_string()]
    );
    assert!(w
        .stage
        .emotes()
        .iter()
        .any(|call| call.emote == EmoteCommand::Expression(Expression::Shock)));
}

#[tokio::test(start_paused = true)]
async fn arm_commands_are_suppressed_while_interaction_forbids_them() {
    let mut w = world("echo");
    w.engine.start().await;
    w.interaction.set_forbid(true);

    let outcome = w
        .engine
        .process_user_input("Waving #!bot.ArmBoth.UpHi at you")
        .await
        .unwrap();

    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(bot_lines(&w.transcript), vec!["Waving at you".to_string()]);
    // Even the arm reset at prepare is suppressed; no emote lands at all.
    assert!(w.stage.emotes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn invalid_commands_vanish_without_a_trace() {
    let mut w = world("echo");
    w.engine.start().await;

    let outcome = w
        .engine
        .process_user_input("Look #!bot.Backflip at me")
        .await
        .unwrap();

    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(bot_lines(&w.transcript), vec!["Look at me".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn consecutive_turns_reuse_the_writer_cleanly() {
    let mut w = world("echo");
    w.engine.start().await;

    for input in ["first turn", "second turn", "third turn"] {
        let outcome = w.engine.process_user_input(input).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Completed);
    }
    assert_eq!(
        bot_lines(&w.transcript),
        vec![
            "first turn".to_string(),
            "second turn".to_string(),
            "third turn".to_string(),
        ]
    );
    assert!(!w.gate.is_locked(&1));
}
