mod support;

use std::time::Duration;

use cwchannel::ChannelMessage;
use cwconfig::SyncTuning;
use cwsync::{EngineEvent, SyncPhase};
use support::{MediaCommand, Pair};

fn send_voice(pair: &Pair, duration_ms: Option<u64>) {
    let transport = pair.a.engine.transport();
    transport
        .publish(&ChannelMessage::VoiceAudio {
            audio: "b64-opus-frame".to_string(),
            sender_id: pair.a.id(),
            duration_ms,
        })
        .unwrap();
}

#[test]
fn local_voice_pauses_immediately_and_resumes_after_duration() {
    let mut pair = Pair::playing();

    pair.a.engine.begin_voice_activity().unwrap();
    assert!(!pair.a.media.playing());
    assert_eq!(pair.a.engine.phase(), SyncPhase::Paused);

    pair.a
        .engine
        .end_voice_activity(Some(Duration::from_secs(2)))
        .unwrap();
    pair.advance(1900);
    assert!(!pair.a.media.playing(), "resume must wait the full duration");

    // At exactly the duration the play path re-enters; the responder acks
    // after its settle delay and both commit.
    pair.advance(100);
    pair.advance(100);
    assert!(pair.a.media.playing());
    assert!(pair.b.media.playing());
    assert_eq!(pair.a.engine.phase(), SyncPhase::Playing);
}

#[test]
fn unknown_duration_resumes_on_the_end_signal() {
    let mut pair = Pair::playing();

    pair.a.engine.begin_voice_activity().unwrap();
    assert!(!pair.a.media.playing());

    pair.a.engine.end_voice_activity(None).unwrap();
    pair.pump();
    pair.advance(100);
    assert!(pair.a.media.playing());
    assert!(pair.b.media.playing());
}

#[test]
fn remote_voice_ducks_pauses_and_restores() {
    let mut pair = Pair::playing();
    pair.b.engine.set_volume(0.8);
    pair.b.media.clear_commands();
    pair.b.drain_events();

    send_voice(&pair, Some(1500));
    pair.pump();

    // Receiver pauses and ducks to the configured level.
    assert!(!pair.b.media.playing());
    assert_eq!(pair.b.media.volume(), 0.25);
    let events = pair.b.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::VolumeDucked { level } if *level == 0.25)));
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::VoiceMessage { duration_ms: Some(1500), .. })));

    // When the message has played out, the pre-voice level comes back and
    // playback resumes through the normal play path.
    pair.advance(1500);
    pair.advance(100);
    assert_eq!(pair.b.media.volume(), 0.8);
    assert!(pair.b.media.playing());
    assert!(pair.a.media.playing());
    let restores = pair
        .b
        .media
        .count(|c| matches!(c, MediaCommand::SetVolume(level) if *level == 0.8));
    assert_eq!(restores, 1);
}

#[test]
fn voice_without_duration_waits_for_the_finished_signal() {
    let mut pair = Pair::playing();

    send_voice(&pair, None);
    pair.pump();
    assert!(!pair.b.media.playing());
    assert_eq!(pair.b.media.volume(), 0.25);

    // No duration on the wire: time alone must not resume anything.
    pair.advance(5000);
    assert!(!pair.b.media.playing());
    assert_eq!(pair.b.media.volume(), 0.25);

    pair.b.engine.voice_playback_finished().unwrap();
    pair.pump();
    pair.advance(100);
    assert_eq!(pair.b.media.volume(), 1.0);
    assert!(pair.b.media.playing());
}

#[test]
fn disabled_voice_support_degrades_to_a_noop() {
    let mut tuning = SyncTuning::default();
    tuning.voice_enabled = false;
    let mut pair = Pair::with_tuning(tuning);
    pair.a.engine.request_play().unwrap();
    pair.pump();
    pair.advance(100);
    assert!(pair.a.media.playing());

    pair.a.engine.begin_voice_activity().unwrap();
    assert!(pair.a.media.playing(), "voice entry points must be no-ops");

    send_voice(&pair, Some(1000));
    pair.pump();
    assert!(pair.b.media.playing());
    assert_eq!(pair.b.media.volume(), 1.0);
}

#[test]
fn voice_interruption_aborts_an_in_flight_handshake() {
    let mut pair = Pair::new();

    pair.a.engine.request_play().unwrap();
    assert_eq!(pair.a.engine.phase(), SyncPhase::WaitingAck);

    // Decided policy: voice wins; the pending commit is abandoned rather
    // than allowed to un-pause over an audible message.
    pair.a.engine.begin_voice_activity().unwrap();
    assert_eq!(pair.a.engine.phase(), SyncPhase::Paused);

    pair.room.clock.advance(Duration::from_millis(4000));
    pair.a.engine.tick().unwrap();
    assert_eq!(pair.a.media.play_count(), 0);
    assert_eq!(pair.a.engine.phase(), SyncPhase::Paused);
}
