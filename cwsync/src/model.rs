use cwchannel::{PeerId, SyncKind};
use serde::Serialize;

/// The one authoritative playback copy held by each peer. Eventually
/// consistent across the room, never strongly consistent.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PlaybackState {
    /// Current feed; `None` until a url has been set.
    pub url: Option<String>,
    pub playing: bool,
    /// Last committed position, seconds.
    pub time: f64,
}

/// Where the session currently sits in the handshake cycle. There is no
/// terminal phase: the session cycles between `Playing`, `Paused` and
/// `Idle` (on url change) for the room's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    /// Initiator, request not yet on the wire.
    Requesting,
    /// Waiting for the counterpart signal: ack (initiator) or go
    /// (responder of a play request).
    WaitingAck,
    /// Responder buffering toward the requested target time.
    Syncing,
    Playing,
    Paused,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Requesting => "requesting",
            SyncPhase::WaitingAck => "waiting_ack",
            SyncPhase::Syncing => "syncing",
            SyncPhase::Playing => "playing",
            SyncPhase::Paused => "paused",
        }
    }
}

/// The single in-flight handshake target. At most one per peer.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct PendingTarget {
    pub kind: SyncKind,
    pub time: f64,
    pub initiator: PeerId,
}

/// A debounced local intent; each new observation supersedes the previous
/// one, so rapid scrubbing collapses into the final position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum LocalIntent {
    Play,
    Pause,
    Seek(f64),
}

/// Remote-echo guard: one-shot counters armed immediately before the
/// engine drives a media mutator on behalf of a remote command. The next
/// matching local observation consumes one instead of re-broadcasting;
/// this is the feedback-loop breaker.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct EchoGuard {
    play: u8,
    pause: u8,
    seek: u8,
}

impl EchoGuard {
    pub(crate) fn arm_play(&mut self) {
        self.play = self.play.saturating_add(1);
    }

    pub(crate) fn arm_pause(&mut self) {
        self.pause = self.pause.saturating_add(1);
    }

    pub(crate) fn arm_seek(&mut self) {
        self.seek = self.seek.saturating_add(1);
    }

    pub(crate) fn consume_play(&mut self) -> bool {
        consume(&mut self.play)
    }

    pub(crate) fn consume_pause(&mut self) -> bool {
        consume(&mut self.pause)
    }

    pub(crate) fn consume_seek(&mut self) -> bool {
        consume(&mut self.seek)
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

fn consume(slot: &mut u8) -> bool {
    if *slot > 0 {
        *slot -= 1;
        true
    } else {
        false
    }
}

/// All mutable per-peer session state, owned by the engine instance.
/// No ambient globals: handlers receive this by reference.
#[derive(Debug)]
pub(crate) struct SyncSession {
    pub phase: SyncPhase,
    pub pending: Option<PendingTarget>,
    pub lock_held: bool,
    pub echo: EchoGuard,
    pub playback: PlaybackState,
    /// Debounce slot for local intent.
    pub pending_intent: Option<LocalIntent>,
    /// Readiness checks remaining before the responder acks regardless.
    pub ready_polls_left: u32,
    /// Volume the user configured; ducking restores to this.
    pub user_volume: f64,
    pub ducked: bool,
    /// True while playback is paused because of voice, so the end of the
    /// voice message knows to resume.
    pub voice_paused: bool,
    /// Outgoing voice activity in progress.
    pub voice_active: bool,
}

impl SyncSession {
    pub(crate) fn new() -> Self {
        Self {
            phase: SyncPhase::Idle,
            pending: None,
            lock_held: false,
            echo: EchoGuard::default(),
            playback: PlaybackState::default(),
            pending_intent: None,
            ready_polls_left: 0,
            user_volume: 1.0,
            ducked: false,
            voice_paused: false,
            voice_active: false,
        }
    }
}
