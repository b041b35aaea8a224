#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::Receiver;

use cwchannel::{ChannelError, ChannelMessage, ChannelTransport, Envelope, LoopbackHub, PeerId};
use cwconfig::SyncTuning;
use cwsync::{EngineEvent, ManualClock, MediaError, MediaSurface, SyncEngine};

/// Opt-in test logging: `RUST_LOG=cwsync=debug cargo test -- --nocapture`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One recorded call into the fake media surface.
#[derive(Clone, Debug, PartialEq)]
pub enum MediaCommand {
    Play,
    Pause,
    SeekTo(f64),
    SetRate(f64),
    SetVolume(f64),
}

#[derive(Debug)]
struct FakeMediaState {
    time: f64,
    playing: bool,
    rate: f64,
    volume: f64,
    ready: bool,
    reject_play: Option<String>,
    commands: Vec<MediaCommand>,
}

/// Scriptable media element: records every command, and lets tests move
/// the playhead, withhold readiness, or refuse to start.
pub struct FakeMedia {
    state: Arc<Mutex<FakeMediaState>>,
}

impl FakeMedia {
    pub fn new() -> (Self, MediaProbe) {
        let state = Arc::new(Mutex::new(FakeMediaState {
            time: 0.0,
            playing: false,
            rate: 1.0,
            volume: 1.0,
            ready: true,
            reject_play: None,
            commands: Vec::new(),
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            MediaProbe(state),
        )
    }
}

impl MediaSurface for FakeMedia {
    fn current_time(&self) -> f64 {
        self.state.lock().unwrap().time
    }

    fn seek_to(&mut self, seconds: f64) {
        let mut state = self.state.lock().unwrap();
        state.time = seconds;
        state.commands.push(MediaCommand::SeekTo(seconds));
    }

    fn play(&mut self) -> Result<(), MediaError> {
        let mut state = self.state.lock().unwrap();
        if let Some(reason) = &state.reject_play {
            return Err(MediaError::PlayRejected(reason.clone()));
        }
        state.playing = true;
        state.commands.push(MediaCommand::Play);
        Ok(())
    }

    fn pause(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.playing = false;
        state.commands.push(MediaCommand::Pause);
    }

    fn is_playing(&self) -> bool {
        self.state.lock().unwrap().playing
    }

    fn set_rate(&mut self, rate: f64) {
        let mut state = self.state.lock().unwrap();
        state.rate = rate;
        state.commands.push(MediaCommand::SetRate(rate));
    }

    fn set_volume(&mut self, level: f64) {
        let mut state = self.state.lock().unwrap();
        state.volume = level;
        state.commands.push(MediaCommand::SetVolume(level));
    }

    fn is_ready(&self) -> bool {
        self.state.lock().unwrap().ready
    }
}

/// Test-side handle on a [`FakeMedia`].
#[derive(Clone)]
pub struct MediaProbe(Arc<Mutex<FakeMediaState>>);

impl MediaProbe {
    pub fn commands(&self) -> Vec<MediaCommand> {
        self.0.lock().unwrap().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.0.lock().unwrap().commands.clear();
    }

    pub fn play_count(&self) -> usize {
        self.count(|c| matches!(c, MediaCommand::Play))
    }

    pub fn seek_count(&self) -> usize {
        self.count(|c| matches!(c, MediaCommand::SeekTo(_)))
    }

    pub fn count(&self, pred: impl Fn(&MediaCommand) -> bool) -> usize {
        self.0.lock().unwrap().commands.iter().filter(|c| pred(*c)).count()
    }

    pub fn time(&self) -> f64 {
        self.0.lock().unwrap().time
    }

    pub fn set_time(&self, time: f64) {
        self.0.lock().unwrap().time = time;
    }

    pub fn playing(&self) -> bool {
        self.0.lock().unwrap().playing
    }

    /// Move the element into or out of playback behind the engine's back,
    /// as a direct user gesture on the element does.
    pub fn set_playing(&self, playing: bool) {
        self.0.lock().unwrap().playing = playing;
    }

    pub fn rate(&self) -> f64 {
        self.0.lock().unwrap().rate
    }

    pub fn volume(&self) -> f64 {
        self.0.lock().unwrap().volume
    }

    pub fn set_ready(&self, ready: bool) {
        self.0.lock().unwrap().ready = ready;
    }

    pub fn reject_play(&self, reason: &str) {
        self.0.lock().unwrap().reject_play = Some(reason.to_string());
    }
}

/// Transport whose publishes always fail, for error-path coverage.
pub struct DeadChannel {
    id: PeerId,
}

impl DeadChannel {
    pub fn new() -> Self {
        Self {
            id: PeerId::from("solo"),
        }
    }
}

impl ChannelTransport for DeadChannel {
    fn local_peer(&self) -> &PeerId {
        &self.id
    }

    fn publish(&self, _message: &ChannelMessage) -> Result<(), ChannelError> {
        Err(ChannelError::Disconnected)
    }

    fn subscribe(&self) -> Receiver<Envelope> {
        crossbeam_channel::unbounded().1
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn peers(&self) -> Vec<PeerId> {
        vec![self.id.clone()]
    }
}

/// A peer whose channel refuses every publish.
pub fn dead_peer(room: &Room) -> Peer {
    let channel = DeadChannel::new();
    let inbox = channel.subscribe();
    let (media, probe) = FakeMedia::new();
    let engine = SyncEngine::new(
        Arc::new(channel),
        Box::new(media),
        room.tuning.clone(),
        Arc::new(room.clock.clone()),
    );
    let events = engine.subscribe_events();
    Peer {
        engine,
        inbox,
        media: probe,
        events,
    }
}

/// A room under a manual clock. Peers can join at any point, which is what
/// the bootstrap tests need.
pub struct Room {
    pub hub: LoopbackHub,
    pub clock: ManualClock,
    pub tuning: SyncTuning,
}

impl Room {
    pub fn new() -> Self {
        Self::with_tuning(SyncTuning::default())
    }

    pub fn with_tuning(tuning: SyncTuning) -> Self {
        init_tracing();
        Self {
            hub: LoopbackHub::new(),
            clock: ManualClock::new(),
            tuning,
        }
    }

    pub fn peer(&self) -> Peer {
        let channel = self.hub.join();
        let inbox = channel.subscribe();
        let (media, probe) = FakeMedia::new();
        let engine = SyncEngine::new(
            Arc::new(channel),
            Box::new(media),
            self.tuning.clone(),
            Arc::new(self.clock.clone()),
        );
        let events = engine.subscribe_events();
        Peer {
            engine,
            inbox,
            media: probe,
            events,
        }
    }

    /// Passive observer of everything on the wire.
    pub fn spy(&self) -> Receiver<Envelope> {
        self.hub.join().subscribe()
    }
}

pub struct Peer {
    pub engine: SyncEngine,
    pub inbox: Receiver<Envelope>,
    pub media: MediaProbe,
    pub events: Receiver<EngineEvent>,
}

impl Peer {
    pub fn id(&self) -> PeerId {
        self.engine.peer_id().clone()
    }

    pub fn drain_events(&self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Deliver queued envelopes to every peer until the room is quiescent.
pub fn pump(peers: &mut [&mut Peer]) {
    loop {
        let mut progressed = false;
        for peer in peers.iter_mut() {
            while let Ok(envelope) = peer.inbox.try_recv() {
                peer.engine.handle_envelope(envelope).unwrap();
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
}

/// Advance the shared clock, fire due timers, deliver what they published.
pub fn advance(room: &Room, peers: &mut [&mut Peer], ms: u64) {
    room.clock.advance(Duration::from_millis(ms));
    for peer in peers.iter_mut() {
        peer.engine.tick().unwrap();
    }
    pump(peers);
}

/// The usual two-peer setup.
pub struct Pair {
    pub room: Room,
    pub a: Peer,
    pub b: Peer,
}

impl Pair {
    pub fn new() -> Self {
        Self::with_tuning(SyncTuning::default())
    }

    pub fn with_tuning(tuning: SyncTuning) -> Self {
        let room = Room::with_tuning(tuning);
        let a = room.peer();
        let b = room.peer();
        Self { room, a, b }
    }

    /// Two peers resting in `Playing` after a completed play handshake.
    pub fn playing() -> Self {
        let mut pair = Self::new();
        pair.a.engine.request_play().unwrap();
        pair.pump();
        // Responder settle delay, then ack/go/commit.
        pair.advance(pair.room.tuning.ready_settle_ms);
        assert!(pair.a.media.playing(), "initiator should be playing");
        assert!(pair.b.media.playing(), "responder should be playing");
        pair.a.media.clear_commands();
        pair.b.media.clear_commands();
        pair.a.drain_events();
        pair.b.drain_events();
        pair
    }

    pub fn pump(&mut self) {
        pump(&mut [&mut self.a, &mut self.b]);
    }

    pub fn advance(&mut self, ms: u64) {
        advance(&self.room, &mut [&mut self.a, &mut self.b], ms);
    }
}

/// Wire frames captured by a spy since the last drain.
pub fn drain_wire(rx: &Receiver<Envelope>) -> Vec<Envelope> {
    let mut frames = Vec::new();
    while let Ok(envelope) = rx.try_recv() {
        frames.push(envelope);
    }
    frames
}

/// Count frames from a given sender matching a predicate.
pub fn count_from(
    frames: &[Envelope],
    from: &PeerId,
    pred: impl Fn(&ChannelMessage) -> bool,
) -> usize {
    frames
        .iter()
        .filter(|e| e.from == *from && pred(&e.message))
        .count()
}
