use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Receiver;
use tracing::{debug, trace};

use cwchannel::{ChannelMessage, ChannelTransport, Envelope, PeerId, SyncKind};
use cwconfig::SyncTuning;

use crate::clock::{Clock, SystemClock};
use crate::errors::SyncError;
use crate::events::{EngineEvent, EngineEventBus};
use crate::media::{MediaEvent, MediaSurface};
use crate::model::{LocalIntent, PlaybackState, SyncPhase, SyncSession};
use crate::timers::{TimerKind, TimerSet};

/// The synchronization and voice-arbitration engine for one peer.
///
/// Owns the session state, the media surface, the timer table and the
/// transport handle. Every handler runs to completion; the only suspension
/// points are deadlines in the timer table, fired by [`tick`](Self::tick).
pub struct SyncEngine {
    pub(crate) id: PeerId,
    pub(crate) transport: Arc<dyn ChannelTransport>,
    pub(crate) media: Box<dyn MediaSurface>,
    pub(crate) session: SyncSession,
    pub(crate) timers: TimerSet,
    pub(crate) tuning: SyncTuning,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) events: EngineEventBus,
}

impl SyncEngine {
    pub fn new(
        transport: Arc<dyn ChannelTransport>,
        media: Box<dyn MediaSurface>,
        tuning: SyncTuning,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            id: transport.local_peer().clone(),
            transport,
            media,
            session: SyncSession::new(),
            timers: TimerSet::new(),
            tuning,
            clock,
            events: EngineEventBus::new(),
        }
    }

    /// Engine over the globally configured tunables and the wall clock;
    /// the usual production constructor.
    pub fn with_global_tuning(
        transport: Arc<dyn ChannelTransport>,
        media: Box<dyn MediaSurface>,
    ) -> Self {
        let tuning = cwconfig::get_tuning().as_ref().clone();
        Self::new(transport, media, tuning, Arc::new(SystemClock))
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.id
    }

    pub fn phase(&self) -> SyncPhase {
        self.session.phase
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.session.playback.clone()
    }

    pub fn subscribe_events(&self) -> Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn transport(&self) -> Arc<dyn ChannelTransport> {
        Arc::clone(&self.transport)
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Earliest pending deadline, for drivers that want to sleep precisely.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// User-configured output volume. Applied immediately unless a voice
    /// message is currently ducking the output, in which case it becomes
    /// the level ducking restores to.
    pub fn set_volume(&mut self, level: f64) {
        self.session.user_volume = level;
        if !self.session.ducked {
            self.media.set_volume(level);
        }
    }

    // ------------------------------------------------------------------
    // Debounce & lock gate
    // ------------------------------------------------------------------

    /// Feed one locally observed media transition through the gate.
    ///
    /// Remote-echo observations are consumed silently, observations during
    /// a sync are dropped, and everything else lands in the debounce slot,
    /// superseding the previous intent and restarting the quiet window.
    pub fn observe_media(&mut self, event: MediaEvent) -> Result<(), SyncError> {
        let echoed = match event {
            MediaEvent::Play => self.session.echo.consume_play(),
            MediaEvent::Pause => self.session.echo.consume_pause(),
            MediaEvent::Seek(_) => self.session.echo.consume_seek(),
        };
        if echoed {
            trace!(peer = %self.id, ?event, "consumed remote echo");
            return Ok(());
        }
        if self.session.lock_held {
            debug!(peer = %self.id, ?event, "sync in progress, dropping local intent");
            return Ok(());
        }
        let intent = match event {
            MediaEvent::Play => LocalIntent::Play,
            MediaEvent::Pause => LocalIntent::Pause,
            MediaEvent::Seek(t) if sane_time(t) => LocalIntent::Seek(t),
            MediaEvent::Seek(t) => {
                debug!(peer = %self.id, time = t, "ignoring seek to invalid position");
                return Ok(());
            }
        };
        self.session.pending_intent = Some(intent);
        let at = self.clock.now() + self.tuning.debounce();
        self.timers.set(TimerKind::DebounceFlush, at);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Presentation entry points (no debounce: these are explicit intent)
    // ------------------------------------------------------------------

    pub fn request_play(&mut self) -> Result<(), SyncError> {
        if self.session.lock_held {
            debug!(peer = %self.id, "sync in progress, dropping play request");
            return Ok(());
        }
        let time = self.media.current_time();
        self.begin_handshake(SyncKind::Play, time)
    }

    pub fn request_pause(&mut self) -> Result<(), SyncError> {
        if self.session.lock_held {
            debug!(peer = %self.id, "sync in progress, dropping pause request");
            return Ok(());
        }
        let time = self.media.current_time();
        if self.media.is_playing() {
            self.session.echo.arm_pause();
        }
        self.media.pause();
        self.finish_local_pause(time)
    }

    pub fn request_seek(&mut self, time: f64) -> Result<(), SyncError> {
        if self.session.lock_held {
            debug!(peer = %self.id, "sync in progress, dropping seek request");
            return Ok(());
        }
        if !sane_time(time) {
            debug!(peer = %self.id, time, "ignoring seek to invalid position");
            return Ok(());
        }
        self.begin_handshake(SyncKind::Seek, time)
    }

    /// Switch the shared feed. Resets both peers to a clean paused-at-zero
    /// state and cancels any in-flight handshake unconditionally.
    pub fn change_url(&mut self, url: impl Into<String>) -> Result<(), SyncError> {
        let url = url.into();
        self.reset_session(Some(url.clone()));
        self.events.broadcast(EngineEvent::UrlChanged { url: url.clone() });
        self.publish(ChannelMessage::Url { url })?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Inbound dispatch
    // ------------------------------------------------------------------

    /// Handle one inbound envelope. Echoes of our own broadcasts, messages
    /// addressed elsewhere and payloads invalid for the current phase are
    /// all silently dropped; at-least-once unordered delivery means every
    /// handler must tolerate duplicates.
    pub fn handle_envelope(&mut self, envelope: Envelope) -> Result<(), SyncError> {
        if envelope.from == self.id {
            trace!(peer = %self.id, event = envelope.message.event_name(), "self echo");
            return Ok(());
        }
        match envelope.message {
            ChannelMessage::SyncRequest {
                kind,
                time,
                initiator,
            } => {
                if initiator == self.id || !sane_time(time) {
                    debug!(peer = %self.id, "dropping stale sync-request");
                    return Ok(());
                }
                self.on_sync_request(kind, time, initiator)
            }
            ChannelMessage::SyncAck { time, responder } => {
                if responder == self.id || !sane_time(time) {
                    debug!(peer = %self.id, "dropping stale sync-ack");
                    return Ok(());
                }
                self.on_sync_ack()
            }
            ChannelMessage::SyncGo { time } => self.on_sync_go(time),
            ChannelMessage::Pause { time } => self.on_remote_pause(time),
            ChannelMessage::Url { url } => {
                self.reset_session(Some(url.clone()));
                self.events.broadcast(EngineEvent::UrlChanged { url });
                Ok(())
            }
            ChannelMessage::StateRequest { requester_id } => {
                if requester_id == self.id {
                    return Ok(());
                }
                self.on_state_request(requester_id)
            }
            ChannelMessage::StateResponse {
                url,
                is_playing,
                time,
                responder_id: _,
                target_id,
            } => {
                if target_id != self.id {
                    debug!(peer = %self.id, target = %target_id, "state-response addressed elsewhere");
                    return Ok(());
                }
                self.on_state_response(url, is_playing, time)
            }
            ChannelMessage::TimeCheck { time, sender } => {
                if sender == self.id || !sane_time(time) {
                    return Ok(());
                }
                self.on_time_check(time)
            }
            ChannelMessage::VoiceAudio {
                audio,
                sender_id,
                duration_ms,
            } => {
                if sender_id == self.id {
                    return Ok(());
                }
                self.on_remote_voice(audio, duration_ms)
            }
        }
    }

    // ------------------------------------------------------------------
    // Timer dispatch
    // ------------------------------------------------------------------

    /// Fire every timer whose deadline has passed.
    pub fn tick(&mut self) -> Result<(), SyncError> {
        let now = self.clock.now();
        for kind in self.timers.take_due(now) {
            match kind {
                TimerKind::DebounceFlush => self.flush_local_intent()?,
                TimerKind::AckTimeout => self.on_ack_timeout()?,
                TimerKind::ReadyCheck => self.on_ready_check()?,
                TimerKind::DriftTick => self.on_drift_tick()?,
                TimerKind::RateRestore => {
                    self.media.set_rate(1.0);
                }
                TimerKind::SeekSettle => self.on_seek_settle(),
                TimerKind::VoiceResume => self.resume_after_voice()?,
            }
        }
        Ok(())
    }

    fn flush_local_intent(&mut self) -> Result<(), SyncError> {
        let Some(intent) = self.session.pending_intent.take() else {
            return Ok(());
        };
        if self.session.lock_held {
            // A remote request won the race during the quiet window.
            debug!(peer = %self.id, ?intent, "sync in progress, discarding debounced intent");
            return Ok(());
        }
        match intent {
            LocalIntent::Play => {
                let time = self.media.current_time();
                self.begin_handshake(SyncKind::Play, time)
            }
            LocalIntent::Seek(time) => self.begin_handshake(SyncKind::Seek, time),
            LocalIntent::Pause => {
                let time = self.media.current_time();
                self.finish_local_pause(time)
            }
        }
    }

    // ------------------------------------------------------------------
    // Shared internals
    // ------------------------------------------------------------------

    pub(crate) fn publish(&self, message: ChannelMessage) -> Result<(), SyncError> {
        trace!(peer = %self.id, event = message.event_name(), "publish");
        self.transport.publish(&message)?;
        Ok(())
    }

    pub(crate) fn set_phase(&mut self, phase: SyncPhase) {
        if self.session.phase != phase {
            debug!(peer = %self.id, from = self.session.phase.as_str(), to = phase.as_str(), "phase");
            self.session.phase = phase;
        }
        self.events.broadcast(EngineEvent::StateChanged {
            phase,
            playback: self.session.playback.clone(),
        });
    }

    pub(crate) fn lock(&mut self) {
        self.session.lock_held = true;
    }

    pub(crate) fn unlock(&mut self) {
        self.session.lock_held = false;
    }

    /// Enter `Playing` and arm the periodic drift probe.
    pub(crate) fn enter_playing(&mut self) {
        self.set_phase(SyncPhase::Playing);
        let at = self.clock.now() + self.tuning.drift_interval();
        self.timers.set(TimerKind::DriftTick, at);
    }

    /// Unconditional reset used by local and remote url changes: cancels
    /// every in-flight exchange, releases the lock, returns to `Idle`.
    pub(crate) fn reset_session(&mut self, url: Option<String>) {
        self.timers.cancel_all();
        self.media.set_rate(1.0);
        if self.session.ducked {
            // The voice-resume timer just died with the rest; restore the
            // output level instead of leaving it ducked forever.
            self.session.ducked = false;
            self.media.set_volume(self.session.user_volume);
            self.events.broadcast(EngineEvent::VolumeRestored {
                level: self.session.user_volume,
            });
        }
        self.session.pending = None;
        self.session.pending_intent = None;
        self.session.lock_held = false;
        self.session.echo.reset();
        self.session.voice_paused = false;
        self.session.playback = PlaybackState {
            url,
            playing: false,
            time: 0.0,
        };
        self.set_phase(SyncPhase::Idle);
    }
}

pub(crate) fn sane_time(time: f64) -> bool {
    time.is_finite() && time >= 0.0
}
