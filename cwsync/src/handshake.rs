//! Request/ack/go coordinator for play and seek transitions.
//!
//! The extra ack/go round trip exists so that neither peer starts playback
//! while the other is still buffering after a seek: committing play is
//! deferred until both sides have signaled readiness at the same target
//! time. Pause needs none of this: it is commutative and propagates
//! immediately.

use tracing::{debug, warn};

use cwchannel::{ChannelMessage, PeerId, SyncKind};

use crate::engine::SyncEngine;
use crate::errors::SyncError;
use crate::events::EngineEvent;
use crate::model::{PendingTarget, SyncPhase};
use crate::timers::TimerKind;

impl SyncEngine {
    /// Initiator side: take the lock, commit the target, bound the wait for
    /// an ack, then broadcast the request. If no ack arrives before the
    /// deadline we proceed alone, which caps the added latency and keeps
    /// the session live when the peer is gone. State and the timeout are in
    /// place before the broadcast, so a failed publish degrades to the same
    /// fallback as a lost message.
    pub(crate) fn begin_handshake(&mut self, kind: SyncKind, time: f64) -> Result<(), SyncError> {
        self.lock();
        if kind == SyncKind::Seek {
            // A seek terminates paused on both sides; playing again after a
            // scrub is always an explicit user intent.
            if self.media.is_playing() {
                self.session.echo.arm_pause();
            }
            self.media.pause();
            self.session.echo.arm_seek();
            self.media.seek_to(time);
            self.session.playback.playing = false;
        }
        self.session.playback.time = time;
        self.session.pending = Some(PendingTarget {
            kind,
            time,
            initiator: self.id.clone(),
        });
        self.set_phase(SyncPhase::Requesting);
        self.set_phase(SyncPhase::WaitingAck);
        let at = self.clock.now() + self.tuning.ack_timeout();
        self.timers.set(TimerKind::AckTimeout, at);
        self.publish(ChannelMessage::SyncRequest {
            kind,
            time,
            initiator: self.id.clone(),
        })?;
        Ok(())
    }

    /// Responder side: pause, seek to the requested time with the echo
    /// guard armed, then poll readiness before acking.
    pub(crate) fn on_sync_request(
        &mut self,
        kind: SyncKind,
        time: f64,
        initiator: PeerId,
    ) -> Result<(), SyncError> {
        if self.session.lock_held {
            // At most one handshake per peer; the initiator's timeout path
            // covers the simultaneous-request race.
            debug!(peer = %self.id, initiator = %initiator, "handshake in progress, ignoring sync-request");
            return Ok(());
        }
        self.lock();
        self.session.pending = Some(PendingTarget {
            kind,
            time,
            initiator,
        });
        if self.media.is_playing() {
            self.session.echo.arm_pause();
        }
        self.media.pause();
        self.session.echo.arm_seek();
        self.media.seek_to(time);
        self.session.playback.playing = false;
        self.session.playback.time = time;
        self.session.ready_polls_left = self.tuning.ready_poll_max;
        self.set_phase(SyncPhase::Syncing);
        let at = self.clock.now() + self.tuning.ready_settle();
        self.timers.set(TimerKind::ReadyCheck, at);
        Ok(())
    }

    /// Bounded readiness poll. When the surface reports enough buffered
    /// data, or the attempt budget runs out, the responder acks at the
    /// target time.
    pub(crate) fn on_ready_check(&mut self) -> Result<(), SyncError> {
        if self.session.phase != SyncPhase::Syncing {
            return Ok(());
        }
        if !self.media.is_ready() && self.session.ready_polls_left > 0 {
            self.session.ready_polls_left -= 1;
            let at = self.clock.now() + self.tuning.ready_poll();
            self.timers.set(TimerKind::ReadyCheck, at);
            return Ok(());
        }
        if !self.media.is_ready() {
            warn!(peer = %self.id, "readiness poll budget exhausted, acking anyway");
        }
        let Some(pending) = self.session.pending.clone() else {
            self.unlock();
            self.set_phase(SyncPhase::Idle);
            return Ok(());
        };
        match pending.kind {
            SyncKind::Play => {
                // Hold the lock until the initiator's go, but bound the
                // wait: if the go (or our ack) is lost we proceed alone
                // like the initiator would.
                self.set_phase(SyncPhase::WaitingAck);
                let at = self.clock.now() + self.tuning.ack_timeout();
                self.timers.set(TimerKind::AckTimeout, at);
            }
            SyncKind::Seek => self.commit_paused(pending.time),
        }
        self.publish(ChannelMessage::SyncAck {
            time: pending.time,
            responder: self.id.clone(),
        })?;
        Ok(())
    }

    /// Initiator receiving the responder's ack: broadcast go and commit.
    pub(crate) fn on_sync_ack(&mut self) -> Result<(), SyncError> {
        let Some(pending) = self.session.pending.clone() else {
            debug!(peer = %self.id, "no pending target, dropping sync-ack");
            return Ok(());
        };
        if pending.initiator != self.id || self.session.phase != SyncPhase::WaitingAck {
            debug!(peer = %self.id, phase = self.session.phase.as_str(), "dropping sync-ack");
            return Ok(());
        }
        match pending.kind {
            SyncKind::Play => {
                self.commit_play(pending.time);
                self.publish(ChannelMessage::SyncGo { time: pending.time })?;
            }
            SyncKind::Seek => self.commit_paused(pending.time),
        }
        Ok(())
    }

    /// Responder receiving the initiator's commit signal.
    pub(crate) fn on_sync_go(&mut self, time: f64) -> Result<(), SyncError> {
        let stale = self.session.phase != SyncPhase::WaitingAck
            || self
                .session
                .pending
                .as_ref()
                .is_none_or(|p| p.initiator == self.id);
        if stale || !crate::engine::sane_time(time) {
            debug!(peer = %self.id, "dropping sync-go");
            return Ok(());
        }
        self.commit_play(time);
        Ok(())
    }

    /// No counterpart signal before the deadline: proceed alone.
    pub(crate) fn on_ack_timeout(&mut self) -> Result<(), SyncError> {
        let Some(pending) = self.session.pending.clone() else {
            return Ok(());
        };
        if self.session.phase != SyncPhase::WaitingAck {
            return Ok(());
        }
        warn!(peer = %self.id, kind = ?pending.kind, "no answer before deadline, proceeding alone");
        match pending.kind {
            SyncKind::Play => self.commit_play(pending.time),
            SyncKind::Seek => self.commit_paused(pending.time),
        }
        Ok(())
    }

    /// Terminal play commit: start the surface, release the lock, start
    /// drifting. A rejected start is surfaced as an event and the session
    /// still transitions; the caller owns remediation.
    pub(crate) fn commit_play(&mut self, time: f64) {
        self.timers.cancel(TimerKind::AckTimeout);
        self.session.pending = None;
        // Arm against the surface, not the session copy: a play driven
        // into an already playing element is a no-op and reports nothing
        // back, so arming there would swallow the next genuine play.
        if !self.media.is_playing() {
            self.session.echo.arm_play();
        }
        if let Err(err) = self.media.play() {
            warn!(peer = %self.id, error = %err, "media refused to start playback");
            self.session.echo.consume_play();
            self.events.broadcast(EngineEvent::PlayRejected {
                reason: err.to_string(),
            });
        }
        self.session.playback.playing = true;
        self.session.playback.time = time;
        self.unlock();
        self.enter_playing();
    }

    /// Terminal seek commit: both peers rest paused at the target.
    pub(crate) fn commit_paused(&mut self, time: f64) {
        self.timers.cancel(TimerKind::AckTimeout);
        self.session.pending = None;
        self.session.playback.playing = false;
        self.session.playback.time = time;
        self.unlock();
        self.set_phase(SyncPhase::Paused);
    }

    /// Local pause committed after the gate: rest paused, then broadcast.
    pub(crate) fn finish_local_pause(&mut self, time: f64) -> Result<(), SyncError> {
        self.session.playback.playing = false;
        self.session.playback.time = time;
        self.timers.cancel(TimerKind::DriftTick);
        self.set_phase(SyncPhase::Paused);
        self.publish(ChannelMessage::Pause { time })?;
        Ok(())
    }

    /// Remote pause: applied immediately with the echo guard armed.
    pub(crate) fn on_remote_pause(&mut self, time: f64) -> Result<(), SyncError> {
        if self.session.lock_held {
            debug!(peer = %self.id, "handshake in progress, dropping remote pause");
            return Ok(());
        }
        if self.media.is_playing() {
            self.session.echo.arm_pause();
        }
        self.media.pause();
        self.session.playback.playing = false;
        if crate::engine::sane_time(time) {
            self.session.playback.time = time;
        }
        self.timers.cancel(TimerKind::DriftTick);
        self.set_phase(SyncPhase::Paused);
        Ok(())
    }
}
