//! Voice arbitration: transient pause and ducking around voice messages.
//!
//! Voice is an unconditional local override layered above the protocol;
//! it never takes the handshake lock. A voice interruption that begins
//! mid-handshake aborts that handshake (pending target cleared, lock
//! released) rather than letting a deferred commit un-pause over an
//! audible message; the resumed play afterwards re-enters the normal
//! handshake. When voice support is disabled, every entry point here is a
//! no-op and synchronization continues unaffected.

use std::time::Duration;

use tracing::{debug, info};

use cwchannel::SyncKind;

use crate::engine::SyncEngine;
use crate::errors::SyncError;
use crate::events::EngineEvent;
use crate::model::SyncPhase;
use crate::timers::TimerKind;

impl SyncEngine {
    /// Outgoing voice activity started (push-to-talk press, recording
    /// begin): force pause immediately, no negotiation.
    pub fn begin_voice_activity(&mut self) -> Result<(), SyncError> {
        if !self.tuning.voice_enabled {
            return Ok(());
        }
        self.session.voice_active = true;
        self.interrupt_playback();
        Ok(())
    }

    /// Outgoing voice activity ended. A known positive duration schedules
    /// the resume for when the peer has heard the whole message; an
    /// unknown or degenerate duration resumes immediately.
    pub fn end_voice_activity(&mut self, duration: Option<Duration>) -> Result<(), SyncError> {
        if !self.tuning.voice_enabled {
            return Ok(());
        }
        self.session.voice_active = false;
        match duration {
            Some(d) if !d.is_zero() => {
                let at = self.clock.now() + d;
                self.timers.set(TimerKind::VoiceResume, at);
                Ok(())
            }
            _ => self.resume_after_voice(),
        }
    }

    /// The presentation layer finished playing out a remote voice message
    /// whose duration was not carried on the wire.
    pub fn voice_playback_finished(&mut self) -> Result<(), SyncError> {
        if !self.tuning.voice_enabled {
            return Ok(());
        }
        self.resume_after_voice()
    }

    /// A remote voice payload arrived: duck the output, force pause, hand
    /// the audio to the presentation layer, and schedule the resume if the
    /// payload carries its duration.
    pub(crate) fn on_remote_voice(
        &mut self,
        audio: String,
        duration_ms: Option<u64>,
    ) -> Result<(), SyncError> {
        if !self.tuning.voice_enabled {
            debug!(peer = %self.id, "voice disabled, dropping voice payload");
            return Ok(());
        }
        if !self.session.ducked {
            self.session.ducked = true;
            self.media.set_volume(self.tuning.duck_level);
            self.events.broadcast(EngineEvent::VolumeDucked {
                level: self.tuning.duck_level,
            });
        }
        self.interrupt_playback();
        self.events.broadcast(EngineEvent::VoiceMessage {
            audio,
            duration_ms,
        });
        match duration_ms {
            Some(ms) if ms > 0 => {
                let at = self.clock.now() + Duration::from_millis(ms);
                self.timers.set(TimerKind::VoiceResume, at);
            }
            _ => {
                // No duration on the wire; wait for voice_playback_finished.
            }
        }
        Ok(())
    }

    /// Unconditional override: abort any in-flight handshake, then pause
    /// if playing and remember that voice caused it.
    fn interrupt_playback(&mut self) {
        if self.session.lock_held {
            info!(peer = %self.id, "voice interrupt aborts in-flight handshake");
            self.timers.cancel(TimerKind::AckTimeout);
            self.timers.cancel(TimerKind::ReadyCheck);
            self.session.pending = None;
            self.unlock();
            self.set_phase(SyncPhase::Paused);
        }
        self.timers.cancel(TimerKind::VoiceResume);
        if self.media.is_playing() {
            self.session.echo.arm_pause();
            self.media.pause();
            self.session.playback.playing = false;
            self.session.voice_paused = true;
            self.timers.cancel(TimerKind::DriftTick);
            self.set_phase(SyncPhase::Paused);
        }
    }

    /// The voice message is over: restore the output level, and if voice
    /// was what paused playback, re-enter the play path.
    pub(crate) fn resume_after_voice(&mut self) -> Result<(), SyncError> {
        self.timers.cancel(TimerKind::VoiceResume);
        if self.session.ducked {
            self.session.ducked = false;
            self.media.set_volume(self.session.user_volume);
            self.events.broadcast(EngineEvent::VolumeRestored {
                level: self.session.user_volume,
            });
        }
        if self.session.voice_paused && !self.session.voice_active {
            self.session.voice_paused = false;
            if self.session.lock_held {
                // A new handshake started while the message played out; let
                // it decide the resting state instead of racing it.
                debug!(peer = %self.id, "sync in progress, skipping voice resume");
                return Ok(());
            }
            let time = self.media.current_time();
            self.begin_handshake(SyncKind::Play, time)?;
        }
        Ok(())
    }
}
