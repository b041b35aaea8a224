//! Leaderless drift correction.
//!
//! While playing, both peers broadcast their position on a fixed period and
//! react to the other's probes; no peer is a clock authority. Small deltas
//! are ignored, the middle band is closed with a temporary playback-rate
//! bias (no visible jump), and anything beyond it hard-reseeks under the
//! lock.

use tracing::{debug, info};

use cwchannel::ChannelMessage;
use cwconfig::SyncTuning;

use crate::engine::SyncEngine;
use crate::errors::SyncError;
use crate::model::SyncPhase;
use crate::timers::TimerKind;

/// Correction decided from one consumed drift sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DriftAction {
    /// Micro-drift, below the ignore threshold.
    Ignore,
    /// Temporary playback-rate bias toward the remote position.
    Nudge { rate: f64 },
    /// Immediate jump to the remote position.
    HardSeek,
}

/// Classify a position delta (`remote - local`, seconds) into a correction.
///
/// The soft band is closed: a delta exactly at the hard threshold still
/// nudges, anything above it reseeks.
pub fn classify(delta: f64, tuning: &SyncTuning) -> DriftAction {
    if !delta.is_finite() {
        return DriftAction::Ignore;
    }
    let magnitude = delta.abs();
    if magnitude < tuning.drift_ignore_under {
        DriftAction::Ignore
    } else if magnitude <= tuning.drift_hard_over {
        let rate = if delta > 0.0 {
            tuning.nudge_rate_ahead
        } else {
            tuning.nudge_rate_behind
        };
        DriftAction::Nudge { rate }
    } else {
        DriftAction::HardSeek
    }
}

impl SyncEngine {
    /// Periodic probe: broadcast our position and rearm. Stops rearming as
    /// soon as the session leaves `Playing`; re-entering play rearms it.
    pub(crate) fn on_drift_tick(&mut self) -> Result<(), SyncError> {
        if self.session.phase != SyncPhase::Playing {
            return Ok(());
        }
        // Rearm before publishing so a failed broadcast cannot disarm the
        // loop; the peer just misses one probe.
        let at = self.clock.now() + self.tuning.drift_interval();
        self.timers.set(TimerKind::DriftTick, at);
        self.publish(ChannelMessage::TimeCheck {
            time: self.media.current_time(),
            sender: self.id.clone(),
        })?;
        Ok(())
    }

    /// React to the peer's probe. Only while playing and only when no
    /// handshake holds the lock: a sync in progress outranks correction.
    pub(crate) fn on_time_check(&mut self, remote_time: f64) -> Result<(), SyncError> {
        if self.session.phase != SyncPhase::Playing || self.session.lock_held {
            return Ok(());
        }
        let local_time = self.media.current_time();
        let delta = remote_time - local_time;
        match classify(delta, &self.tuning) {
            DriftAction::Ignore => {}
            DriftAction::Nudge { rate } => {
                debug!(peer = %self.id, delta, rate, "soft drift correction");
                self.media.set_rate(rate);
                let at = self.clock.now() + self.tuning.nudge_window();
                self.timers.set(TimerKind::RateRestore, at);
            }
            DriftAction::HardSeek => {
                info!(peer = %self.id, delta, target = remote_time, "hard reseek to remote position");
                self.lock();
                self.session.echo.arm_seek();
                self.media.seek_to(remote_time);
                self.session.playback.time = remote_time;
                let at = self.clock.now() + self.tuning.hard_seek_settle();
                self.timers.set(TimerKind::SeekSettle, at);
            }
        }
        Ok(())
    }

    /// Release the lock a hard reseek took, once the surface has settled.
    pub(crate) fn on_seek_settle(&mut self) {
        if self.session.pending.is_none() && self.session.lock_held {
            self.unlock();
        }
    }
}
