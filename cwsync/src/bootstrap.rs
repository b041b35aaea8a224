//! Late-joiner state bootstrap.
//!
//! A peer reaching a connected channel asks the room for its current state
//! and adopts the answer directly. This is initial convergence, not a
//! live transition, so the play handshake is deliberately bypassed.

use tracing::{debug, info, warn};

use cwchannel::{ChannelMessage, PeerId};

use crate::engine::{SyncEngine, sane_time};
use crate::errors::SyncError;
use crate::events::EngineEvent;
use crate::model::SyncPhase;

impl SyncEngine {
    /// Call once the transport reports a connected, subscribed channel.
    pub fn channel_ready(&mut self) -> Result<(), SyncError> {
        if !self.transport.is_connected() {
            warn!(peer = %self.id, "channel not connected yet, skipping state request");
            return Ok(());
        }
        info!(peer = %self.id, "channel ready, requesting room state");
        self.publish(ChannelMessage::StateRequest {
            requester_id: self.id.clone(),
        })
    }

    /// Any present peer answers a state request with its snapshot,
    /// addressed to the requester.
    pub(crate) fn on_state_request(&mut self, requester: PeerId) -> Result<(), SyncError> {
        let playback = &self.session.playback;
        let time = if playback.playing {
            self.media.current_time()
        } else {
            playback.time
        };
        self.publish(ChannelMessage::StateResponse {
            url: playback.url.clone().unwrap_or_default(),
            is_playing: playback.playing,
            time,
            responder_id: self.id.clone(),
            target_id: requester,
        })
    }

    /// Adopt the responder's snapshot: url if different, position if
    /// positive, playing/paused to match.
    pub(crate) fn on_state_response(
        &mut self,
        url: String,
        is_playing: bool,
        time: f64,
    ) -> Result<(), SyncError> {
        if self.session.lock_held {
            debug!(peer = %self.id, "handshake in progress, dropping state-response");
            return Ok(());
        }
        if !url.is_empty() && self.session.playback.url.as_deref() != Some(url.as_str()) {
            self.session.playback.url = Some(url.clone());
            self.events.broadcast(EngineEvent::UrlChanged { url });
        }
        if sane_time(time) && time > 0.0 {
            self.session.echo.arm_seek();
            self.media.seek_to(time);
            self.session.playback.time = time;
        }
        if is_playing {
            if !self.media.is_playing() {
                self.session.echo.arm_play();
            }
            if let Err(err) = self.media.play() {
                warn!(peer = %self.id, error = %err, "media refused to start during bootstrap");
                self.session.echo.consume_play();
                self.events.broadcast(EngineEvent::PlayRejected {
                    reason: err.to_string(),
                });
            }
            self.session.playback.playing = true;
            self.enter_playing();
        } else if self.session.playback.url.is_some() || self.session.playback.time > 0.0 {
            self.set_phase(SyncPhase::Paused);
        }
        Ok(())
    }
}
