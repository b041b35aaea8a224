use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::Serialize;

use crate::model::{PlaybackState, SyncPhase};

/// Notifications for the presentation layer. Events are refresh signals;
/// [`SyncEngine::playback_state`] stays the source of truth.
///
/// [`SyncEngine::playback_state`]: crate::SyncEngine::playback_state
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    StateChanged {
        phase: SyncPhase,
        playback: PlaybackState,
    },
    UrlChanged {
        url: String,
    },
    /// The media surface refused to start (autoplay policy, ...). The
    /// session still transitioned; the caller owns remediation.
    PlayRejected {
        reason: String,
    },
    /// A remote voice payload to decode and play out.
    VoiceMessage {
        audio: String,
        duration_ms: Option<u64>,
    },
    VolumeDucked {
        level: f64,
    },
    VolumeRestored {
        level: f64,
    },
}

#[derive(Clone, Default)]
pub struct EngineEventBus {
    subscribers: Arc<Mutex<Vec<Sender<EngineEvent>>>>,
}

impl EngineEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        let (tx, rx) = unbounded::<EngineEvent>();
        {
            let mut subscribers = self.subscribers.lock().unwrap();
            subscribers.push(tx);
        }
        rx
    }

    pub(crate) fn broadcast(&self, event: EngineEvent) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
