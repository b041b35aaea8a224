use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque peer identifier assigned by the transport at connect time.
///
/// Used to self-filter echoed broadcasts and to address `state-response`
/// messages. The engine never inspects its contents.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Which media transition a `sync-request` negotiates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    Play,
    Seek,
}

/// Closed wire vocabulary of the synchronization protocol.
///
/// One variant per channel event; the serialized form is
/// `{"event": "<kebab-case name>", "data": {...camelCase fields...}}`.
/// Payloads that do not match a variant exactly are rejected on receipt
/// rather than trusted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ChannelMessage {
    /// Opens a play or seek handshake at a shared target time.
    #[serde(rename_all = "camelCase")]
    SyncRequest {
        #[serde(rename = "type")]
        kind: SyncKind,
        time: f64,
        initiator: PeerId,
    },
    /// Responder is buffered and ready at the requested time.
    #[serde(rename_all = "camelCase")]
    SyncAck { time: f64, responder: PeerId },
    /// Initiator's commit signal: both sides start playback now.
    SyncGo { time: f64 },
    /// Unnegotiated pause; commutative, applied on receipt.
    Pause { time: f64 },
    /// Feed change; both peers reset playback state.
    Url { url: String },
    /// Late joiner asking any present peer for the current state.
    #[serde(rename_all = "camelCase")]
    StateRequest { requester_id: PeerId },
    /// Snapshot answer, logically addressed to `target_id`.
    #[serde(rename_all = "camelCase")]
    StateResponse {
        url: String,
        is_playing: bool,
        time: f64,
        responder_id: PeerId,
        target_id: PeerId,
    },
    /// Periodic drift probe carrying the sender's playback position.
    #[serde(rename_all = "camelCase")]
    TimeCheck { time: f64, sender: PeerId },
    /// Encoded voice payload. `duration_ms` lets the receiver schedule its
    /// playback-resume without a separate end signal.
    #[serde(rename_all = "camelCase")]
    VoiceAudio {
        audio: String,
        sender_id: PeerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },
}

impl ChannelMessage {
    /// Wire event name, as it appears in the serialized `event` tag.
    pub fn event_name(&self) -> &'static str {
        match self {
            ChannelMessage::SyncRequest { .. } => "sync-request",
            ChannelMessage::SyncAck { .. } => "sync-ack",
            ChannelMessage::SyncGo { .. } => "sync-go",
            ChannelMessage::Pause { .. } => "pause",
            ChannelMessage::Url { .. } => "url",
            ChannelMessage::StateRequest { .. } => "state-request",
            ChannelMessage::StateResponse { .. } => "state-response",
            ChannelMessage::TimeCheck { .. } => "time-check",
            ChannelMessage::VoiceAudio { .. } => "voice-audio",
        }
    }
}
