use crossbeam_channel::Receiver;

use crate::errors::ChannelError;
use crate::message::{ChannelMessage, PeerId};

/// One delivered broadcast. The transport stamps the sender's identity so
/// receivers can self-filter even for payloads that carry no identity field
/// (`sync-go`, `pause`, `url`).
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub from: PeerId,
    pub message: ChannelMessage,
}

/// Publish/subscribe channel shared by the two peers of a room.
///
/// Contract assumed by the engine:
/// - `publish` broadcasts to every member of the room, the sender included;
/// - delivery is at-least-once and unordered across event kinds;
/// - messages may be lost; nothing above this seam retries.
pub trait ChannelTransport: Send + Sync {
    /// Identity assigned to this peer at connect time.
    fn local_peer(&self) -> &PeerId;

    /// Broadcast a message to the room.
    fn publish(&self, message: &ChannelMessage) -> Result<(), ChannelError>;

    /// Open a subscription delivering every inbound envelope.
    fn subscribe(&self) -> Receiver<Envelope>;

    fn is_connected(&self) -> bool;

    /// Presence roster, local peer included.
    fn peers(&self) -> Vec<PeerId>;
}
