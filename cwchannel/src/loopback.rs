use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::debug;
use uuid::Uuid;

use crate::errors::ChannelError;
use crate::message::{ChannelMessage, PeerId};
use crate::transport::{ChannelTransport, Envelope};

struct Member {
    id: PeerId,
    subscribers: Vec<Sender<Envelope>>,
}

#[derive(Default)]
struct HubInner {
    members: Mutex<Vec<Member>>,
}

/// In-process broadcast hub implementing the room channel contract.
///
/// Every publish is round-tripped through its JSON wire form before fan-out,
/// so a payload that would not survive a real channel is dropped here too.
/// Broadcasts are echoed back to the sender, matching the self-filtering
/// requirement the engine is built around.
#[derive(Clone, Default)]
pub struct LoopbackHub {
    inner: Arc<HubInner>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the room, receiving a transport handle with a fresh peer id.
    pub fn join(&self) -> LoopbackChannel {
        let id = PeerId::new(Uuid::new_v4().to_string());
        {
            let mut members = self.inner.members.lock().unwrap();
            members.push(Member {
                id: id.clone(),
                subscribers: Vec::new(),
            });
        }
        LoopbackChannel {
            inner: Arc::clone(&self.inner),
            id,
        }
    }

    /// Inject a raw wire frame, as a remote client would put it on the
    /// channel. Malformed frames are dropped, not surfaced.
    pub fn inject_raw(&self, from: &PeerId, frame: &str) {
        deliver(&self.inner, from, frame);
    }
}

fn deliver(inner: &HubInner, from: &PeerId, frame: &str) {
    let message: ChannelMessage = match serde_json::from_str(frame) {
        Ok(message) => message,
        Err(err) => {
            debug!(from = %from, error = %err, "dropping malformed channel frame");
            return;
        }
    };
    let envelope = Envelope {
        from: from.clone(),
        message,
    };
    let mut members = inner.members.lock().unwrap();
    for member in members.iter_mut() {
        member
            .subscribers
            .retain(|tx| tx.send(envelope.clone()).is_ok());
    }
}

/// One peer's handle on a [`LoopbackHub`] room.
pub struct LoopbackChannel {
    inner: Arc<HubInner>,
    id: PeerId,
}

impl ChannelTransport for LoopbackChannel {
    fn local_peer(&self) -> &PeerId {
        &self.id
    }

    fn publish(&self, message: &ChannelMessage) -> Result<(), ChannelError> {
        let frame = serde_json::to_string(message)?;
        deliver(&self.inner, &self.id, &frame);
        Ok(())
    }

    fn subscribe(&self) -> Receiver<Envelope> {
        let (tx, rx) = unbounded::<Envelope>();
        let mut members = self.inner.members.lock().unwrap();
        if let Some(member) = members.iter_mut().find(|m| m.id == self.id) {
            member.subscribers.push(tx);
        }
        rx
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn peers(&self) -> Vec<PeerId> {
        let members = self.inner.members.lock().unwrap();
        members.iter().map(|m| m.id.clone()).collect()
    }
}
