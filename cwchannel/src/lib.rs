//! Wire vocabulary and transport seam for the CoWatch sync engine.
//!
//! The engine never talks to a concrete network: it publishes
//! [`ChannelMessage`] values through a [`ChannelTransport`] and consumes
//! [`Envelope`]s from a subscription receiver. The transport contract is
//! deliberately weak (at-least-once delivery, no ordering across event
//! kinds, broadcasts echoed back to the sender) because that is all the
//! protocol layers above are allowed to assume.
//!
//! [`LoopbackHub`] is the in-process reference implementation used by tests
//! and demos. It round-trips every publish through JSON so that malformed
//! payloads are rejected at the seam, exactly as a real channel would.

mod errors;
mod loopback;
mod message;
mod transport;

pub use errors::ChannelError;
pub use loopback::{LoopbackChannel, LoopbackHub};
pub use message::{ChannelMessage, PeerId, SyncKind};
pub use transport::{ChannelTransport, Envelope};
