//! Playback synchronization and voice arbitration for a two-peer
//! watch-together room.
//!
//! [`SyncEngine`] keeps one shared illusion of `{url, playing, time}` across
//! two peers connected by a lossy, unordered pub/sub channel:
//! - play and seek transitions run a request/ack/go handshake so neither
//!   side starts before both are buffered at the target time;
//! - pause and url changes propagate without negotiation;
//! - a periodic time exchange corrects drift (ignore / rate nudge / hard
//!   reseek), leaderless and symmetric;
//! - a late joiner bootstraps from any present peer's state snapshot;
//! - voice activity pauses playback and ducks the output volume, restoring
//!   both when the message ends.
//!
//! The engine is single-threaded and run-to-completion: handlers mutate the
//! session synchronously and all waiting is expressed as deadlines in a
//! timer table fired by [`SyncEngine::tick`]. [`SyncRuntime`] drives an
//! engine from a dedicated thread; tests drive it directly under a manual
//! clock.

mod bootstrap;
mod clock;
pub mod drift;
mod engine;
mod errors;
mod events;
mod handshake;
mod media;
mod model;
mod runtime;
mod timers;
mod voice;

pub use clock::{Clock, ManualClock, SystemClock};
pub use drift::{DriftAction, classify};
pub use engine::SyncEngine;
pub use errors::SyncError;
pub use events::{EngineEvent, EngineEventBus};
pub use media::{MediaError, MediaEvent, MediaSurface};
pub use model::{PlaybackState, SyncPhase};
pub use runtime::{EngineCommand, SyncRuntime};
