use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    /// Playback start refused by the surface (autoplay policy and the
    /// like). The engine surfaces this as a non-fatal event and still
    /// transitions as committed; remediation belongs to the caller.
    #[error("playback start rejected: {0}")]
    PlayRejected(String),
}

/// The media element, seen through a backend-neutral control surface.
///
/// Contract expected by the engine: programmatic mutations are observed
/// back through the same callbacks as user gestures (the presentation
/// layer feeds them into [`SyncEngine::observe_media`]), which is what the
/// remote-echo guard is armed against.
///
/// [`SyncEngine::observe_media`]: crate::SyncEngine::observe_media
pub trait MediaSurface: Send {
    /// Current playback position, seconds.
    fn current_time(&self) -> f64;

    fn seek_to(&mut self, seconds: f64);

    /// Start playback. A play driven into an already playing element is a
    /// no-op that reports nothing back; the engine consults
    /// [`is_playing`](Self::is_playing) before arming its echo guard.
    fn play(&mut self) -> Result<(), MediaError>;

    fn pause(&mut self);

    /// True while the element is actively playing.
    fn is_playing(&self) -> bool;

    /// Playback-rate control, 1.0 is nominal.
    fn set_rate(&mut self, rate: f64);

    /// Output volume, 0.0..=1.0.
    fn set_volume(&mut self, level: f64);

    /// True once enough data is buffered to start at the current position.
    fn is_ready(&self) -> bool;
}

/// A locally observed media transition, fed through the debounce/lock gate
/// before it may become protocol traffic.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MediaEvent {
    Play,
    Pause,
    Seek(f64),
}
