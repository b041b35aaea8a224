use std::time::Instant;

/// Every suspension point of the engine, as data. One deadline slot per
/// kind; setting a kind again replaces its deadline, which is exactly the
/// cancel-and-rearm semantics the protocol needs (debounce supersede,
/// drift rearm, voice-resume reschedule).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TimerKind {
    /// Quiet-window flush of the pending local intent.
    DebounceFlush,
    /// Initiator/responder bound on the handshake counterpart signal.
    AckTimeout,
    /// Responder readiness check (first one doubles as the settle delay).
    ReadyCheck,
    /// Periodic `time-check` broadcast while playing.
    DriftTick,
    /// Revert a drift rate nudge to 1.0.
    RateRestore,
    /// Release the lock after a drift hard reseek.
    SeekSettle,
    /// Resume playback after a voice message of known duration.
    VoiceResume,
}

#[derive(Debug, Default)]
pub(crate) struct TimerSet {
    entries: Vec<(TimerKind, Instant)>,
}

impl TimerSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&mut self, kind: TimerKind, at: Instant) {
        self.cancel(kind);
        self.entries.push((kind, at));
    }

    pub(crate) fn cancel(&mut self, kind: TimerKind) {
        self.entries.retain(|(k, _)| *k != kind);
    }

    pub(crate) fn cancel_all(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.entries.iter().map(|(_, at)| *at).min()
    }

    /// Remove and return every timer due at `now`, earliest first.
    pub(crate) fn take_due(&mut self, now: Instant) -> Vec<TimerKind> {
        let mut due: Vec<(TimerKind, Instant)> = Vec::new();
        self.entries.retain(|entry| {
            if entry.1 <= now {
                due.push(*entry);
                false
            } else {
                true
            }
        });
        due.sort_by_key(|(_, at)| *at);
        due.into_iter().map(|(kind, _)| kind).collect()
    }
}
