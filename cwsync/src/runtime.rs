//! Thread driver for a [`SyncEngine`].
//!
//! The engine itself is single-threaded and run-to-completion; this module
//! owns one on a dedicated thread and multiplexes its inputs (the
//! presentation command channel, the transport inbox, and the timer table)
//! with a `select!` whose timeout tracks the engine's next deadline.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Sender, unbounded};
use tracing::{debug, warn};

use crate::engine::SyncEngine;
use crate::errors::SyncError;
use crate::media::MediaEvent;

/// Everything the presentation layer can ask of a running engine.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineCommand {
    RequestPlay,
    RequestPause,
    RequestSeek(f64),
    ChangeUrl(String),
    SetVolume(f64),
    ChannelReady,
    BeginVoice,
    EndVoice(Option<Duration>),
    VoiceFinished,
    /// A locally observed media transition, routed through the gate.
    Media(MediaEvent),
    Shutdown,
}

/// Handle on the engine thread.
pub struct SyncRuntime {
    commands: Sender<EngineCommand>,
    handle: Option<JoinHandle<()>>,
}

impl SyncRuntime {
    /// Move the engine onto its own thread and start driving it.
    ///
    /// Subscribe to engine events before spawning; the engine is consumed.
    pub fn spawn(mut engine: SyncEngine) -> Self {
        let inbox = engine.transport().subscribe();
        let clock = engine.clock();
        let (tx, rx) = unbounded::<EngineCommand>();

        let handle = thread::spawn(move || {
            // Upper bound on the sleep when no timer is armed, so a
            // deadline set by a racing input is picked up promptly.
            const IDLE_WAIT: Duration = Duration::from_millis(250);
            loop {
                let timeout = engine
                    .next_deadline()
                    .map(|at| at.saturating_duration_since(clock.now()))
                    .unwrap_or(IDLE_WAIT);
                crossbeam_channel::select! {
                    recv(rx) -> cmd => match cmd {
                        Ok(EngineCommand::Shutdown) | Err(_) => break,
                        Ok(cmd) => {
                            if let Err(err) = apply(&mut engine, cmd) {
                                warn!(error = %err, "engine command failed");
                            }
                        }
                    },
                    recv(inbox) -> envelope => match envelope {
                        Ok(envelope) => {
                            if let Err(err) = engine.handle_envelope(envelope) {
                                warn!(error = %err, "inbound message handling failed");
                            }
                        }
                        Err(_) => {
                            debug!("transport inbox closed, stopping engine");
                            break;
                        }
                    },
                    default(timeout) => {}
                }
                if let Err(err) = engine.tick() {
                    warn!(error = %err, "engine tick failed");
                }
            }
        });

        Self {
            commands: tx,
            handle: Some(handle),
        }
    }

    /// Queue a command for the engine thread. Returns false once the
    /// engine has stopped.
    pub fn command(&self, command: EngineCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.commands.send(EngineCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SyncRuntime {
    fn drop(&mut self) {
        self.stop();
    }
}

fn apply(engine: &mut SyncEngine, command: EngineCommand) -> Result<(), SyncError> {
    match command {
        EngineCommand::RequestPlay => engine.request_play(),
        EngineCommand::RequestPause => engine.request_pause(),
        EngineCommand::RequestSeek(time) => engine.request_seek(time),
        EngineCommand::ChangeUrl(url) => engine.change_url(url),
        EngineCommand::SetVolume(level) => {
            engine.set_volume(level);
            Ok(())
        }
        EngineCommand::ChannelReady => engine.channel_ready(),
        EngineCommand::BeginVoice => engine.begin_voice_activity(),
        EngineCommand::EndVoice(duration) => engine.end_voice_activity(duration),
        EngineCommand::VoiceFinished => engine.voice_playback_finished(),
        EngineCommand::Media(event) => engine.observe_media(event),
        EngineCommand::Shutdown => Ok(()),
    }
}
