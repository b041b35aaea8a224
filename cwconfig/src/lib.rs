//! Configuration for the CoWatch sync engine.
//!
//! All protocol timing constants and drift bands live in [`SyncTuning`],
//! loaded from a YAML file merged over built-in defaults:
//! - default location: `~/.cowatch/cowatch.yaml`
//! - directory override: `COWATCH_CONFIG` environment variable
//! - a missing file is not an error; the embedded defaults apply.
//!
//! The engine takes a `SyncTuning` by value at construction, so tests can
//! shrink every window without touching the global singleton returned by
//! [`get_tuning`].

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use tracing::info;

const DEFAULT_CONFIG: &str = include_str!("cowatch.yaml");

const ENV_CONFIG_DIR: &str = "COWATCH_CONFIG";
const CONFIG_FILE_NAME: &str = "cowatch.yaml";

lazy_static! {
    static ref TUNING: Arc<SyncTuning> =
        Arc::new(SyncTuning::load().expect("failed to load CoWatch configuration"));
}

/// Global tunables singleton.
pub fn get_tuning() -> Arc<SyncTuning> {
    TUNING.clone()
}

/// Timing constants and drift bands of the synchronization protocol.
///
/// Times are milliseconds on disk; the `Duration` accessors are what the
/// engine consumes. Drift bands are seconds of playback-position delta.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncTuning {
    /// Quiet window collapsing rapid local play/pause/seek intents.
    pub debounce_ms: u64,
    /// Bound on the initiator's wait for a `sync-ack`; on expiry it
    /// proceeds alone.
    pub ack_timeout_ms: u64,
    /// Settle delay after a responder-side seek before the first
    /// readiness check.
    pub ready_settle_ms: u64,
    /// Interval between readiness re-checks.
    pub ready_poll_ms: u64,
    /// Readiness checks after which the responder acks anyway.
    pub ready_poll_max: u32,
    /// Period of the `time-check` broadcast while playing.
    pub drift_interval_ms: u64,
    /// Below this absolute delta (seconds), drift is ignored.
    pub drift_ignore_under: f64,
    /// Above this absolute delta (seconds), drift is corrected by a hard
    /// reseek; the band between is closed by a rate nudge.
    pub drift_hard_over: f64,
    /// Playback rate applied while the remote peer is ahead.
    pub nudge_rate_ahead: f64,
    /// Playback rate applied while the remote peer is behind.
    pub nudge_rate_behind: f64,
    /// How long a rate nudge stays applied before reverting to 1.0.
    pub nudge_window_ms: u64,
    /// Lock-release delay after a drift hard reseek.
    pub hard_seek_settle_ms: u64,
    /// When false, the voice entry points are no-ops and synchronization
    /// runs unaffected.
    pub voice_enabled: bool,
    /// Output volume while a voice message is audible, 0.0..=1.0.
    pub duck_level: f64,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            debounce_ms: 200,
            ack_timeout_ms: 3000,
            ready_settle_ms: 100,
            ready_poll_ms: 50,
            ready_poll_max: 100,
            drift_interval_ms: 2000,
            drift_ignore_under: 0.3,
            drift_hard_over: 1.5,
            nudge_rate_ahead: 1.05,
            nudge_rate_behind: 0.95,
            nudge_window_ms: 1500,
            hard_seek_settle_ms: 500,
            voice_enabled: true,
            duck_level: 0.25,
        }
    }
}

impl SyncTuning {
    /// Load tunables from the default location, falling back to the
    /// embedded defaults when no user file exists.
    pub fn load() -> Result<Self> {
        let path = config_file_path()?;
        if path.exists() {
            let tuning = Self::load_from(&path)?;
            info!(path = %path.display(), "loaded CoWatch tuning");
            Ok(tuning)
        } else {
            serde_yaml::from_str(DEFAULT_CONFIG).context("embedded default config is invalid")
        }
    }

    /// Load tunables from an explicit YAML file. Keys absent from the file
    /// keep their default values.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("cannot parse config file {}", path.display()))
    }

    /// Write the full tunable set to a YAML file.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("cannot create config dir {}", parent.display()))?;
        }
        let text = serde_yaml::to_string(self)?;
        fs::write(path, text)
            .with_context(|| format!("cannot write config file {}", path.display()))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn ready_settle(&self) -> Duration {
        Duration::from_millis(self.ready_settle_ms)
    }

    pub fn ready_poll(&self) -> Duration {
        Duration::from_millis(self.ready_poll_ms)
    }

    pub fn drift_interval(&self) -> Duration {
        Duration::from_millis(self.drift_interval_ms)
    }

    pub fn nudge_window(&self) -> Duration {
        Duration::from_millis(self.nudge_window_ms)
    }

    pub fn hard_seek_settle(&self) -> Duration {
        Duration::from_millis(self.hard_seek_settle_ms)
    }
}

fn config_file_path() -> Result<PathBuf> {
    let dir = match env::var(ENV_CONFIG_DIR) {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => home_dir()
            .context("cannot determine home directory")?
            .join(".cowatch"),
    };
    Ok(dir.join(CONFIG_FILE_NAME))
}
