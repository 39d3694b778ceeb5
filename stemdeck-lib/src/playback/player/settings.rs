use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::track::fetch::SourceFetcher;

use super::Player;

/// Tunables of a [`Player`].
///
/// Every field has a default, so a partial JSON object deserializes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Progress loop period in milliseconds.
    pub tick_interval_ms: u64,
    /// Time constant (seconds) of gain changes.
    pub gain_time_constant: f32,
    /// Analyser FFT size; also the analysis tap length.
    pub fft_size: usize,
    /// Meter smoothing in `[0, 1)`.
    pub smoothing_time_constant: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
    /// Bytes per read when fetching local sources.
    pub fetch_chunk_size: usize,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 16,
            gain_time_constant: 0.01,
            fft_size: 256,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
            fetch_chunk_size: 64 * 1024,
        }
    }
}

impl PlayerSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

impl Player {
    /// Current settings.
    pub fn settings(&self) -> PlayerSettings {
        self.core.lock().unwrap().settings.clone()
    }

    /// Configure the progress loop period (ms). Takes effect on the next play.
    pub fn set_tick_interval_ms(&self, ms: u64) {
        self.core.lock().unwrap().settings.tick_interval_ms = ms.max(1);
    }

    /// Configure the gain smoothing time constant (seconds).
    pub fn set_gain_time_constant(&self, seconds: f32) {
        self.core.lock().unwrap().settings.gain_time_constant = seconds.max(0.0);
    }

    /// Resolve relative locators against `base_dir` with the default fetcher.
    pub fn set_base_dir(&self, base_dir: impl Into<std::path::PathBuf>) {
        let mut core = self.core.lock().unwrap();
        let chunk_size = core.settings.fetch_chunk_size;
        core.fetcher = std::sync::Arc::new(SourceFetcher::new(base_dir).with_chunk_size(chunk_size));
    }
}
