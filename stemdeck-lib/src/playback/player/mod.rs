//! High-level multitrack player.
//!
//! `Player` is a cheap, cloneable handle. All clones share one engine core
//! behind a mutex; callbacks are always invoked after that mutex has been
//! released, so a callback may call straight back into the player.

mod controls;
mod loading;
mod mixing;
mod settings;
mod unlock;

use std::sync::{Arc, Mutex, Weak};

use log::{debug, warn};

use crate::error::PlayerError;
use crate::events::{Callbacks, LoadProgress, StateChange, TrackLevel};
use crate::playback::backend::{AudioBackend, BackendFactory, BackendState};
use crate::playback::meter::rms_level;
use crate::playback::mix::effective_gains;
use crate::playback::ticker::Ticker;
use crate::playback::transport::Transport;
use crate::track::fetch::{Fetcher, SourceFetcher};
use crate::track::Track;

pub use settings::PlayerSettings;

/// Engine state shared by every `Player` clone and the progress loop.
pub(crate) struct Core {
    factory: Box<dyn BackendFactory>,
    backend: Option<Box<dyn AudioBackend>>,
    tracks: Vec<Track>,
    transport: Transport,
    unlocked: bool,
    loading: bool,
    load_generation: u64,
    settings: PlayerSettings,
    fetcher: Arc<dyn Fetcher>,
}

impl Core {
    /// Hardware clock of the current backend, or 0 without one.
    fn now(&self) -> f64 {
        self.backend
            .as_ref()
            .map(|backend| backend.current_time())
            .unwrap_or(0.0)
    }

    /// Duration of the first track in request order.
    fn duration(&self) -> f64 {
        self.tracks
            .first()
            .map(|track| track.buffer.duration())
            .unwrap_or(0.0)
    }

    fn current_time(&self) -> f64 {
        self.transport.elapsed(self.now())
    }

    /// Make sure a usable backend exists, creating one when there is none
    /// or the current one was closed. A new backend gets the current chains.
    fn ensure_backend(&mut self) -> Result<bool, PlayerError> {
        let usable = self
            .backend
            .as_ref()
            .is_some_and(|backend| backend.state() != BackendState::Closed);
        if usable {
            return Ok(false);
        }

        let mut backend = self.factory.create()?;
        debug!(
            "created audio backend ({} channels @ {}Hz)",
            backend.channels(),
            backend.sample_rate()
        );
        if !self.tracks.is_empty() {
            backend.connect(self.tracks.iter().map(|t| t.chain.clone()).collect());
        }
        self.backend = Some(backend);
        self.unlocked = false;
        Ok(true)
    }

    /// Push the effective gain of every track to its chain.
    fn apply_gains(&self) {
        let gains = effective_gains(self.tracks.iter().map(|track| &track.mix));
        for (track, gain) in self.tracks.iter().zip(gains) {
            track
                .chain
                .gain
                .set_target(gain, self.settings.gain_time_constant);
        }
    }

    fn gain_of(&self, index: usize) -> f32 {
        effective_gains(self.tracks.iter().map(|track| &track.mix))
            .get(index)
            .copied()
            .unwrap_or(0.0)
    }

    /// Read every track's meter from its analysis tap.
    fn sample_levels(&mut self) -> Vec<TrackLevel> {
        self.tracks
            .iter_mut()
            .map(|track| {
                let window = track.chain.tap.snapshot();
                let bins = track.analyser.byte_frequency_data(&window);
                TrackLevel {
                    name: track.name.clone(),
                    level: rms_level(&bins),
                }
            })
            .collect()
    }

    fn find_track(&self, name: &str) -> Result<usize, PlayerError> {
        self.tracks
            .iter()
            .position(|track| track.name == name)
            .ok_or_else(|| PlayerError::NotFound(format!("track \"{}\"", name)))
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            backend.stop_sources();
            backend.close();
        }
    }
}

/// Synchronized multitrack player.
#[derive(Clone)]
pub struct Player {
    core: Arc<Mutex<Core>>,
    callbacks: Arc<Callbacks>,
    ticker: Ticker,
}

impl Player {
    /// Create a player that acquires its audio backend lazily from `factory`.
    pub fn new(factory: impl BackendFactory + 'static) -> Self {
        Self::with_settings(factory, PlayerSettings::default())
    }

    pub fn with_settings(factory: impl BackendFactory + 'static, settings: PlayerSettings) -> Self {
        let fetcher = SourceFetcher::default().with_chunk_size(settings.fetch_chunk_size);
        Self {
            core: Arc::new(Mutex::new(Core {
                factory: Box::new(factory),
                backend: None,
                tracks: Vec::new(),
                transport: Transport::new(),
                unlocked: false,
                loading: false,
                load_generation: 0,
                settings,
                fetcher: Arc::new(fetcher),
            })),
            callbacks: Arc::new(Callbacks::default()),
            ticker: Ticker::new(),
        }
    }

    /// Replace the byte fetcher used by subsequent loads.
    pub fn set_fetcher(&self, fetcher: Arc<dyn Fetcher>) {
        self.core.lock().unwrap().fetcher = fetcher;
    }

    pub fn on_load_progress(&self, handler: impl Fn(LoadProgress) + Send + Sync + 'static) {
        self.callbacks.set_load_progress(Arc::new(handler));
    }

    pub fn on_state_change(&self, handler: impl Fn(StateChange) + Send + Sync + 'static) {
        self.callbacks.set_state_change(Arc::new(handler));
    }

    /// Called with `(current_time, duration)` on every tick while playing
    /// and once per seek while paused.
    pub fn on_progress_update(&self, handler: impl Fn(f64, f64) + Send + Sync + 'static) {
        self.callbacks.set_progress_update(Arc::new(handler));
    }

    pub fn on_meter_update(&self, handler: impl Fn(Vec<TrackLevel>) + Send + Sync + 'static) {
        self.callbacks.set_meter_update(Arc::new(handler));
    }

    /// Duration of the loaded song in seconds, 0 when empty.
    pub fn get_duration(&self) -> f64 {
        self.core.lock().unwrap().duration()
    }

    /// Transport position in seconds.
    pub fn get_current_time(&self) -> f64 {
        self.core.lock().unwrap().current_time()
    }

    pub fn is_playing(&self) -> bool {
        self.core.lock().unwrap().transport.is_playing()
    }

    pub fn is_loading(&self) -> bool {
        self.core.lock().unwrap().loading
    }

    fn emit_error(&self, error: &PlayerError) {
        self.callbacks.state_change(StateChange {
            error: Some(error.to_string()),
            ..Default::default()
        });
    }

    fn start_ticker(&self) {
        let interval = self.core.lock().unwrap().settings.tick_interval();
        let core: Weak<Mutex<Core>> = Arc::downgrade(&self.core);
        let callbacks = self.callbacks.clone();
        let ticker = self.ticker.clone();
        self.ticker.start(interval, move || match core.upgrade() {
            Some(core) => Player {
                core,
                callbacks: callbacks.clone(),
                ticker: ticker.clone(),
            }
            .tick(),
            None => {
                warn!("player dropped while ticking");
                false
            }
        });
    }
}
