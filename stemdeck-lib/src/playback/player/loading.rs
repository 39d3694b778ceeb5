//! Track-set loading for `Player`.

use std::collections::HashSet;

use log::{info, warn};

use crate::audio::DecodedBuffer;
use crate::error::PlayerError;
use crate::events::StateChange;
use crate::playback::meter::Analyser;
use crate::track::decode::BusFormat;
use crate::track::loader::load_tracks;
use crate::track::{Track, TrackRequest};

use super::{Core, Player};

impl Core {
    /// Stop playback and drop the current track set. Returns whether
    /// anything was playing.
    fn teardown(&mut self) -> bool {
        let was_playing = self.transport.is_playing();
        self.stop_playback();
        self.transport.reset();
        self.tracks.clear();
        if let Some(backend) = self.backend.as_mut() {
            backend.disconnect_all();
        }
        was_playing
    }

    fn bus_format(&self) -> Option<BusFormat> {
        self.backend.as_ref().map(|backend| BusFormat {
            channels: backend.channels(),
            sample_rate: backend.sample_rate(),
        })
    }

    fn commit(&mut self, requests: &[TrackRequest], buffers: Vec<DecodedBuffer>) {
        let settings = &self.settings;
        self.tracks = requests
            .iter()
            .zip(buffers)
            .map(|(request, buffer)| {
                let analyser = Analyser::new(
                    settings.fft_size,
                    settings.smoothing_time_constant,
                    settings.min_decibels,
                    settings.max_decibels,
                );
                Track::new(request.name.clone(), buffer, analyser)
            })
            .collect();

        let chains = self.tracks.iter().map(|track| track.chain.clone()).collect();
        if let Some(backend) = self.backend.as_mut() {
            backend.connect(chains);
        }
        self.apply_gains();
    }
}

fn validate(requests: &[TrackRequest]) -> Result<(), PlayerError> {
    if requests.is_empty() {
        return Err(PlayerError::InvalidRequest(
            "track list is empty".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for request in requests {
        if !seen.insert(request.name.as_str()) {
            return Err(PlayerError::InvalidRequest(format!(
                "duplicate track name \"{}\"",
                request.name
            )));
        }
    }
    Ok(())
}

impl Player {
    /// Replace the loaded song with `requests`.
    ///
    /// Any previous track set is stopped and discarded first. Every source is
    /// fetched and decoded concurrently; progress is reported through
    /// `on_load_progress`. Blocks until all tracks are ready or one failed.
    ///
    /// # Errors
    ///
    /// * [`PlayerError::InvalidRequest`] for an empty list or duplicate names.
    /// * [`PlayerError::Fetch`] / [`PlayerError::Decode`] naming the first
    ///   track that failed. Nothing is committed and the player stays empty.
    /// * [`PlayerError::BackendUnavailable`] when no backend could be
    ///   created.
    ///
    /// Errors are also reported as `on_state_change` with `error` set.
    pub fn load(&self, requests: &[TrackRequest]) -> Result<(), PlayerError> {
        self.ticker.stop();

        let prepared = {
            let mut core = self.core.lock().unwrap();
            let was_playing = core.teardown();
            core.load_generation += 1;
            core.loading = true;
            let generation = core.load_generation;
            let prepared = validate(requests).and_then(|()| {
                core.ensure_backend()?;
                let format = core.bus_format().ok_or_else(|| {
                    PlayerError::BackendUnavailable("no audio backend".to_string())
                })?;
                Ok((generation, format, core.fetcher.clone()))
            });
            if prepared.is_err() {
                core.loading = false;
            }
            (was_playing, prepared)
        };
        let (was_playing, prepared) = prepared;

        self.callbacks.state_change(StateChange {
            is_loading: Some(true),
            is_playing: was_playing.then_some(false),
            duration: Some(0.0),
            current_time: Some(0.0),
            ..Default::default()
        });

        let (generation, format, fetcher) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => return Err(self.fail_load(err)),
        };

        info!("loading {} tracks", requests.len());
        let callbacks = self.callbacks.clone();
        let loaded = load_tracks(requests, fetcher.as_ref(), format, |progress| {
            callbacks.load_progress(progress)
        });

        let duration = {
            let mut core = self.core.lock().unwrap();
            if core.load_generation != generation {
                warn!("load {} superseded by a newer load", generation);
                return Err(PlayerError::InvalidRequest(
                    "load superseded by a newer load".to_string(),
                ));
            }
            core.loading = false;
            match loaded {
                Ok(buffers) => {
                    core.commit(requests, buffers);
                    core.duration()
                }
                Err(err) => {
                    drop(core);
                    return Err(self.fail_load(err));
                }
            }
        };

        info!("song ready ({:.2}s)", duration);
        self.callbacks.state_change(StateChange {
            is_loading: Some(false),
            duration: Some(duration),
            ..Default::default()
        });
        Ok(())
    }

    fn fail_load(&self, err: PlayerError) -> PlayerError {
        warn!("load failed: {}", err);
        self.callbacks.state_change(StateChange {
            is_loading: Some(false),
            error: Some(err.to_string()),
            ..Default::default()
        });
        err
    }
}
