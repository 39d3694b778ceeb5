//! Transport operations for `Player`.
//!
//! Every operation mutates the core under its lock, releases the lock, and
//! only then emits callbacks and starts or stops the progress loop.

use log::{debug, info};

use crate::error::PlayerError;
use crate::events::StateChange;
use crate::playback::backend::BackendState;
use crate::playback::graph::LiveSource;

use super::{Core, Player};

impl Core {
    /// Bring the backend to `Running` and batch-start one fresh source per
    /// track at the paused offset.
    pub(super) fn start_playback(&mut self) -> Result<(), PlayerError> {
        let created = self.ensure_backend()?;
        let needs_gesture = self
            .backend
            .as_ref()
            .is_some_and(|backend| backend.requires_user_gesture());
        if created || (needs_gesture && !self.unlocked) {
            self.force_unlock();
        }
        if needs_gesture && !self.unlocked {
            return Err(PlayerError::BackendUnavailable(
                "audio output is locked until a user gesture".to_string(),
            ));
        }

        let Some(backend) = self.backend.as_mut() else {
            return Err(PlayerError::BackendUnavailable(
                "no audio backend".to_string(),
            ));
        };

        if matches!(
            backend.state(),
            BackendState::Suspended | BackendState::Interrupted
        ) {
            backend.resume()?;
        }
        if backend.state() != BackendState::Running {
            return Err(PlayerError::BackendUnavailable(format!(
                "audio backend is {:?}",
                backend.state()
            )));
        }

        let now = backend.current_time();
        self.transport.start(now);
        let offset = self.transport.paused_offset();

        let sources: Vec<LiveSource> = self
            .tracks
            .iter()
            .enumerate()
            .map(|(index, track)| LiveSource::new(index, track.buffer.clone(), offset))
            .collect();
        for (track, source) in self.tracks.iter_mut().zip(&sources) {
            track.live_source = Some(source.id());
        }
        debug!("starting {} sources at {:.3}s", sources.len(), offset);
        backend.start_sources(sources);
        Ok(())
    }

    fn halt_sources(&mut self) {
        let scheduled = self
            .tracks
            .iter_mut()
            .filter_map(|track| track.live_source.take())
            .count();
        if let Some(backend) = self.backend.as_mut() {
            backend.stop_sources();
        }
        if scheduled > 0 {
            debug!("discarded {} live sources", scheduled);
        }
    }

    /// Returns `false` when nothing was playing.
    pub(super) fn pause_playback(&mut self) -> bool {
        if !self.transport.is_playing() {
            return false;
        }
        let now = self.now();
        self.transport.pause(now);
        self.halt_sources();
        true
    }

    /// Halt every source, rewind to 0 and clear meter history.
    pub(super) fn stop_playback(&mut self) {
        self.halt_sources();
        self.transport.stop();
        for track in &mut self.tracks {
            track.analyser.reset();
        }
    }
}

impl Player {
    /// Start playback of every loaded track from the current position.
    ///
    /// No-op when already playing or when nothing is loaded.
    ///
    /// # Errors
    ///
    /// [`PlayerError::BackendUnavailable`] when the output cannot be started,
    /// including when it is still locked behind a user gesture. The player
    /// stays stopped and the error is also reported through
    /// `on_state_change`.
    pub fn play(&self) -> Result<(), PlayerError> {
        let result = {
            let mut core = self.core.lock().unwrap();
            if core.transport.is_playing() || core.tracks.is_empty() {
                return Ok(());
            }
            core.start_playback()
        };

        match result {
            Ok(()) => {
                info!("playback started");
                self.callbacks.state_change(StateChange {
                    is_playing: Some(true),
                    ..Default::default()
                });
                self.start_ticker();
                Ok(())
            }
            Err(err) => {
                self.emit_error(&err);
                Err(err)
            }
        }
    }

    /// Pause at the current position. No-op when not playing.
    pub fn pause(&self) {
        let generation = self.ticker.generation();
        let paused = self.core.lock().unwrap().pause_playback();
        if paused {
            info!("playback paused");
            self.callbacks.state_change(StateChange {
                is_playing: Some(false),
                ..Default::default()
            });
            self.ticker.stop_if(generation);
        }
    }

    /// Stop and rewind to 0. No-op when nothing is loaded.
    pub fn stop(&self) {
        let generation = self.ticker.generation();
        {
            let mut core = self.core.lock().unwrap();
            if core.tracks.is_empty() {
                return;
            }
            core.stop_playback();
        }
        info!("playback stopped");
        self.callbacks.state_change(StateChange {
            is_playing: Some(false),
            current_time: Some(0.0),
            ..Default::default()
        });
        self.ticker.stop_if(generation);
    }

    /// Move the transport to `time` seconds, clamped to the song.
    ///
    /// While playing, every source is restarted at the new offset. While
    /// paused, only the offset moves and one progress update is emitted.
    ///
    /// # Errors
    ///
    /// [`PlayerError::InvalidRequest`] for a non-finite time, or the
    /// restart error when playback could not resume at the new offset.
    pub fn seek(&self, time: f64) -> Result<(), PlayerError> {
        if !time.is_finite() {
            return Err(PlayerError::InvalidRequest(format!(
                "seek time {} is not finite",
                time
            )));
        }

        let generation = self.ticker.generation();
        let (was_playing, target, duration, restart) = {
            let mut core = self.core.lock().unwrap();
            let duration = core.duration();
            let target = if core.tracks.is_empty() {
                time.max(0.0)
            } else {
                time.clamp(0.0, duration)
            };
            let was_playing = core.pause_playback();
            core.transport.set_offset(target);
            let restart = if was_playing {
                core.start_playback()
            } else {
                Ok(())
            };
            (was_playing, target, duration, restart)
        };
        debug!("seek to {:.3}s", target);

        if !was_playing {
            self.callbacks.progress_update(target, duration);
            return Ok(());
        }

        if let Err(err) = restart {
            self.callbacks.state_change(StateChange {
                is_playing: Some(false),
                error: Some(err.to_string()),
                ..Default::default()
            });
            self.ticker.stop_if(generation);
            return Err(err);
        }
        Ok(())
    }

    /// Run one progress-loop iteration.
    ///
    /// Emits the current position and per-track levels, and stops the
    /// transport once the end of the song is reached. Returns whether the
    /// player is still playing afterwards.
    pub fn tick(&self) -> bool {
        let generation = self.ticker.generation();
        let (time, duration, levels, ended) = {
            let mut core = self.core.lock().unwrap();
            if !core.transport.is_playing() {
                return false;
            }
            let duration = core.duration();
            let time = core.current_time();
            let levels = core.sample_levels();
            let ended = time >= duration;
            if ended {
                core.stop_playback();
            }
            (time.min(duration), duration, levels, ended)
        };

        self.callbacks.progress_update(time, duration);
        self.callbacks.meter_update(levels);

        if ended {
            info!("end of song reached");
            self.callbacks.state_change(StateChange {
                is_playing: Some(false),
                current_time: Some(0.0),
                ..Default::default()
            });
            // A handler may have restarted playback and with it a new loop.
            self.ticker.stop_if(generation);
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use crate::playback::backend::ManualBackend;
    use crate::playback::graph::SourceId;
    use crate::track::fetch::{FetchProgress, Fetcher};
    use crate::track::TrackRequest;

    use super::Player;

    struct ToneFetcher;

    impl Fetcher for ToneFetcher {
        fn fetch(&self, _locator: &str, _progress: FetchProgress<'_>) -> Result<Vec<u8>, String> {
            let spec = hound::WavSpec {
                channels: 1,
                sample_rate: 8_000,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            };
            let mut bytes = Vec::new();
            {
                let mut writer =
                    hound::WavWriter::new(Cursor::new(&mut bytes), spec).map_err(|e| e.to_string())?;
                for n in 0..16_000 {
                    let sample = ((n % 40) as i16 - 20) * 500;
                    writer.write_sample(sample).map_err(|e| e.to_string())?;
                }
                writer.finalize().map_err(|e| e.to_string())?;
            }
            Ok(bytes)
        }
    }

    fn live_ids(player: &Player) -> Vec<Option<SourceId>> {
        player
            .core
            .lock()
            .unwrap()
            .tracks
            .iter()
            .map(|track| track.live_source)
            .collect()
    }

    #[test]
    fn every_play_schedules_new_source_ids() {
        let backend = ManualBackend::new(8_000);
        let player = Player::new(backend.factory());
        player.set_fetcher(Arc::new(ToneFetcher));
        player
            .load(&[TrackRequest::new("A", "a.wav"), TrackRequest::new("B", "b.wav")])
            .expect("load");
        assert_eq!(live_ids(&player), vec![None, None]);

        player.play().expect("play");
        let first = live_ids(&player);
        assert!(first.iter().all(Option::is_some));
        assert_ne!(first[0], first[1]);

        backend.advance(0.5);
        player.pause();
        assert_eq!(live_ids(&player), vec![None, None]);

        player.play().expect("play again");
        let second = live_ids(&player);
        assert!(second.iter().all(Option::is_some));
        assert!(second.iter().all(|id| !first.contains(id)));
        player.stop();
    }
}
