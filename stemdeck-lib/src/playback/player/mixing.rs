//! Per-track volume, mute and solo.

use log::debug;

use crate::error::PlayerError;
use crate::events::{SoloState, TrackLevel, TrackSnapshot};
use crate::playback::mix::{effective_gains, MAX_VOLUME};

use super::{Core, Player};

impl Core {
    fn snapshots(&self) -> Vec<TrackSnapshot> {
        let gains = effective_gains(self.tracks.iter().map(|track| &track.mix));
        self.tracks
            .iter()
            .zip(gains)
            .map(|(track, gain)| track.snapshot(gain))
            .collect()
    }
}

impl Player {
    /// Set a track's volume slider, clamped to `[0, 1.5]`.
    ///
    /// # Errors
    ///
    /// [`PlayerError::NotFound`] for an unknown track and
    /// [`PlayerError::InvalidRequest`] for a NaN or infinite value.
    pub fn set_volume(&self, name: &str, volume: f32) -> Result<(), PlayerError> {
        if !volume.is_finite() {
            return Err(PlayerError::InvalidRequest(format!(
                "volume {} is not finite",
                volume
            )));
        }
        let mut core = self.core.lock().unwrap();
        let index = core.find_track(name)?;
        let volume = volume.clamp(0.0, MAX_VOLUME);
        core.tracks[index].mix.volume = volume;
        core.apply_gains();
        debug!("{} volume {:.2} (gain {:.3})", name, volume, core.gain_of(index));
        Ok(())
    }

    /// Flip a track's mute flag and return the new value.
    pub fn toggle_mute(&self, name: &str) -> Result<bool, PlayerError> {
        let mut core = self.core.lock().unwrap();
        let index = core.find_track(name)?;
        let mix = &mut core.tracks[index].mix;
        mix.is_muted = !mix.is_muted;
        let muted = mix.is_muted;
        core.apply_gains();
        debug!("{} muted: {}", name, muted);
        Ok(muted)
    }

    /// Flip a track's solo flag and return every track's solo state.
    pub fn toggle_solo(&self, name: &str) -> Result<Vec<SoloState>, PlayerError> {
        let mut core = self.core.lock().unwrap();
        let index = core.find_track(name)?;
        let mix = &mut core.tracks[index].mix;
        mix.is_soloed = !mix.is_soloed;
        core.apply_gains();
        Ok(core
            .tracks
            .iter()
            .map(|track| SoloState {
                name: track.name.clone(),
                is_soloed: track.mix.is_soloed,
            })
            .collect())
    }

    /// Restore every track to unity volume, unmuted and unsoloed.
    pub fn reset_mix(&self) -> Vec<TrackSnapshot> {
        let mut core = self.core.lock().unwrap();
        for track in &mut core.tracks {
            track.mix = Default::default();
        }
        core.apply_gains();
        core.snapshots()
    }

    /// Mix state of every loaded track, in load order.
    pub fn tracks(&self) -> Vec<TrackSnapshot> {
        self.core.lock().unwrap().snapshots()
    }

    /// Effective linear gain of a track, or `None` if it is not loaded.
    pub fn effective_gain(&self, name: &str) -> Option<f32> {
        let core = self.core.lock().unwrap();
        let index = core.find_track(name).ok()?;
        Some(core.gain_of(index))
    }

    /// Pull a meter reading for every track.
    pub fn track_levels(&self) -> Vec<TrackLevel> {
        self.core.lock().unwrap().sample_levels()
    }
}
