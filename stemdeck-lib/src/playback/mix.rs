//! Volume curve and mute/solo gain policy.

/// Highest slider value accepted by `set_volume`.
pub const MAX_VOLUME: f32 = 1.5;

const FLOOR_DB: f32 = -60.0;
const CEILING_DB: f32 = 6.0;

/// Per-track mix controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackMix {
    pub volume: f32,
    pub is_muted: bool,
    pub is_soloed: bool,
}

impl Default for TrackMix {
    fn default() -> Self {
        Self {
            volume: 1.0,
            is_muted: false,
            is_soloed: false,
        }
    }
}

pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

pub fn linear_to_db(gain: f32) -> f32 {
    if gain <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * gain.log10()
    }
}

/// Map a slider value in `[0, 1.5]` to linear gain.
///
/// `[0, 1]` spans -60dB..0dB and `(1, 1.5]` spans 0dB..+6dB, so the curve
/// is strictly increasing and passes through unity at 1.0. Only mute and
/// solo produce true silence.
pub fn volume_to_gain(volume: f32) -> f32 {
    let volume = volume.clamp(0.0, MAX_VOLUME);
    if volume == 1.0 {
        return 1.0;
    }
    let db = if volume < 1.0 {
        FLOOR_DB * (1.0 - volume)
    } else {
        CEILING_DB * (volume - 1.0) / (MAX_VOLUME - 1.0)
    };
    db_to_linear(db)
}

/// Effective gain of `mix` given whether any track in the set is soloed.
pub fn effective_gain(mix: &TrackMix, any_soloed: bool) -> f32 {
    if mix.is_muted || (any_soloed && !mix.is_soloed) {
        return 0.0;
    }
    volume_to_gain(mix.volume)
}

/// Effective gain of every track, in order.
pub fn effective_gains<'a>(mixes: impl IntoIterator<Item = &'a TrackMix> + Clone) -> Vec<f32> {
    let any_soloed = mixes.clone().into_iter().any(|mix| mix.is_soloed);
    mixes
        .into_iter()
        .map(|mix| effective_gain(mix, any_soloed))
        .collect()
}
