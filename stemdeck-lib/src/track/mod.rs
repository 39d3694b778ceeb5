//! Track requests, engine-owned tracks, and the load pipeline.

mod convert;
pub mod decode;
pub mod fetch;
pub(crate) mod loader;
mod resample;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::audio::DecodedBuffer;
use crate::events::TrackSnapshot;
use crate::playback::graph::{SourceId, TrackChain};
use crate::playback::meter::Analyser;
use crate::playback::mix::TrackMix;

/// Caller-supplied description of one stem to load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRequest {
    /// Unique name within one load.
    pub name: String,
    /// Byte-source locator: a path relative to the fetcher's base directory,
    /// or an `http(s)://` URL when the `http` feature is enabled.
    pub source_locator: String,
}

impl TrackRequest {
    pub fn new(name: impl Into<String>, source_locator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_locator: source_locator.into(),
        }
    }
}

/// A loaded stem owned by the player.
pub(crate) struct Track {
    pub(crate) name: String,
    pub(crate) buffer: Arc<DecodedBuffer>,
    /// Id of the one-shot source currently scheduled for this track.
    pub(crate) live_source: Option<SourceId>,
    pub(crate) chain: Arc<TrackChain>,
    pub(crate) mix: TrackMix,
    pub(crate) analyser: Analyser,
}

impl Track {
    pub(crate) fn new(name: String, buffer: DecodedBuffer, analyser: Analyser) -> Self {
        let chain = Arc::new(TrackChain::new(analyser.fft_size()));
        Self {
            name,
            buffer: Arc::new(buffer),
            live_source: None,
            chain,
            mix: TrackMix::default(),
            analyser,
        }
    }

    pub(crate) fn snapshot(&self, gain: f32) -> TrackSnapshot {
        TrackSnapshot {
            name: self.name.clone(),
            volume: self.mix.volume,
            is_muted: self.mix.is_muted,
            is_soloed: self.mix.is_soloed,
            gain,
        }
    }
}
