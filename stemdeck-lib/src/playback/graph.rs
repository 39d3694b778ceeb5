//! Audio processing graph: per-track chains, one-shot live sources, and the
//! mix bus that renders them.
//!
//! Each track owns a persistent [`TrackChain`] (analysis tap followed by a
//! smoothed gain). A [`LiveSource`] is a single-use cursor into a decoded
//! buffer; once stopped it is dropped and a new one is built on the next
//! play. The [`MixBus`] renders every chain into an interleaved block and
//! counts rendered frames, which is the hardware clock the transport reads.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dasp_ring_buffer::Fixed;

use crate::audio::DecodedBuffer;

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identity of a live source. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

/// Smoothed gain parameter shared between the control side and the renderer.
#[derive(Debug)]
pub struct GainParam {
    target: AtomicU32,
    time_constant: AtomicU32,
}

impl GainParam {
    pub fn new(initial: f32) -> Self {
        Self {
            target: AtomicU32::new(initial.to_bits()),
            time_constant: AtomicU32::new(0.0_f32.to_bits()),
        }
    }

    /// Move towards `target` exponentially with the given time constant
    /// (seconds). A time constant of zero jumps immediately.
    pub fn set_target(&self, target: f32, time_constant: f32) {
        self.time_constant
            .store(time_constant.max(0.0).to_bits(), Ordering::Relaxed);
        self.target.store(target.to_bits(), Ordering::Relaxed);
    }

    pub fn target(&self) -> f32 {
        f32::from_bits(self.target.load(Ordering::Relaxed))
    }

    pub fn time_constant(&self) -> f32 {
        f32::from_bits(self.time_constant.load(Ordering::Relaxed))
    }
}

/// Non-destructive tap keeping the most recent mono samples of a track.
pub struct AnalysisTap {
    ring: Mutex<Fixed<Vec<f32>>>,
}

impl AnalysisTap {
    pub fn new(size: usize) -> Self {
        Self {
            ring: Mutex::new(Fixed::from(vec![0.0; size.max(1)])),
        }
    }

    pub fn write(&self, samples: &[f32]) {
        let mut ring = self.ring.lock().unwrap();
        for &sample in samples {
            ring.push(sample);
        }
    }

    /// Oldest-to-newest copy of the tap window.
    pub fn snapshot(&self) -> Vec<f32> {
        self.ring.lock().unwrap().iter().copied().collect()
    }
}

/// Persistent processing chain of one track: tap, then gain.
pub struct TrackChain {
    pub gain: GainParam,
    pub tap: AnalysisTap,
}

impl TrackChain {
    pub fn new(tap_size: usize) -> Self {
        Self {
            gain: GainParam::new(1.0),
            tap: AnalysisTap::new(tap_size),
        }
    }
}

/// One-shot playable source bound to a track's decoded buffer.
#[derive(Debug)]
pub struct LiveSource {
    id: SourceId,
    track: usize,
    buffer: Arc<DecodedBuffer>,
    position: usize,
}

impl LiveSource {
    /// Build a fresh source starting `offset` seconds into `buffer`.
    pub fn new(track: usize, buffer: Arc<DecodedBuffer>, offset: f64) -> Self {
        let position = (offset.max(0.0) * buffer.sample_rate() as f64).round() as usize;
        Self {
            id: SourceId(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed)),
            track,
            buffer,
            position,
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn track(&self) -> usize {
        self.track
    }

    /// Next frame this source will render.
    pub fn position(&self) -> usize {
        self.position
    }

    fn finished(&self) -> bool {
        self.position >= self.buffer.frames()
    }
}

struct ChainState {
    chain: Arc<TrackChain>,
    gain: f32,
}

/// Renders connected chains and their live sources into interleaved output.
pub struct MixBus {
    sample_rate: u32,
    channels: u16,
    chains: Vec<ChainState>,
    sources: Vec<LiveSource>,
    tap_scratch: Vec<f32>,
    frames_rendered: Arc<AtomicU64>,
}

impl MixBus {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
            chains: Vec::new(),
            sources: Vec::new(),
            tap_scratch: Vec::new(),
            frames_rendered: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Shared frame counter, readable without locking the bus.
    pub fn frame_counter(&self) -> Arc<AtomicU64> {
        self.frames_rendered.clone()
    }

    /// Seconds of audio rendered so far.
    pub fn clock(&self) -> f64 {
        self.frames_rendered.load(Ordering::Relaxed) as f64 / self.sample_rate as f64
    }

    /// Replace the connected chains. Chain `i` receives sources for track `i`.
    pub fn connect(&mut self, chains: Vec<Arc<TrackChain>>) {
        self.sources.clear();
        self.chains = chains
            .into_iter()
            .map(|chain| {
                let gain = chain.gain.target();
                ChainState { chain, gain }
            })
            .collect();
    }

    pub fn disconnect_all(&mut self) {
        self.sources.clear();
        self.chains.clear();
    }

    /// Start a batch of sources. Every source renders its first frame in the
    /// same output frame.
    pub fn start(&mut self, sources: Vec<LiveSource>) {
        self.sources.extend(sources);
    }

    /// Stop and drop every live source.
    pub fn stop_all(&mut self) -> usize {
        let stopped = self.sources.len();
        self.sources.clear();
        stopped
    }

    /// `(track, position)` of every live source.
    pub fn active_sources(&self) -> Vec<(usize, usize)> {
        self.sources
            .iter()
            .map(|source| (source.track, source.position))
            .collect()
    }

    /// Current (smoothed) gain of each connected chain.
    pub fn current_gains(&self) -> Vec<f32> {
        self.chains.iter().map(|state| state.gain).collect()
    }

    /// Render `out.len() / channels` frames into `out`, overwriting it.
    pub fn render(&mut self, out: &mut [f32]) {
        let channels = self.channels as usize;
        let frames = out.len() / channels;
        out.fill(0.0);

        for (chain_index, state) in self.chains.iter_mut().enumerate() {
            let target = state.chain.gain.target();
            let coeff = smoothing_coefficient(state.chain.gain.time_constant(), self.sample_rate);
            self.tap_scratch.clear();

            for frame in 0..frames {
                state.gain += (target - state.gain) * coeff;
                let mut mono = 0.0;
                for source in self.sources.iter().filter(|s| s.track == chain_index) {
                    let Some(samples) = source.buffer.frame(source.position + frame) else {
                        continue;
                    };
                    let last = samples.len() - 1;
                    for channel in 0..channels {
                        out[frame * channels + channel] += samples[channel.min(last)] * state.gain;
                    }
                    mono += samples.iter().sum::<f32>() / samples.len() as f32;
                }
                self.tap_scratch.push(mono);
            }

            state.chain.tap.write(&self.tap_scratch);
        }

        for source in &mut self.sources {
            source.position += frames;
        }
        self.sources.retain(|source| !source.finished());
        self.frames_rendered
            .fetch_add(frames as u64, Ordering::Relaxed);
    }
}

/// Per-frame coefficient of a one-pole approach with time constant `tau`.
fn smoothing_coefficient(tau: f32, sample_rate: u32) -> f32 {
    if tau <= 0.0 {
        return 1.0;
    }
    1.0 - (-1.0 / (tau * sample_rate as f32)).exp()
}
