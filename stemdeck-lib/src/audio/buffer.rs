//! Decoded, immutable PCM buffers.

use std::sync::Arc;

/// Interleaved PCM at the mix bus format.
///
/// Samples are never mutated after decode; tracks and live sources share the
/// buffer through an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBuffer {
    samples: Arc<[f32]>,
    channels: u16,
    sample_rate: u32,
    duration: f64,
}

impl DecodedBuffer {
    /// Wrap interleaved samples.
    ///
    /// # Arguments
    ///
    /// * `samples` - Interleaved samples at `sample_rate`.
    /// * `channels` - Channel count of the interleaving.
    /// * `sample_rate` - Rate of `samples`.
    /// * `duration` - Source duration in seconds, measured before any
    ///   resampling.
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32, duration: f64) -> Self {
        Self {
            samples: samples.into(),
            channels: channels.max(1),
            sample_rate,
            duration,
        }
    }

    /// Build a buffer whose duration is derived from its own frame count.
    pub fn from_interleaved(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let frames = samples.len() / channels as usize;
        let duration = if sample_rate > 0 {
            frames as f64 / sample_rate as f64
        } else {
            0.0
        };
        Self::new(samples, channels, sample_rate, duration)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Number of interleaved frames.
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Interleaved samples of a single frame, or `None` past the end.
    pub fn frame(&self, index: usize) -> Option<&[f32]> {
        let channels = self.channels as usize;
        let start = index.checked_mul(channels)?;
        self.samples.get(start..start + channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_follows_frame_count() {
        let buffer = DecodedBuffer::from_interleaved(vec![0.0; 44_100 * 2], 2, 44_100);
        assert_eq!(buffer.frames(), 44_100);
        assert!((buffer.duration() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn frame_access_stops_at_the_end() {
        let buffer = DecodedBuffer::from_interleaved(vec![0.1, 0.2, 0.3, 0.4], 2, 8_000);
        assert_eq!(buffer.frame(1), Some(&[0.3, 0.4][..]));
        assert_eq!(buffer.frame(2), None);
    }
}
