//! Sample-rate conversion of decoded stems to the bus rate.

use log::debug;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

/// Resample interleaved audio from `input_rate` to `output_rate`.
///
/// The whole stem is processed as one chunk; stems are decoded up front so
/// there is no streaming constraint here.
pub(super) fn resample_interleaved(
    input: Vec<f32>,
    channels: usize,
    input_rate: u32,
    output_rate: u32,
) -> Result<Vec<f32>, String> {
    let channels = channels.max(1);
    let frames = input.len() / channels;
    if input_rate == output_rate || frames == 0 {
        return Ok(input);
    }

    debug!(
        "resampling {} frames from {}Hz to {}Hz",
        frames, input_rate, output_rate
    );

    let planar = deinterleave(&input, channels);
    let mut resampler = FastFixedIn::<f32>::new(
        output_rate as f64 / input_rate as f64,
        1.0,
        PolynomialDegree::Septic,
        frames,
        channels,
    )
    .map_err(|err| format!("failed to create resampler: {}", err))?;

    let planar_out = resampler
        .process(&planar, None)
        .map_err(|err| format!("resampling failed: {}", err))?;

    Ok(interleave(&planar_out))
}

fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (channel, &sample) in frame.iter().enumerate() {
            planar[channel].push(sample);
        }
    }
    planar
}

fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = planar.first() else {
        return Vec::new();
    };
    let frames = first.len();
    let mut out = Vec::with_capacity(frames * planar.len());
    for frame in 0..frames {
        for channel in planar {
            out.push(channel.get(frame).copied().unwrap_or(0.0));
        }
    }
    out
}
