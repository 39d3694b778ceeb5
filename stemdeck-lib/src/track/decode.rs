//! Symphonia decoding of fetched bytes into bus-format PCM.

use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio::DecodedBuffer;

use super::convert::extend_channel;
use super::resample::resample_interleaved;

/// Channel layout and rate every decoded stem is converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusFormat {
    pub channels: u16,
    pub sample_rate: u32,
}

/// Decode a complete audio file held in memory.
///
/// Mono input is duplicated across the bus channels; inputs with more
/// channels than the bus keep their leading channels. The returned duration
/// is measured on the source before resampling.
///
/// # Arguments
///
/// * `bytes` - Raw container bytes (mp3/wav/ogg/flac/m4a).
/// * `locator` - Source locator, used only for the probe extension hint.
/// * `format` - Target bus format.
/// * `abort` - Checked between packets; decoding stops early when set.
///
/// # Errors
///
/// Returns a reason when the container or codec is unsupported, the stream
/// is malformed, no frames were decoded, or `abort` was raised.
pub fn decode_bytes(
    bytes: Vec<u8>,
    locator: &str,
    format: BusFormat,
    abort: Option<&AtomicBool>,
) -> Result<DecodedBuffer, String> {
    let mut reader = get_reader(bytes, locator)?;
    let mut decoder = get_decoder(reader.as_ref())?;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| "no supported audio tracks".to_string())?;
    let track_id = track.id;
    let mut source_rate = track.codec_params.sample_rate.unwrap_or(0);

    let mut planar: Vec<Vec<f32>> = Vec::new();

    loop {
        if abort.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Err("decode aborted".to_string());
        }

        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(Error::ResetRequired) => break,
            Err(err) => return Err(err.to_string()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                if source_rate == 0 {
                    source_rate = spec.rate;
                }
                let channels = spec.channels.count().max(1);
                if planar.is_empty() {
                    planar = vec![Vec::new(); channels];
                }
                for (channel, samples) in planar.iter_mut().enumerate().take(channels) {
                    extend_channel(&decoded, channel, samples);
                }
            }
            Err(Error::DecodeError(err)) => {
                warn!("decode error: {}", err);
            }
            Err(err) => return Err(err.to_string()),
        }
    }

    let frames = planar.first().map(Vec::len).unwrap_or(0);
    if frames == 0 || source_rate == 0 {
        return Err("no audio frames decoded".to_string());
    }
    let duration = frames as f64 / source_rate as f64;
    debug!(
        "decoded {} frames ({} channels @ {}Hz, {:.3}s)",
        frames,
        planar.len(),
        source_rate,
        duration
    );

    let interleaved = to_bus_channels(&planar, format.channels as usize);
    let samples = resample_interleaved(
        interleaved,
        format.channels as usize,
        source_rate,
        format.sample_rate,
    )?;

    Ok(DecodedBuffer::new(
        samples,
        format.channels,
        format.sample_rate,
        duration,
    ))
}

/// Build a `FormatReader` over in-memory bytes.
fn get_reader(bytes: Vec<u8>, locator: &str) -> Result<Box<dyn FormatReader>, String> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = extension_hint(locator) {
        hint.with_extension(&extension);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(|err| format!("unsupported format: {}", err))?;

    Ok(probed.format)
}

/// Build a decoder for the first decodable track of `format`.
fn get_decoder(format: &dyn FormatReader) -> Result<Box<dyn Decoder>, String> {
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| "no supported audio tracks".to_string())?;

    let dec_opts: DecoderOptions = Default::default();
    symphonia::default::get_codecs()
        .make(&track.codec_params, &dec_opts)
        .map_err(|err| format!("unsupported codec: {}", err))
}

/// Extension of the locator's path component, ignoring query and fragment.
fn extension_hint(locator: &str) -> Option<String> {
    let path = locator.split(['?', '#']).next().unwrap_or(locator);
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

fn to_bus_channels(planar: &[Vec<f32>], bus_channels: usize) -> Vec<f32> {
    let frames = planar.first().map(Vec::len).unwrap_or(0);
    let bus_channels = bus_channels.max(1);
    let mut out = Vec::with_capacity(frames * bus_channels);
    for frame in 0..frames {
        for channel in 0..bus_channels {
            let source = &planar[channel.min(planar.len() - 1)];
            out.push(source.get(frame).copied().unwrap_or(0.0));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUS: BusFormat = BusFormat {
        channels: 2,
        sample_rate: 8_000,
    };

    fn wav_bytes(channels: u16, sample_rate: u32, frames: usize, value: i16) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut bytes = Vec::new();
        {
            let mut writer =
                hound::WavWriter::new(Cursor::new(&mut bytes), spec).expect("wav writer");
            for _ in 0..frames * channels as usize {
                writer.write_sample(value).expect("write sample");
            }
            writer.finalize().expect("finalize wav");
        }
        bytes
    }

    #[test]
    fn mono_wav_is_duplicated_to_stereo() {
        let bytes = wav_bytes(1, 8_000, 8_000, 16_384);
        let buffer = decode_bytes(bytes, "stems/bass.wav", BUS, None).expect("decode");

        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.frames(), 8_000);
        assert!((buffer.duration() - 1.0).abs() < 1e-9);
        let frame = buffer.frame(100).expect("frame");
        assert!((frame[0] - 0.5).abs() < 1e-4);
        assert_eq!(frame[0], frame[1]);
    }

    #[test]
    fn duration_is_measured_before_resampling() {
        let bytes = wav_bytes(2, 16_000, 8_000, 0);
        let buffer = decode_bytes(bytes, "vocals.wav?v=2", BUS, None).expect("decode");
        assert!((buffer.duration() - 0.5).abs() < 1e-9);
        assert_eq!(buffer.sample_rate(), 8_000);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = decode_bytes(vec![0x42; 512], "broken.wav", BUS, None).expect_err("garbage");
        assert!(!err.is_empty());
    }

    #[test]
    fn raised_abort_stops_decoding() {
        let bytes = wav_bytes(1, 8_000, 800, 0);
        let abort = AtomicBool::new(true);
        let err = decode_bytes(bytes, "a.wav", BUS, Some(&abort)).expect_err("aborted");
        assert_eq!(err, "decode aborted");
    }

    #[test]
    fn extension_hint_ignores_query_strings() {
        assert_eq!(extension_hint("a/b/Song.MP3?x=1"), Some("mp3".to_string()));
        assert_eq!(extension_hint("noext"), None);
    }
}
