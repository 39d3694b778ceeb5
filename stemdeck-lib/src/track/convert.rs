//! Sample format conversion for decoded packets.

use symphonia::core::audio::{AudioBufferRef, Signal};

fn unsigned_8bit_to_f32(sample: u8) -> f32 {
    (sample as f32 - 128.0) / 128.0
}

fn signed_8bit_to_f32(sample: i8) -> f32 {
    sample as f32 / 128.0
}

fn unsigned_16bit_to_f32(sample: u16) -> f32 {
    (sample as i32 - 32_768) as f32 / 32_768.0
}

fn signed_16bit_to_f32(sample: i16) -> f32 {
    sample as f32 / 32_768.0
}

/// 24-bit samples live in the low bits of a 32-bit word.
fn unsigned_24bit_to_f32(sample: u32) -> f32 {
    (sample as i64 - 8_388_608) as f32 / 8_388_608.0
}

fn signed_24bit_to_f32(sample: i32) -> f32 {
    let sign_extended = sample << 8 >> 8;
    sign_extended as f32 / 8_388_608.0
}

fn unsigned_32bit_to_f32(sample: u32) -> f32 {
    (sample as i64 - 2_147_483_648) as f32 / 2_147_483_648.0
}

fn signed_32bit_to_f32(sample: i32) -> f32 {
    sample as f32 / 2_147_483_648.0
}

/// Append one channel of a decoded packet to `out` as `f32`.
pub(super) fn extend_channel(decoded: &AudioBufferRef<'_>, channel: usize, out: &mut Vec<f32>) {
    match decoded {
        AudioBufferRef::U8(buf) => {
            out.extend(buf.chan(channel).iter().map(|&s| unsigned_8bit_to_f32(s)))
        }
        AudioBufferRef::S8(buf) => {
            out.extend(buf.chan(channel).iter().map(|&s| signed_8bit_to_f32(s)))
        }
        AudioBufferRef::U16(buf) => {
            out.extend(buf.chan(channel).iter().map(|&s| unsigned_16bit_to_f32(s)))
        }
        AudioBufferRef::S16(buf) => {
            out.extend(buf.chan(channel).iter().map(|&s| signed_16bit_to_f32(s)))
        }
        AudioBufferRef::U24(buf) => {
            out.extend(buf.chan(channel).iter().map(|s| unsigned_24bit_to_f32(s.0)))
        }
        AudioBufferRef::S24(buf) => {
            out.extend(buf.chan(channel).iter().map(|s| signed_24bit_to_f32(s.0)))
        }
        AudioBufferRef::U32(buf) => {
            out.extend(buf.chan(channel).iter().map(|&s| unsigned_32bit_to_f32(s)))
        }
        AudioBufferRef::S32(buf) => {
            out.extend(buf.chan(channel).iter().map(|&s| signed_32bit_to_f32(s)))
        }
        AudioBufferRef::F32(buf) => out.extend_from_slice(buf.chan(channel)),
        AudioBufferRef::F64(buf) => out.extend(buf.chan(channel).iter().map(|&s| s as f32)),
    }
}
