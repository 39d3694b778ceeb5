//! Shared audio data types.

pub mod buffer;

pub use buffer::DecodedBuffer;

/// Channel count of the mix bus.
pub const BUS_CHANNELS: u16 = 2;

/// Sample rate of the mix bus. Decoded stems are resampled to this rate.
pub const BUS_SAMPLE_RATE: u32 = 44_100;
