//! Playback engine: processing graph, transport, mix policy, metering and
//! output backends.

pub mod backend;
pub mod graph;
pub mod meter;
pub mod mix;
pub mod player;
mod ticker;
mod transport;
