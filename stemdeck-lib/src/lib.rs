//! # Stemdeck Library
//!
//! Core of the stemdeck multitrack player: concurrent loading and decoding of
//! song stems, a sample-accurate mix bus driven by the audio device clock,
//! per-stem volume/mute/solo policy, and per-stem level metering.
//!
//! The entry point is [`playback::player::Player`].

pub mod audio;
pub mod error;
pub mod events;
pub mod manifest;
pub mod playback;
pub mod track;

pub use error::PlayerError;
pub use events::{LoadPhase, LoadProgress, SoloState, StateChange, TrackLevel, TrackSnapshot};
pub use manifest::{Manifest, Song, TrackDescriptor};
pub use playback::backend::{AudioBackend, BackendFactory, BackendState, ManualBackend, RodioBackend};
pub use playback::player::{Player, PlayerSettings};
pub use track::TrackRequest;
