//! Audio output backends.
//!
//! The player never talks to an audio device directly. It asks a
//! [`BackendFactory`] for an [`AudioBackend`] the first time one is needed
//! and again whenever the current one has been closed.

mod manual;
mod output;

use std::sync::Arc;

pub use manual::ManualBackend;
pub use output::RodioBackend;

use crate::error::PlayerError;
use crate::playback::graph::{LiveSource, TrackChain};

/// Lifecycle state of an output context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    Suspended,
    Running,
    /// Suspended by the platform (e.g. another app took the device).
    Interrupted,
    Closed,
}

/// An output context rendering the mix bus.
pub trait AudioBackend: Send {
    fn state(&self) -> BackendState;

    /// Resume rendering. Blocks until the device is running or has failed.
    fn resume(&mut self) -> Result<(), PlayerError>;

    /// Release the device. A closed backend cannot be resumed.
    fn close(&mut self);

    fn sample_rate(&self) -> u32;

    fn channels(&self) -> u16;

    /// Hardware clock: seconds rendered since the backend was created.
    fn current_time(&self) -> f64;

    /// Attach one chain per track, replacing any previous set.
    fn connect(&mut self, chains: Vec<Arc<TrackChain>>);

    fn disconnect_all(&mut self);

    /// Start a batch of sources on the same rendered frame.
    fn start_sources(&mut self, sources: Vec<LiveSource>);

    /// Stop and discard every live source.
    fn stop_sources(&mut self);

    /// `(track, frame)` of every live source.
    fn active_sources(&self) -> Vec<(usize, usize)>;

    /// Play a one-frame silent buffer, satisfying platforms that only
    /// release the device after audio is started from a user gesture.
    fn prime(&mut self) -> Result<(), PlayerError> {
        Ok(())
    }

    /// Whether resume is refused until a user gesture has primed the device.
    fn requires_user_gesture(&self) -> bool {
        false
    }
}

/// Creates backends on demand.
pub trait BackendFactory: Send {
    fn create(&self) -> Result<Box<dyn AudioBackend>, PlayerError>;
}

impl<F> BackendFactory for F
where
    F: Fn() -> Result<Box<dyn AudioBackend>, PlayerError> + Send,
{
    fn create(&self) -> Result<Box<dyn AudioBackend>, PlayerError> {
        self()
    }
}
