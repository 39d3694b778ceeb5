//! Manually clocked backend for tests and offline rendering.

use std::sync::{Arc, Mutex};

use log::debug;

use crate::error::PlayerError;
use crate::playback::graph::{LiveSource, MixBus, TrackChain};

use super::{AudioBackend, BackendFactory, BackendState};

const RENDER_BLOCK_FRAMES: usize = 256;

struct ManualState {
    bus: MixBus,
    state: BackendState,
    requires_gesture: bool,
    gesture_given: bool,
    fail_resume: bool,
    scratch: Vec<f32>,
    last_block: Vec<f32>,
}

/// Backend whose clock only moves when [`ManualBackend::advance`] is called.
///
/// Clones share state, so a test can keep one handle while the player owns
/// another.
#[derive(Clone)]
pub struct ManualBackend {
    inner: Arc<Mutex<ManualState>>,
}

impl ManualBackend {
    /// Stereo backend at `sample_rate`, starting suspended.
    pub fn new(sample_rate: u32) -> Self {
        Self::with_options(sample_rate, false)
    }

    /// Backend that refuses to start until [`ManualBackend::user_gesture`]
    /// has been called, like a mobile browser's autoplay policy.
    pub fn locked(sample_rate: u32) -> Self {
        Self::with_options(sample_rate, true)
    }

    fn with_options(sample_rate: u32, requires_gesture: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualState {
                bus: MixBus::new(sample_rate, 2),
                state: BackendState::Suspended,
                requires_gesture,
                gesture_given: false,
                fail_resume: false,
                scratch: Vec::new(),
                last_block: Vec::new(),
            })),
        }
    }

    /// Factory handing out this backend. A closed backend is reopened with
    /// a fresh clock.
    pub fn factory(&self) -> impl BackendFactory + 'static {
        let backend = self.clone();
        move || -> Result<Box<dyn AudioBackend>, PlayerError> {
            {
                let mut inner = backend.inner.lock().unwrap();
                if inner.state == BackendState::Closed {
                    let (rate, channels) = (inner.bus.sample_rate(), inner.bus.channels());
                    inner.bus = MixBus::new(rate, channels);
                    inner.state = BackendState::Suspended;
                    debug!("manual backend reopened");
                }
            }
            Ok(Box::new(backend.clone()))
        }
    }

    /// Render `seconds` of audio if running. Returns the frames rendered.
    pub fn advance(&self, seconds: f64) -> usize {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != BackendState::Running {
            return 0;
        }
        let channels = inner.bus.channels() as usize;
        let total = (seconds.max(0.0) * inner.bus.sample_rate() as f64).round() as usize;
        let mut remaining = total;
        let ManualState { bus, scratch, last_block, .. } = &mut *inner;
        while remaining > 0 {
            let frames = remaining.min(RENDER_BLOCK_FRAMES);
            scratch.resize(frames * channels, 0.0);
            bus.render(scratch);
            remaining -= frames;
        }
        last_block.clone_from(scratch);
        total
    }

    /// Simulate a user gesture reaching the device.
    pub fn user_gesture(&self) {
        self.inner.lock().unwrap().gesture_given = true;
    }

    /// Simulate the platform suspending the device underneath the player.
    pub fn interrupt(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == BackendState::Running {
            inner.state = BackendState::Interrupted;
            if inner.requires_gesture {
                inner.gesture_given = false;
            }
        }
    }

    /// Simulate the platform pausing the device while keeping any gesture.
    pub fn suspend(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == BackendState::Running {
            inner.state = BackendState::Suspended;
        }
    }

    /// Make subsequent resumes fail.
    pub fn set_fail_resume(&self, fail: bool) {
        self.inner.lock().unwrap().fail_resume = fail;
    }

    pub fn backend_state(&self) -> BackendState {
        self.inner.lock().unwrap().state
    }

    pub fn clock(&self) -> f64 {
        self.inner.lock().unwrap().bus.clock()
    }

    /// Frame position of every live source.
    pub fn source_positions(&self) -> Vec<usize> {
        self.inner
            .lock()
            .unwrap()
            .bus
            .active_sources()
            .into_iter()
            .map(|(_, position)| position)
            .collect()
    }

    /// Smoothed gain of every connected chain.
    pub fn chain_gains(&self) -> Vec<f32> {
        self.inner.lock().unwrap().bus.current_gains()
    }

    /// Interleaved output of the last rendered block.
    pub fn last_block(&self) -> Vec<f32> {
        self.inner.lock().unwrap().last_block.clone()
    }
}

impl AudioBackend for ManualBackend {
    fn state(&self) -> BackendState {
        self.inner.lock().unwrap().state
    }

    fn resume(&mut self) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            BackendState::Closed => Err(PlayerError::BackendUnavailable(
                "backend is closed".to_string(),
            )),
            BackendState::Running => Ok(()),
            _ if inner.fail_resume => Err(PlayerError::BackendUnavailable(
                "device refused to resume".to_string(),
            )),
            _ if inner.requires_gesture && !inner.gesture_given => Err(
                PlayerError::BackendUnavailable("resume requires a user gesture".to_string()),
            ),
            _ => {
                inner.state = BackendState::Running;
                Ok(())
            }
        }
    }

    fn close(&mut self) {
        let mut inner = self.inner.lock().unwrap();
        inner.bus.disconnect_all();
        inner.state = BackendState::Closed;
    }

    fn sample_rate(&self) -> u32 {
        self.inner.lock().unwrap().bus.sample_rate()
    }

    fn channels(&self) -> u16 {
        self.inner.lock().unwrap().bus.channels()
    }

    fn current_time(&self) -> f64 {
        self.clock()
    }

    fn connect(&mut self, chains: Vec<Arc<TrackChain>>) {
        self.inner.lock().unwrap().bus.connect(chains);
    }

    fn disconnect_all(&mut self) {
        self.inner.lock().unwrap().bus.disconnect_all();
    }

    fn start_sources(&mut self, sources: Vec<LiveSource>) {
        self.inner.lock().unwrap().bus.start(sources);
    }

    fn stop_sources(&mut self) {
        self.inner.lock().unwrap().bus.stop_all();
    }

    fn active_sources(&self) -> Vec<(usize, usize)> {
        self.inner.lock().unwrap().bus.active_sources()
    }

    fn prime(&mut self) -> Result<(), PlayerError> {
        let inner = self.inner.lock().unwrap();
        if inner.requires_gesture && !inner.gesture_given {
            return Err(PlayerError::BackendUnavailable(
                "priming requires a user gesture".to_string(),
            ));
        }
        Ok(())
    }

    fn requires_user_gesture(&self) -> bool {
        self.inner.lock().unwrap().requires_gesture
    }
}
