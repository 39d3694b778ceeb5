//! Device output through rodio.
//!
//! The rodio `OutputStream` is owned by a dedicated output thread; the
//! backend talks to it over a command channel. The device pulls samples from
//! a [`BusSource`], which renders the shared [`MixBus`] block by block, so
//! the bus frame counter advances exactly as fast as the hardware consumes
//! audio.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};
use rodio::buffer::SamplesBuffer;
use rodio::source::SeekError;
use rodio::{OutputStream, OutputStreamBuilder, Sink, Source};

use crate::audio::{BUS_CHANNELS, BUS_SAMPLE_RATE};
use crate::error::PlayerError;
use crate::playback::graph::{LiveSource, MixBus, TrackChain};

use super::{AudioBackend, BackendFactory, BackendState};

const OUTPUT_STREAM_OPEN_RETRIES: usize = 20;
const OUTPUT_STREAM_OPEN_RETRY_MS: u64 = 100;
const BLOCK_FRAMES: usize = 256;

enum Command {
    Resume(Sender<Result<(), String>>),
    Prime,
    Shutdown,
}

/// Pulls interleaved samples out of the mix bus for rodio.
struct BusSource {
    bus: Arc<Mutex<MixBus>>,
    block: Vec<f32>,
    position: usize,
    channels: u16,
    sample_rate: u32,
}

impl BusSource {
    fn new(bus: Arc<Mutex<MixBus>>) -> Self {
        let (channels, sample_rate) = {
            let bus = bus.lock().unwrap();
            (bus.channels(), bus.sample_rate())
        };
        Self {
            bus,
            block: vec![0.0; BLOCK_FRAMES * channels as usize],
            position: BLOCK_FRAMES * channels as usize,
            channels,
            sample_rate,
        }
    }
}

impl Iterator for BusSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.position >= self.block.len() {
            self.bus.lock().unwrap().render(&mut self.block);
            self.position = 0;
        }
        let sample = self.block[self.position];
        self.position += 1;
        Some(sample)
    }
}

impl Source for BusSource {
    fn current_span_len(&self) -> Option<usize> {
        Some(self.block.len() - self.position)
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }

    fn try_seek(&mut self, _pos: Duration) -> Result<(), SeekError> {
        Err(SeekError::NotSupported {
            underlying_source: "BusSource",
        })
    }
}

/// Default output device, rendered at 44.1kHz stereo.
pub struct RodioBackend {
    bus: Arc<Mutex<MixBus>>,
    frames: Arc<AtomicU64>,
    sample_rate: u32,
    channels: u16,
    state: BackendState,
    commands: Option<Sender<Command>>,
    thread: Option<JoinHandle<()>>,
}

impl RodioBackend {
    pub fn new() -> Self {
        let bus = MixBus::new(BUS_SAMPLE_RATE, BUS_CHANNELS);
        let frames = bus.frame_counter();
        Self {
            sample_rate: bus.sample_rate(),
            channels: bus.channels(),
            bus: Arc::new(Mutex::new(bus)),
            frames,
            state: BackendState::Suspended,
            commands: None,
            thread: None,
        }
    }

    /// Factory creating a fresh device backend on every call.
    pub fn factory() -> impl BackendFactory + 'static {
        || -> Result<Box<dyn AudioBackend>, PlayerError> { Ok(Box::new(RodioBackend::new())) }
    }

    fn spawn_output_thread(&mut self) -> Result<Sender<Command>, PlayerError> {
        if let Some(commands) = &self.commands {
            return Ok(commands.clone());
        }
        let (tx, rx) = mpsc::channel::<Command>();
        let bus = self.bus.clone();
        let handle = thread::Builder::new()
            .name("stemdeck-output".to_string())
            .spawn(move || run_output_thread(bus, rx))
            .map_err(|err| PlayerError::BackendUnavailable(err.to_string()))?;
        self.commands = Some(tx.clone());
        self.thread = Some(handle);
        Ok(tx)
    }

    fn send(&self, command: Command) {
        if let Some(commands) = &self.commands {
            let _ = commands.send(command);
        }
    }
}

impl Default for RodioBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn open_stream() -> Result<OutputStream, String> {
    let mut last_error = String::new();
    for attempt in 1..=OUTPUT_STREAM_OPEN_RETRIES {
        match OutputStreamBuilder::open_default_stream() {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                warn!(
                    "open_default_stream attempt {}/{} failed: {}",
                    attempt, OUTPUT_STREAM_OPEN_RETRIES, err
                );
                last_error = err.to_string();
                thread::sleep(Duration::from_millis(OUTPUT_STREAM_OPEN_RETRY_MS));
            }
        }
    }
    error!(
        "failed to open default output stream after {} attempts: {}",
        OUTPUT_STREAM_OPEN_RETRIES, last_error
    );
    Err(last_error)
}

fn run_output_thread(bus: Arc<Mutex<MixBus>>, commands: Receiver<Command>) {
    let mut output: Option<(OutputStream, Sink)> = None;

    for command in commands {
        match command {
            Command::Resume(reply) => {
                if output.is_none() {
                    match open_stream() {
                        Ok(stream) => {
                            let sink = Sink::connect_new(stream.mixer());
                            sink.append(BusSource::new(bus.clone()));
                            output = Some((stream, sink));
                        }
                        Err(err) => {
                            let _ = reply.send(Err(err));
                            continue;
                        }
                    }
                }
                if let Some((_, sink)) = &output {
                    sink.play();
                }
                let _ = reply.send(Ok(()));
            }
            Command::Prime => {
                if let Some((stream, _)) = &output {
                    let (channels, rate) = {
                        let bus = bus.lock().unwrap();
                        (bus.channels(), bus.sample_rate())
                    };
                    let silence = vec![0.0_f32; channels as usize];
                    stream.mixer().add(SamplesBuffer::new(channels, rate, silence));
                }
            }
            Command::Shutdown => break,
        }
    }

    if let Some((_, sink)) = output.take() {
        sink.stop();
    }
    debug!("output thread exiting");
}

impl AudioBackend for RodioBackend {
    fn state(&self) -> BackendState {
        self.state
    }

    fn resume(&mut self) -> Result<(), PlayerError> {
        match self.state {
            BackendState::Running => return Ok(()),
            BackendState::Closed => {
                return Err(PlayerError::BackendUnavailable(
                    "output device is closed".to_string(),
                ))
            }
            _ => {}
        }

        let commands = self.spawn_output_thread()?;
        let (reply_tx, reply_rx) = mpsc::channel();
        commands
            .send(Command::Resume(reply_tx))
            .map_err(|_| PlayerError::BackendUnavailable("output thread gone".to_string()))?;
        match reply_rx.recv() {
            Ok(Ok(())) => {
                info!("output device running");
                self.state = BackendState::Running;
                Ok(())
            }
            Ok(Err(reason)) => Err(PlayerError::BackendUnavailable(reason)),
            Err(_) => Err(PlayerError::BackendUnavailable(
                "output thread exited during resume".to_string(),
            )),
        }
    }

    fn close(&mut self) {
        if self.state == BackendState::Closed {
            return;
        }
        self.send(Command::Shutdown);
        self.commands = None;
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("output thread panicked during join");
            }
        }
        self.bus.lock().unwrap().disconnect_all();
        self.state = BackendState::Closed;
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn current_time(&self) -> f64 {
        self.frames.load(Ordering::Relaxed) as f64 / self.sample_rate as f64
    }

    fn connect(&mut self, chains: Vec<Arc<TrackChain>>) {
        self.bus.lock().unwrap().connect(chains);
    }

    fn disconnect_all(&mut self) {
        self.bus.lock().unwrap().disconnect_all();
    }

    fn start_sources(&mut self, sources: Vec<LiveSource>) {
        self.bus.lock().unwrap().start(sources);
    }

    fn stop_sources(&mut self) {
        self.bus.lock().unwrap().stop_all();
    }

    fn active_sources(&self) -> Vec<(usize, usize)> {
        self.bus.lock().unwrap().active_sources()
    }

    fn prime(&mut self) -> Result<(), PlayerError> {
        self.send(Command::Prime);
        Ok(())
    }
}

impl Drop for RodioBackend {
    fn drop(&mut self) {
        self.close();
    }
}
