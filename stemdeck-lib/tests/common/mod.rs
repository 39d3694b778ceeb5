#![allow(dead_code)]

use std::f32::consts::PI;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use stemdeck_lib::{
    LoadProgress, ManualBackend, Player, PlayerSettings, StateChange, TrackRequest,
};

pub const SAMPLE_RATE: u32 = 8_000;

/// Write a mono 16-bit WAV holding a sine tone (or silence when `amplitude`
/// is zero).
pub fn write_wav(dir: &Path, file_name: &str, seconds: f64, frequency: f32, amplitude: f32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(dir.join(file_name), spec).expect("create wav");
    let frames = (seconds * SAMPLE_RATE as f64).round() as usize;
    for i in 0..frames {
        let t = i as f32 / SAMPLE_RATE as f32;
        let sample = amplitude * (2.0 * PI * frequency * t).sin();
        writer
            .write_sample((sample * i16::MAX as f32) as i16)
            .expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}

/// Write one tone stem per name and return matching requests.
pub fn write_stems(dir: &Path, names: &[&str], seconds: f64) -> Vec<TrackRequest> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let file_name = format!("{}.wav", name);
            write_wav(dir, &file_name, seconds, 220.0 * (i + 1) as f32, 0.5);
            TrackRequest::new(*name, file_name)
        })
        .collect()
}

/// Poll `condition` until it holds or `deadline` passes.
pub fn wait_for(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Everything a player reported through its callbacks.
#[derive(Default)]
pub struct Recorded {
    pub states: Vec<StateChange>,
    pub load_progress: Vec<LoadProgress>,
    pub progress: Vec<(f64, f64)>,
    pub meters: usize,
}

pub struct Harness {
    pub player: Player,
    pub backend: ManualBackend,
    pub recorded: Arc<Mutex<Recorded>>,
    pub dir: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_backend(ManualBackend::new(SAMPLE_RATE))
    }

    /// Player over `backend` whose background ticker never fires on its
    /// own; tests drive it with `Player::tick`.
    pub fn with_backend(backend: ManualBackend) -> Self {
        let settings = PlayerSettings {
            tick_interval_ms: 600_000,
            ..Default::default()
        };
        let player = Player::with_settings(backend.factory(), settings);
        let dir = tempfile::tempdir().expect("tempdir");
        player.set_base_dir(dir.path());

        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let sink = recorded.clone();
        player.on_state_change(move |change| sink.lock().unwrap().states.push(change));
        let sink = recorded.clone();
        player.on_load_progress(move |progress| sink.lock().unwrap().load_progress.push(progress));
        let sink = recorded.clone();
        player.on_progress_update(move |time, duration| {
            sink.lock().unwrap().progress.push((time, duration))
        });
        let sink = recorded.clone();
        player.on_meter_update(move |_| sink.lock().unwrap().meters += 1);

        Self {
            player,
            backend,
            recorded,
            dir,
        }
    }

    pub fn stems(&self, names: &[&str], seconds: f64) -> Vec<TrackRequest> {
        write_stems(self.dir.path(), names, seconds)
    }

    pub fn last_state(&self) -> Option<StateChange> {
        self.recorded.lock().unwrap().states.last().cloned()
    }

    pub fn states(&self) -> Vec<StateChange> {
        self.recorded.lock().unwrap().states.clone()
    }
}
