//! Concurrent fetch + decode pipeline with aggregate progress reporting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

use log::{debug, info, warn};

use crate::audio::DecodedBuffer;
use crate::error::PlayerError;
use crate::events::{LoadPhase, LoadProgress};

use super::decode::{decode_bytes, BusFormat};
use super::fetch::Fetcher;
use super::TrackRequest;

const DOWNLOAD_WEIGHT: f64 = 0.5;
const DECODE_WEIGHT: f64 = 0.5;

/// Message sent from a worker to the aggregating thread.
enum LoadEvent {
    Downloading { index: usize, fraction: f64 },
    Downloaded { index: usize },
    Decoded { index: usize, buffer: DecodedBuffer },
    Failed { error: PlayerError },
}

/// Per-load progress bookkeeping.
#[derive(Debug)]
pub(crate) struct LoadTracker {
    names: Vec<String>,
    download_progress: Vec<f64>,
    decoded: Vec<bool>,
    current_track_name: String,
    phase: LoadPhase,
}

impl LoadTracker {
    pub(crate) fn new(requests: &[TrackRequest]) -> Self {
        Self {
            names: requests.iter().map(|r| r.name.clone()).collect(),
            download_progress: vec![0.0; requests.len()],
            decoded: vec![false; requests.len()],
            current_track_name: String::new(),
            phase: LoadPhase::Preparing,
        }
    }

    pub(crate) fn download_progress(&mut self, index: usize, fraction: f64) {
        self.download_progress[index] = fraction.clamp(0.0, 1.0);
        self.current_track_name = self.names[index].clone();
        self.phase = LoadPhase::Downloading;
    }

    pub(crate) fn downloaded(&mut self, index: usize) {
        self.download_progress[index] = 1.0;
        self.current_track_name = self.names[index].clone();
        self.phase = LoadPhase::Decoding;
    }

    pub(crate) fn decoded(&mut self, index: usize) {
        self.decoded[index] = true;
    }

    pub(crate) fn snapshot(&self) -> LoadProgress {
        let total = self.names.len();
        let (download_part, decode_part) = if total == 0 {
            (0.0, 0.0)
        } else {
            let downloaded: f64 = self.download_progress.iter().sum();
            let decoded = self.decoded.iter().filter(|d| **d).count() as f64;
            (
                downloaded / total as f64 * DOWNLOAD_WEIGHT,
                decoded / total as f64 * DECODE_WEIGHT,
            )
        };
        let percentage = ((download_part + decode_part) * 100.0).round().clamp(0.0, 100.0);

        LoadProgress {
            percentage: percentage as u8,
            current_track_name: self.current_track_name.clone(),
            phase: self.phase,
            total_tracks: total,
            downloaded_count: self.download_progress.iter().filter(|p| **p >= 1.0).count(),
            decoded_count: self.decoded.iter().filter(|d| **d).count(),
        }
    }
}

/// Fetch and decode every request concurrently.
///
/// Each request gets its own worker thread which fetches and then decodes.
/// Progress is aggregated on the calling thread and reported through
/// `on_progress` after every download-progress or decode-completion event.
///
/// # Returns
///
/// Decoded buffers in request order.
///
/// # Errors
///
/// The first fetch or decode failure wins; remaining workers are asked to
/// abort and no buffers are returned.
pub(crate) fn load_tracks(
    requests: &[TrackRequest],
    fetcher: &dyn Fetcher,
    format: BusFormat,
    mut on_progress: impl FnMut(LoadProgress),
) -> Result<Vec<DecodedBuffer>, PlayerError> {
    let abort = AtomicBool::new(false);
    let mut tracker = LoadTracker::new(requests);
    let mut completed: Vec<(usize, DecodedBuffer)> = Vec::with_capacity(requests.len());
    let mut first_error: Option<PlayerError> = None;

    on_progress(tracker.snapshot());

    thread::scope(|scope| {
        let (tx, rx) = mpsc::channel::<LoadEvent>();

        for (index, request) in requests.iter().enumerate() {
            let tx = tx.clone();
            let abort = &abort;
            scope.spawn(move || {
                let event = match fetch_and_decode(index, request, fetcher, format, abort, &tx) {
                    Ok(buffer) => LoadEvent::Decoded { index, buffer },
                    Err(error) => LoadEvent::Failed { error },
                };
                let _ = tx.send(event);
            });
        }
        drop(tx);

        for event in rx {
            match event {
                LoadEvent::Downloading { index, fraction } => {
                    if first_error.is_none() {
                        tracker.download_progress(index, fraction);
                        on_progress(tracker.snapshot());
                    }
                }
                LoadEvent::Downloaded { index } => {
                    if first_error.is_none() {
                        tracker.downloaded(index);
                        on_progress(tracker.snapshot());
                    }
                }
                LoadEvent::Decoded { index, buffer } => {
                    if first_error.is_none() {
                        tracker.decoded(index);
                        completed.push((index, buffer));
                        on_progress(tracker.snapshot());
                    }
                }
                LoadEvent::Failed { error } => {
                    if first_error.is_none() {
                        warn!("load failed: {}", error);
                        abort.store(true, Ordering::Relaxed);
                        first_error = Some(error);
                    } else {
                        debug!("suppressed follow-up load failure: {}", error);
                    }
                }
            }
        }
    });

    if let Some(error) = first_error {
        return Err(error);
    }

    // Network completion order is not request order.
    completed.sort_by_key(|(index, _)| *index);
    info!("loaded {} tracks", completed.len());
    Ok(completed.into_iter().map(|(_, buffer)| buffer).collect())
}

fn fetch_and_decode(
    index: usize,
    request: &TrackRequest,
    fetcher: &dyn Fetcher,
    format: BusFormat,
    abort: &AtomicBool,
    tx: &mpsc::Sender<LoadEvent>,
) -> Result<DecodedBuffer, PlayerError> {
    let bytes = fetcher
        .fetch(&request.source_locator, &mut |loaded, total| {
            if let Some(total) = total.filter(|total| *total > 0) {
                let fraction = loaded as f64 / total as f64;
                let _ = tx.send(LoadEvent::Downloading { index, fraction });
            }
            !abort.load(Ordering::Relaxed)
        })
        .map_err(|reason| PlayerError::Fetch {
            track: request.name.clone(),
            reason,
        })?;

    let _ = tx.send(LoadEvent::Downloaded { index });

    decode_bytes(bytes, &request.source_locator, format, Some(abort)).map_err(|reason| {
        PlayerError::Decode {
            track: request.name.clone(),
            reason,
        }
    })
}
