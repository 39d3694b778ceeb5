//! Event payloads and callback registry shared between the player and its
//! consumers.
//!
//! Payloads are plain data keyed by track name; the player never stores UI
//! handles of any kind.

use std::sync::{Arc, RwLock};

use serde::Serialize;

/// Coarse phase of an in-flight load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPhase {
    Preparing,
    Downloading,
    Decoding,
}

/// Aggregate load progress across all requested tracks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadProgress {
    /// Weighted percentage: downloads and decodes contribute 50% each.
    pub percentage: u8,
    pub current_track_name: String,
    pub phase: LoadPhase,
    pub total_tracks: usize,
    pub downloaded_count: usize,
    pub decoded_count: usize,
}

/// Partial state update. Only fields that changed are `Some`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateChange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_loading: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_playing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Meter reading for one track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackLevel {
    pub name: String,
    /// RMS of the normalized frequency bins, in `[0, 1]`.
    pub level: f32,
}

/// Solo flag of one track, returned by `toggle_solo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoloState {
    pub name: String,
    pub is_soloed: bool,
}

/// Mix state of one track for UI synchronization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSnapshot {
    pub name: String,
    pub volume: f32,
    pub is_muted: bool,
    pub is_soloed: bool,
    /// Effective linear gain after volume curve, mute and solo.
    pub gain: f32,
}

pub(crate) type Handler<T> = Arc<dyn Fn(T) + Send + Sync>;
pub(crate) type ProgressHandler = Arc<dyn Fn(f64, f64) + Send + Sync>;

/// Registered consumer callbacks.
#[derive(Default)]
pub(crate) struct Callbacks {
    load_progress: RwLock<Option<Handler<LoadProgress>>>,
    state_change: RwLock<Option<Handler<StateChange>>>,
    progress_update: RwLock<Option<ProgressHandler>>,
    meter_update: RwLock<Option<Handler<Vec<TrackLevel>>>>,
}

impl Callbacks {
    pub(crate) fn set_load_progress(&self, handler: Handler<LoadProgress>) {
        *self.load_progress.write().unwrap() = Some(handler);
    }

    pub(crate) fn set_state_change(&self, handler: Handler<StateChange>) {
        *self.state_change.write().unwrap() = Some(handler);
    }

    pub(crate) fn set_progress_update(&self, handler: ProgressHandler) {
        *self.progress_update.write().unwrap() = Some(handler);
    }

    pub(crate) fn set_meter_update(&self, handler: Handler<Vec<TrackLevel>>) {
        *self.meter_update.write().unwrap() = Some(handler);
    }

    // Handlers are cloned out before the call so a handler may re-register
    // callbacks without deadlocking.

    pub(crate) fn load_progress(&self, progress: LoadProgress) {
        let handler = self.load_progress.read().unwrap().clone();
        if let Some(handler) = handler {
            handler(progress);
        }
    }

    pub(crate) fn state_change(&self, change: StateChange) {
        let handler = self.state_change.read().unwrap().clone();
        if let Some(handler) = handler {
            handler(change);
        }
    }

    pub(crate) fn progress_update(&self, current_time: f64, duration: f64) {
        let handler = self.progress_update.read().unwrap().clone();
        if let Some(handler) = handler {
            handler(current_time, duration);
        }
    }

    pub(crate) fn meter_update(&self, levels: Vec<TrackLevel>) {
        let handler = self.meter_update.read().unwrap().clone();
        if let Some(handler) = handler {
            handler(levels);
        }
    }
}
