//! Reader for the `songs.json` manifest.
//!
//! The manifest is a JSON object mapping a song name to an ordered list of
//! stems:
//!
//! ```json
//! {
//!     "Song A": [
//!         { "name": "Bass", "path": "audio/Song A/Bass.mp3" },
//!         { "name": "Vocals", "path": "audio/Song A/Vocals.mp3" }
//!     ]
//! }
//! ```
//!
//! Song order and stem order are preserved. Stem paths are relative to the
//! manifest's own directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PlayerError;
use crate::track::TrackRequest;

/// One stem entry of a song.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    pub name: String,
    pub tracks: Vec<TrackDescriptor>,
}

impl Song {
    /// Track requests for this song, in manifest order.
    pub fn requests(&self) -> Vec<TrackRequest> {
        self.tracks
            .iter()
            .map(|track| TrackRequest::new(track.name.clone(), track.path.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    songs: Vec<Song>,
    base_dir: PathBuf,
}

impl Manifest {
    /// Read and parse a manifest file. Stem paths resolve against the
    /// file's directory.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PlayerError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| {
            PlayerError::Manifest(format!("failed to read {}: {}", path.display(), err))
        })?;
        let mut manifest: Manifest = text.parse()?;
        manifest.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        debug!(
            "manifest {} lists {} songs",
            path.display(),
            manifest.songs.len()
        );
        Ok(manifest)
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn song_names(&self) -> Vec<&str> {
        self.songs.iter().map(|song| song.name.as_str()).collect()
    }

    pub fn first(&self) -> Option<&Song> {
        self.songs.first()
    }

    pub fn song(&self, name: &str) -> Result<&Song, PlayerError> {
        self.songs
            .iter()
            .find(|song| song.name == name)
            .ok_or_else(|| PlayerError::NotFound(format!("song \"{}\"", name)))
    }

    /// Directory stem paths are relative to.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }
}

impl FromStr for Manifest {
    type Err = PlayerError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let root: Map<String, Value> = serde_json::from_str(text)
            .map_err(|err| PlayerError::Manifest(format!("invalid manifest: {}", err)))?;

        let songs = root
            .into_iter()
            .map(|(name, tracks)| {
                let tracks: Vec<TrackDescriptor> = serde_json::from_value(tracks).map_err(|err| {
                    PlayerError::Manifest(format!("invalid tracks for \"{}\": {}", name, err))
                })?;
                Ok(Song { name, tracks })
            })
            .collect::<Result<Vec<_>, PlayerError>>()?;

        Ok(Self {
            songs,
            base_dir: PathBuf::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "Zebra": [
            { "name": "Vocals", "path": "audio/Zebra/Vocals.mp3" },
            { "name": "Bass", "path": "audio/Zebra/Bass.mp3" }
        ],
        "Alpha": [
            { "name": "Drums", "path": "audio/Alpha/Drums.wav" }
        ]
    }"#;

    #[test]
    fn songs_keep_manifest_order() {
        let manifest: Manifest = MANIFEST.parse().expect("parse manifest");
        assert_eq!(manifest.song_names(), vec!["Zebra", "Alpha"]);
        assert_eq!(manifest.first().map(|s| s.name.as_str()), Some("Zebra"));
    }

    #[test]
    fn song_becomes_ordered_requests() {
        let manifest: Manifest = MANIFEST.parse().expect("parse manifest");
        let requests = manifest.song("Zebra").expect("song").requests();
        assert_eq!(
            requests,
            vec![
                TrackRequest::new("Vocals", "audio/Zebra/Vocals.mp3"),
                TrackRequest::new("Bass", "audio/Zebra/Bass.mp3"),
            ]
        );
    }

    #[test]
    fn unknown_song_is_not_found() {
        let manifest: Manifest = MANIFEST.parse().expect("parse manifest");
        assert!(matches!(
            manifest.song("Nope"),
            Err(PlayerError::NotFound(_))
        ));
    }

    #[test]
    fn malformed_manifests_are_rejected() {
        assert!(matches!(
            "[1, 2]".parse::<Manifest>(),
            Err(PlayerError::Manifest(_))
        ));
        let err = r#"{"Song": [{"name": "x"}]}"#
            .parse::<Manifest>()
            .expect_err("missing path");
        assert!(err.to_string().contains("Song"));
    }

    #[test]
    fn base_dir_is_the_manifest_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("songs.json");
        fs::write(&path, MANIFEST).expect("write manifest");

        let manifest = Manifest::from_path(&path).expect("read manifest");
        assert_eq!(manifest.base_dir(), dir.path());
        assert!(Manifest::from_path(dir.path().join("missing.json")).is_err());
    }
}
