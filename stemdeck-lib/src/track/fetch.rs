//! Byte fetching for track sources.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::debug;

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Progress hook invoked as bytes arrive.
///
/// Receives `(loaded, total)`; `total` is `None` when the length is not known
/// up front. Returning `false` asks the fetcher to abandon the transfer.
pub type FetchProgress<'a> = &'a mut dyn FnMut(u64, Option<u64>) -> bool;

/// Source of raw track bytes.
///
/// Implementations must be shareable across the loader's worker threads.
pub trait Fetcher: Send + Sync {
    /// Fetch all bytes behind `locator`.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason on IO/network/status failure or when
    /// the transfer was abandoned through `progress`.
    fn fetch(&self, locator: &str, progress: FetchProgress<'_>) -> Result<Vec<u8>, String>;
}

/// Default fetcher: local files relative to a base directory, plus
/// `http(s)://` URLs when built with the `http` feature.
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    base_dir: PathBuf,
    chunk_size: usize,
}

impl Default for SourceFetcher {
    fn default() -> Self {
        Self::new(".")
    }
}

impl SourceFetcher {
    /// Create a fetcher resolving relative locators against `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Override the read chunk size (and therefore progress granularity).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn resolve(&self, locator: &str) -> PathBuf {
        let path = Path::new(locator);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    fn fetch_file(&self, locator: &str, progress: FetchProgress<'_>) -> Result<Vec<u8>, String> {
        let path = self.resolve(locator);
        let file = File::open(&path).map_err(|err| format!("{}: {}", path.display(), err))?;
        let total = file.metadata().ok().map(|meta| meta.len());
        debug!("fetching {} ({:?} bytes)", path.display(), total);
        read_with_progress(file, total, self.chunk_size, progress)
    }

    #[cfg(feature = "http")]
    fn fetch_http(&self, url: &str, progress: FetchProgress<'_>) -> Result<Vec<u8>, String> {
        let response = reqwest::blocking::get(url)
            .and_then(|response| response.error_for_status())
            .map_err(|err| err.to_string())?;
        let total = response.content_length();
        debug!("fetching {} ({:?} bytes)", url, total);
        read_with_progress(response, total, self.chunk_size, progress)
    }
}

impl Fetcher for SourceFetcher {
    fn fetch(&self, locator: &str, progress: FetchProgress<'_>) -> Result<Vec<u8>, String> {
        if is_remote(locator) {
            #[cfg(feature = "http")]
            return self.fetch_http(locator, progress);
            #[cfg(not(feature = "http"))]
            return Err(format!(
                "remote locator {} requires the `http` feature",
                locator
            ));
        }
        self.fetch_file(locator, progress)
    }
}

fn is_remote(locator: &str) -> bool {
    let lower = locator.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn read_with_progress<R: Read>(
    mut reader: R,
    total: Option<u64>,
    chunk_size: usize,
    progress: FetchProgress<'_>,
) -> Result<Vec<u8>, String> {
    let mut bytes = Vec::with_capacity(total.unwrap_or(0) as usize);
    let mut chunk = vec![0_u8; chunk_size];
    loop {
        let read = reader.read(&mut chunk).map_err(|err| err.to_string())?;
        if read == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..read]);
        if !progress(bytes.len() as u64, total) {
            return Err("transfer aborted".to_string());
        }
    }
    Ok(bytes)
}
