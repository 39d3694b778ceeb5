//! Background progress loop bound to the playing lifetime.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, warn};

struct Running {
    wake: Sender<()>,
    handle: JoinHandle<()>,
}

/// Periodic tick thread. At most one loop runs per ticker.
#[derive(Clone, Default)]
pub(crate) struct Ticker {
    generation: Arc<AtomicU64>,
    running: Arc<Mutex<Option<Running>>>,
}

impl Ticker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Start ticking every `interval`. Any previous loop is stopped first.
    ///
    /// `tick` returns `false` to end the loop on its own.
    pub(crate) fn start<F>(&self, interval: Duration, mut tick: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.stop();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let current = self.generation.clone();
        let (wake, rx) = mpsc::channel::<()>();

        let spawned = std::thread::Builder::new()
            .name("stemdeck-ticker".to_string())
            .spawn(move || loop {
                match rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
                if current.load(Ordering::SeqCst) != generation {
                    break;
                }
                if !tick() {
                    debug!("ticker {} finished", generation);
                    break;
                }
            });

        match spawned {
            Ok(handle) => *self.running.lock().unwrap() = Some(Running { wake, handle }),
            Err(err) => warn!("failed to spawn ticker thread: {}", err),
        }
    }

    /// Current loop generation. Every start and stop moves it forward.
    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Stop the loop and wait for it to exit.
    pub(crate) fn stop(&self) {
        let running = {
            let mut running = self.running.lock().unwrap();
            self.generation.fetch_add(1, Ordering::SeqCst);
            running.take()
        };
        self.finish(running);
    }

    /// Stop the loop only if no start or stop happened since `generation`
    /// was read.
    pub(crate) fn stop_if(&self, generation: u64) {
        let running = {
            let mut running = self.running.lock().unwrap();
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!("ticker moved past generation {}; leaving it running", generation);
                return;
            }
            self.generation.fetch_add(1, Ordering::SeqCst);
            running.take()
        };
        self.finish(running);
    }

    fn finish(&self, running: Option<Running>) {
        let Some(running) = running else {
            return;
        };
        let _ = running.wake.send(());
        if running.handle.thread().id() == std::thread::current().id() {
            debug!("ticker stop called from ticker thread; skipping join");
        } else if running.handle.join().is_err() {
            warn!("ticker thread panicked during join");
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn wait_for(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    #[test]
    fn ticks_until_stopped() {
        let ticker = Ticker::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        ticker.start(Duration::from_millis(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        assert!(wait_for(Duration::from_secs(2), || count.load(Ordering::SeqCst) >= 3));
        ticker.stop();
        assert!(!ticker.is_running());
        let after_stop = count.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn returning_false_ends_the_loop() {
        let ticker = Ticker::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        ticker.start(Duration::from_millis(1), move || {
            counter.fetch_add(1, Ordering::SeqCst) < 1
        });

        assert!(wait_for(Duration::from_secs(2), || !ticker.is_running()));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn restarting_replaces_the_previous_loop() {
        let ticker = Ticker::new();
        let first = Arc::new(AtomicUsize::new(0));
        let first_counter = first.clone();
        ticker.start(Duration::from_millis(1), move || {
            first_counter.fetch_add(1, Ordering::SeqCst);
            true
        });
        ticker.start(Duration::from_millis(1), || true);

        let frozen = first.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(first.load(Ordering::SeqCst), frozen);
        ticker.stop();
    }

    #[test]
    fn stop_if_ignores_a_newer_loop() {
        let ticker = Ticker::new();
        ticker.start(Duration::from_millis(1), || true);
        let stale = ticker.generation();
        ticker.start(Duration::from_millis(1), || true);

        ticker.stop_if(stale);
        assert!(ticker.is_running());

        ticker.stop_if(ticker.generation());
        assert!(!ticker.is_running());
    }

    #[test]
    fn stop_without_start_is_harmless() {
        Ticker::new().stop();
    }
}
