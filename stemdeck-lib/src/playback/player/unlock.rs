//! Output unlock handling for platforms that gate audio behind a gesture.

use log::{debug, info, warn};

use crate::playback::backend::BackendState;

use super::{Core, Player};

impl Core {
    pub(super) fn force_unlock(&mut self) -> bool {
        if self.unlocked {
            return true;
        }
        let Some(backend) = self.backend.as_mut() else {
            return false;
        };
        if let Err(err) = backend.prime() {
            debug!("priming output failed: {}", err);
            return false;
        }
        if matches!(
            backend.state(),
            BackendState::Suspended | BackendState::Interrupted
        ) {
            if let Err(err) = backend.resume() {
                warn!("unlock could not resume output: {}", err);
                return false;
            }
        }
        self.unlocked = backend.state() == BackendState::Running;
        if self.unlocked {
            info!("audio output unlocked");
        }
        self.unlocked
    }
}

impl Player {
    /// Try to unlock audio output. Call from a user-gesture handler on
    /// platforms that require one.
    ///
    /// Returns whether output is unlocked afterwards.
    pub fn force_unlock(&self) -> bool {
        let mut core = self.core.lock().unwrap();
        if let Err(err) = core.ensure_backend() {
            warn!("unlock failed: {}", err);
            return false;
        }
        core.force_unlock()
    }

    pub fn is_unlocked(&self) -> bool {
        self.core.lock().unwrap().unlocked
    }

    /// Tell the player whether the host is in the foreground.
    ///
    /// Coming back to the foreground with the output suspended underneath
    /// the player clears the unlocked flag on gesture-gated backends, so the
    /// next `play` unlocks again.
    pub fn set_visibility(&self, visible: bool) {
        if !visible {
            return;
        }
        let mut core = self.core.lock().unwrap();
        let relock = core.backend.as_ref().is_some_and(|backend| {
            backend.requires_user_gesture()
                && matches!(
                    backend.state(),
                    BackendState::Suspended | BackendState::Interrupted
                )
        });
        if relock && core.unlocked {
            debug!("output suspended while hidden; unlock required");
            core.unlocked = false;
        }
    }
}
