//! guard.rs
//! Single-flight guard for map session bootstrap. At most one mount may be
//! initializing or holding a session at a time; later mounts are no-ops
//! until the holder unmounts. A stale unmount (a claim that no longer
//! holds the guard) leaves the newer holder alone.
//!
//! The guard is an ordinary value owned by the host application, so tests
//! and multiple services can each have their own.

use std::fmt;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GuardState {
    Uninitialized,
    Initializing,
    Ready,
    /// Acquisition failed; still held until the owner unmounts.
    Failed,
}

/// Proof of holding the guard. Not cloneable; consumed by `release`.
#[derive(Debug, PartialEq, Eq)]
pub struct Claim {
    id: Uuid,
}

impl Claim {
    pub fn id(&self) -> Uuid { self.id }
}

impl fmt::Display for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.id) }
}

#[derive(Debug)]
struct Inner {
    state: GuardState,
    holder: Option<Uuid>,
}

#[derive(Debug)]
pub struct SessionGuard {
    inner: Mutex<Inner>,
}

impl Default for SessionGuard {
    fn default() -> Self { Self::new() }
}

impl SessionGuard {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner { state: GuardState::Uninitialized, holder: None }) }
    }

    pub fn state(&self) -> GuardState { self.inner.lock().state }

    pub fn holder(&self) -> Option<Uuid> { self.inner.lock().holder }

    /// `uninitialized -> initializing`. Returns `None` while another mount
    /// holds the guard.
    pub fn try_acquire(&self) -> Option<Claim> {
        let mut g = self.inner.lock();
        if g.state != GuardState::Uninitialized {
            debug!(state = ?g.state, "mount skipped, session already claimed");
            return None;
        }
        let id = Uuid::new_v4();
        g.state = GuardState::Initializing;
        g.holder = Some(id);
        info!(claim = %id, "map session initializing");
        Some(Claim { id })
    }

    fn transition(&self, claim: &Claim, to: GuardState) -> bool {
        let mut g = self.inner.lock();
        if g.holder != Some(claim.id) || g.state != GuardState::Initializing {
            return false;
        }
        g.state = to;
        true
    }

    /// `initializing -> ready`, only for the current holder.
    pub fn mark_ready(&self, claim: &Claim) -> bool { self.transition(claim, GuardState::Ready) }

    /// `initializing -> failed`, only for the current holder.
    pub fn mark_failed(&self, claim: &Claim) -> bool { self.transition(claim, GuardState::Failed) }

    /// Teardown. Resets to `uninitialized` if `claim` still holds the guard,
    /// otherwise changes nothing. Returns whether the guard was cleared.
    pub fn release(&self, claim: Claim) -> bool {
        let mut g = self.inner.lock();
        if g.holder != Some(claim.id) {
            debug!(claim = %claim, "stale unmount ignored");
            return false;
        }
        info!(claim = %claim, from = ?g.state, "map session torn down");
        g.state = GuardState::Uninitialized;
        g.holder = None;
        true
    }
}
