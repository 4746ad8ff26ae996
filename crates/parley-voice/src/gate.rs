//! Mic lock — the turn engine's primary echo guard.
//!
//! While the system is speaking, and for the cooldown that follows, the
//! microphone must stay closed or the recognizer re-captures the tail of the
//! system's own voice. The orchestrator engages this lock when a reply starts
//! playing and releases it when cooldown ends. Any attempt to start listening
//! while it is engaged is refused.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag arbitrating the microphone/speaker pair.
///
/// Clones share state, so a recognizer adapter holding a clone can drop
/// incoming audio without asking the orchestrator, and other playback in
/// the application (e.g. a pronunciation sample) can engage it too.
#[derive(Debug, Clone, Default)]
pub struct MicLock {
    locked: Arc<AtomicBool>,
}

impl MicLock {
    /// Create a new lock (initially released).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the microphone. Returns `true` if the lock was previously open.
    pub fn engage(&self) -> bool {
        let was_locked = self.locked.swap(true, Ordering::SeqCst);
        if !was_locked {
            tracing::debug!("Mic lock engaged, listening vetoed");
        }
        !was_locked
    }

    /// Reopen the microphone. Returns `true` if the lock was previously held.
    pub fn release(&self) -> bool {
        let was_locked = self.locked.swap(false, Ordering::SeqCst);
        if was_locked {
            tracing::debug!("Mic lock released, listening allowed");
        }
        was_locked
    }

    /// Whether listening is currently vetoed.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }
}
