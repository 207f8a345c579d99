//! Shared Telemetry State
//!
//! The single "latest reading" plus the active mode flag. Every connection
//! and background task reads and writes through one `SharedState`, injected
//! via `Arc`; nothing keeps a private copy.
//!
//! Both values live behind one `Mutex` so a mode check and the write it
//! guards happen in the same critical section. The lock is never held across
//! an `.await`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::reading::{Mode, Reading};

/// Point-in-time view of the shared state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub reading: Reading,
    pub mode: Mode,
}

/// Process-wide current reading and mode
pub struct SharedState {
    inner: Mutex<Snapshot>,
}

impl SharedState {
    /// Create state with the given initial reading and mode
    pub fn new(reading: Reading, mode: Mode) -> Self {
        Self {
            inner: Mutex::new(Snapshot { reading, mode }),
        }
    }

    /// Current reading
    pub fn get(&self) -> Reading {
        self.lock().reading
    }

    /// Replace the current reading
    pub fn set(&self, reading: Reading) {
        self.lock().reading = reading;
    }

    /// Current mode
    pub fn mode(&self) -> Mode {
        self.lock().mode
    }

    /// Set the mode, returning the previous one
    pub fn set_mode(&self, mode: Mode) -> Mode {
        std::mem::replace(&mut self.lock().mode, mode)
    }

    /// Reading and mode read together
    pub fn snapshot(&self) -> Snapshot {
        *self.lock()
    }

    /// Replace the reading only if `required` is the active mode
    ///
    /// Returns `Err` with the active mode when the write was refused.
    pub fn set_if_mode(&self, required: Mode, reading: Reading) -> Result<(), Mode> {
        let mut inner = self.lock();
        if inner.mode != required {
            return Err(inner.mode);
        }
        inner.reading = reading;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        // Snapshot is plain data; a panicked writer cannot leave it half-updated.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(Reading::default(), Mode::Synthetic)
    }
}
