//! In-memory backend and fixture builders for the state codec's test
//! suites (spec §8.a): a `Vec<u8>`-backed `NvramBackend`/`NvBackend`
//! implementation with configurable capacity, so the overflow paths of
//! Testable Property 7 can be exercised without real NVRAM hardware.
//!
//! Grounded in `fuel-tx`'s `test-helpers` crate feature and
//! `fuel-vm`'s in-memory `MemoryStorage`.

use std::collections::HashMap;

use tpmstate_storage::{BackendError, NvBackend, NvramBackend, PlatformLatch, WallClock};

/// An in-memory stand-in for the platform's NVRAM subsystem: named blobs
/// plus a fixed-capacity byte window, both backed by plain `Vec<u8>`s.
#[derive(Debug, Default)]
pub struct MemoryNvram {
    blobs: HashMap<String, Vec<u8>>,
    window: Vec<u8>,
}

impl MemoryNvram {
    /// Builds a window of `capacity` zeroed bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        MemoryNvram { blobs: HashMap::new(), window: vec![0u8; capacity] }
    }
}

impl NvramBackend for MemoryNvram {
    fn nvram_load(&self, name: &str) -> Result<Vec<u8>, BackendError> {
        self.blobs.get(name).cloned().ok_or_else(|| BackendError::NotFound(name.to_string()))
    }

    fn nvram_store(&mut self, name: &str, bytes: &[u8]) -> Result<(), BackendError> {
        self.blobs.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }
}

impl NvBackend for MemoryNvram {
    fn capacity(&self) -> usize {
        self.window.len()
    }

    fn nv_read(&self, offset: usize, len: usize) -> Result<Vec<u8>, BackendError> {
        let end = offset.checked_add(len).ok_or(BackendError::OutOfRange { offset, len, window: self.window.len() })?;
        self.window
            .get(offset..end)
            .map(<[u8]>::to_vec)
            .ok_or(BackendError::OutOfRange { offset, len, window: self.window.len() })
    }

    fn nv_write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), BackendError> {
        let end = offset
            .checked_add(bytes.len())
            .ok_or(BackendError::OutOfRange { offset, len: bytes.len(), window: self.window.len() })?;
        let window_len = self.window.len();
        let slot = self
            .window
            .get_mut(offset..end)
            .ok_or(BackendError::OutOfRange { offset, len: bytes.len(), window: window_len })?;
        slot.copy_from_slice(bytes);
        Ok(())
    }
}

/// A platform latch that simply remembers its bit in memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryLatch {
    established: bool,
}

impl PlatformLatch for MemoryLatch {
    fn tpm_established_get(&self) -> bool {
        self.established
    }

    fn tpm_established_set(&mut self) {
        self.established = true;
    }

    fn tpm_established_reset(&mut self) {
        self.established = false;
    }
}

/// A wall clock whose reading is fixed at construction time, so
/// time-re-anchoring tests can assert an exact delta.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

impl WallClock for FixedClock {
    fn wall_clock_now(&self) -> u64 {
        self.0
    }
}
