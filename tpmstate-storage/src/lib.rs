//! External backend interface (spec §6) consumed by the codec: blob-granular
//! NVRAM load/store, byte-granular NV window access, the TPM-established
//! platform latch, and the wall clock used for time re-anchoring.
//!
//! Mirrors the split `fuel-storage` draws between a narrow trait contract
//! and the data structures that satisfy it — the codec never knows or
//! cares whether a backend is a flat file, a database row, or an
//! in-memory `Vec<u8>` (the latter is what `tpmstate-test-helpers`
//! provides for tests).

pub mod error;

pub use error::BackendError;

/// Blob-granular persistent storage: whole top-level blobs are loaded and
/// stored under a name (spec §6 `nvram_load`/`nvram_store`).
pub trait NvramBackend {
    fn nvram_load(&self, name: &str) -> Result<Vec<u8>, BackendError>;
    fn nvram_store(&mut self, name: &str, bytes: &[u8]) -> Result<(), BackendError>;
}

/// Byte-granular access within the NVRAM window (spec §6 `nv_read`/
/// `nv_write`), used by `USER_NVRAM` and `INDEX_ORDERLY_RAM` to stream
/// entries directly to and from the backing store as they are parsed.
pub trait NvBackend {
    /// Total size of the addressable NVRAM window.
    fn capacity(&self) -> usize;

    fn nv_read(&self, offset: usize, len: usize) -> Result<Vec<u8>, BackendError>;
    fn nv_write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), BackendError>;
}

/// The TPM-established platform latch (spec §6, GLOSSARY): a one-bit signal
/// indicating that a locality-3 startup has occurred since the last reset.
pub trait PlatformLatch {
    fn tpm_established_get(&self) -> bool;
    fn tpm_established_set(&mut self);
    fn tpm_established_reset(&mut self);
}

/// Wall-clock source used for `VOLATILE_STATE`'s time re-anchoring on load
/// (spec §4.4).
pub trait WallClock {
    fn wall_clock_now(&self) -> u64;
}
