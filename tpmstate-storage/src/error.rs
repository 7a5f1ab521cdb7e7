//! Errors raised by a backend implementation, at the seam where the codec
//! calls out to external collaborators (spec §1 "out of scope", §6
//! "external backend interface").

use thiserror::Error;
use tpmstate_types::CodecError;

/// Errors a [`crate::NvramBackend`]/[`crate::NvBackend`] implementation can
/// raise. Kept separate from [`CodecError`] because these originate outside
/// the codec (spec §1: the NVRAM backend is an external collaborator, not
/// part of the codec's own error taxonomy) but are folded into it at the
/// call site so the codec's public API stays a single `Result` type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// No blob is stored under this name.
    #[error("no blob named {0:?} in the backend")]
    NotFound(String),
    /// A byte-granular read or write fell outside the NVRAM window.
    #[error("NVRAM access out of range: offset {offset}, len {len}, window size {window}")]
    OutOfRange { offset: usize, len: usize, window: usize },
    /// The underlying storage medium failed for a reason the codec cannot
    /// further diagnose.
    #[error("backend I/O error: {0}")]
    Io(String),
}

impl From<BackendError> for CodecError {
    fn from(e: BackendError) -> Self {
        CodecError::bad_parameter("NvramBackend", "backend", e.to_string())
    }
}
