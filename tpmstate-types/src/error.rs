//! The error taxonomy shared by every layer of the state codec.

use thiserror::Error;

/// Result alias used throughout the codec.
pub type Result<T, E = CodecError> = core::result::Result<T, E>;

/// The six error kinds the codec can surface, each carrying enough context to
/// name the offending record and field in a log line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Cursor underflow on read, or overflow on write.
    #[error("{record}.{field}: insufficient bytes (needed {needed}, had {available})")]
    Insufficient {
        record: &'static str,
        field: &'static str,
        needed: usize,
        available: usize,
    },

    /// Magic mismatch on a record frame, or on a trailing sentinel.
    #[error("{record}: bad tag (expected 0x{expected:08x}, got 0x{actual:08x})")]
    BadTag {
        record: &'static str,
        expected: u32,
        actual: u32,
    },

    /// Stored version exceeds the reader's version for that record.
    #[error("{record}: bad version (reader supports up to {max}, blob has {actual})")]
    BadVersion {
        record: &'static str,
        max: u16,
        actual: u16,
    },

    /// Array cardinality or byte length differs from the reader's fixed
    /// expectation (outside the documented min-copy exceptions).
    #[error("{record}.{field}: size mismatch (expected {expected}, got {actual})")]
    Size {
        record: &'static str,
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Unknown algorithm tag, clock-size discriminator mismatch,
    /// compile-constants mismatch, missing mandatory skip block, or a handle
    /// of unknown type where a parameter error is the appropriate diagnosis.
    #[error("{record}.{field}: bad parameter: {detail}")]
    BadParameter {
        record: &'static str,
        field: &'static str,
        detail: String,
    },

    /// A user-NVRAM entry bears a handle of a type the codec cannot dispatch.
    #[error("{record}: unhandled handle 0x{handle:08x}")]
    Handle { record: &'static str, handle: u32 },
}

impl CodecError {
    pub fn insufficient(record: &'static str, field: &'static str, needed: usize, available: usize) -> Self {
        CodecError::Insufficient { record, field, needed, available }
    }

    pub fn bad_tag(record: &'static str, expected: u32, actual: u32) -> Self {
        CodecError::BadTag { record, expected, actual }
    }

    pub fn bad_version(record: &'static str, max: u16, actual: u16) -> Self {
        CodecError::BadVersion { record, max, actual }
    }

    pub fn size(record: &'static str, field: &'static str, expected: usize, actual: usize) -> Self {
        CodecError::Size { record, field, expected, actual }
    }

    pub fn bad_parameter(record: &'static str, field: &'static str, detail: impl Into<String>) -> Self {
        CodecError::BadParameter { record, field, detail: detail.into() }
    }

    pub fn handle(record: &'static str, handle: u32) -> Self {
        CodecError::Handle { record, handle }
    }
}
