//! Framed-record codec (spec §4.2): the 6-byte `(version, magic)` prefix
//! carried by every composite record and top-level blob.

use crate::error::CodecError;
use crate::io::{Input, Output};
use crate::primitive::{Marshal, Unmarshal};

/// A record frame: 16-bit version, 32-bit magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NvHeader {
    pub version: u16,
    pub magic: u32,
}

impl NvHeader {
    pub fn new(version: u16, magic: u32) -> Self {
        NvHeader { version, magic }
    }

    /// Writes the frame, returning the 6 bytes written.
    pub fn marshal<O: Output + ?Sized>(&self, out: &mut O) -> usize {
        let mut written = self.version.marshal(out);
        written += self.magic.marshal(out);
        written
    }

    /// Reads a frame and validates it against `expected_magic` and
    /// `current_version`: fails `BAD_TAG` on magic mismatch, `BAD_VERSION`
    /// if the stored version exceeds what this reader supports.
    pub fn unmarshal<I: Input + ?Sized>(
        input: &mut I,
        record: &'static str,
        expected_magic: u32,
        current_version: u16,
    ) -> Result<Self, CodecError> {
        let version = u16::unmarshal(input, record, "version")?;
        let magic = u32::unmarshal(input, record, "magic")?;
        if magic != expected_magic {
            tracing::warn!(record, expected = format!("0x{expected_magic:08x}"), actual = format!("0x{magic:08x}"), "bad tag");
            return Err(CodecError::bad_tag(record, expected_magic, magic));
        }
        if version > current_version {
            tracing::warn!(record, max = current_version, actual = version, "bad version");
            return Err(CodecError::bad_version(record, current_version, version));
        }
        Ok(NvHeader { version, magic })
    }
}

/// Writes the trailing magic sentinel used by `VOLATILE_STATE` and
/// `PERSISTENT_ALL` (spec §4.4, §6).
pub fn marshal_trailing_magic<O: Output + ?Sized>(magic: u32, out: &mut O) -> usize {
    magic.marshal(out)
}

/// Reads and validates the trailing magic sentinel.
pub fn unmarshal_trailing_magic<I: Input + ?Sized>(
    input: &mut I,
    record: &'static str,
    expected_magic: u32,
) -> Result<(), CodecError> {
    let actual = u32::unmarshal(input, record, "trailing_magic")?;
    if actual != expected_magic {
        tracing::warn!(record, expected = format!("0x{expected_magic:08x}"), actual = format!("0x{actual:08x}"), "bad trailing sentinel");
        return Err(CodecError::bad_tag(record, expected_magic, actual));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{SliceInput, VecOutput};

    const TEST_MAGIC: u32 = 0x1234_5678;

    #[test]
    fn header_roundtrip() {
        let header = NvHeader::new(1, TEST_MAGIC);
        let mut out = VecOutput::new();
        let written = header.marshal(&mut out);
        assert_eq!(written, 6);

        let mut input = SliceInput::new(&out.0);
        let read_back = NvHeader::unmarshal(&mut input, "test", TEST_MAGIC, 1).unwrap();
        assert_eq!(read_back, header);
    }

    #[test]
    fn bad_tag_on_magic_mismatch() {
        let header = NvHeader::new(1, TEST_MAGIC);
        let mut out = VecOutput::new();
        header.marshal(&mut out);

        let mut input = SliceInput::new(&out.0);
        let err = NvHeader::unmarshal(&mut input, "test", 0xdead_beef, 1).unwrap_err();
        assert!(matches!(err, CodecError::BadTag { .. }));
    }

    #[test]
    fn bad_version_when_stored_exceeds_reader() {
        let header = NvHeader::new(2, TEST_MAGIC);
        let mut out = VecOutput::new();
        header.marshal(&mut out);

        let mut input = SliceInput::new(&out.0);
        let err = NvHeader::unmarshal(&mut input, "test", TEST_MAGIC, 1).unwrap_err();
        assert!(matches!(err, CodecError::BadVersion { .. }));
    }

    #[test]
    fn lower_stored_version_is_accepted() {
        let header = NvHeader::new(1, TEST_MAGIC);
        let mut out = VecOutput::new();
        header.marshal(&mut out);

        let mut input = SliceInput::new(&out.0);
        NvHeader::unmarshal(&mut input, "test", TEST_MAGIC, 2).unwrap();
    }

    #[test]
    fn trailing_sentinel_mismatch_is_bad_tag() {
        let mut out = VecOutput::new();
        marshal_trailing_magic(TEST_MAGIC, &mut out);
        let mut input = SliceInput::new(&out.0);
        let err = unmarshal_trailing_magic(&mut input, "test", 0xdead_beef).unwrap_err();
        assert!(matches!(err, CodecError::BadTag { .. }));
    }
}
