//! Primitive codec (spec §4.1): fixed-width integers, one-byte booleans,
//! length-prefixed byte arrays. Every multi-byte integer is big-endian.

use crate::error::CodecError;
use crate::io::{Input, Output};

/// Marshal writes exactly `size_of::<Self>()` wire bytes and returns the
/// count written. Marshal never fails: every primitive has a fixed,
/// caller-independent wire size, and `Output` grows to fit.
pub trait Marshal {
    fn marshal<O: Output + ?Sized>(&self, out: &mut O) -> usize;
}

/// Unmarshal reads the same bytes `Marshal` would have written, signalling
/// `INSUFFICIENT` if fewer bytes remain than required. `record`/`field`
/// name the enclosing record and field for diagnostics; primitives have no
/// identity of their own, so the caller supplies it.
pub trait Unmarshal: Sized {
    fn unmarshal<I: Input + ?Sized>(
        input: &mut I,
        record: &'static str,
        field: &'static str,
    ) -> Result<Self, CodecError>;
}

macro_rules! impl_for_uint {
    ($t:ty) => {
        impl Marshal for $t {
            fn marshal<O: Output + ?Sized>(&self, out: &mut O) -> usize {
                let bytes = self.to_be_bytes();
                out.write(&bytes);
                bytes.len()
            }
        }

        impl Unmarshal for $t {
            fn unmarshal<I: Input + ?Sized>(
                input: &mut I,
                record: &'static str,
                field: &'static str,
            ) -> Result<Self, CodecError> {
                let mut buf = [0u8; core::mem::size_of::<$t>()];
                input.read(record, field, &mut buf)?;
                Ok(<$t>::from_be_bytes(buf))
            }
        }
    };
}

impl_for_uint!(u8);
impl_for_uint!(u16);
impl_for_uint!(u32);
impl_for_uint!(u64);

impl Marshal for bool {
    fn marshal<O: Output + ?Sized>(&self, out: &mut O) -> usize {
        out.push_byte(if *self { 1 } else { 0 });
        1
    }
}

impl Unmarshal for bool {
    fn unmarshal<I: Input + ?Sized>(
        input: &mut I,
        record: &'static str,
        field: &'static str,
    ) -> Result<Self, CodecError> {
        Ok(input.read_byte(record, field)? != 0)
    }
}

/// A length-prefixed byte run: a 16-bit count followed by that many raw
/// bytes. The maximum count is negotiated by the caller's declared
/// capacity, so this type carries no opinion about what "too large" means;
/// callers that need an exact-size check do it themselves after reading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteArray(pub Vec<u8>);

impl ByteArray {
    pub fn new(bytes: Vec<u8>) -> Self {
        ByteArray(bytes)
    }
}

impl Marshal for ByteArray {
    fn marshal<O: Output + ?Sized>(&self, out: &mut O) -> usize {
        let len = self.0.len() as u16;
        let mut written = len.marshal(out);
        out.write(&self.0);
        written += self.0.len();
        written
    }
}

impl Unmarshal for ByteArray {
    fn unmarshal<I: Input + ?Sized>(
        input: &mut I,
        record: &'static str,
        field: &'static str,
    ) -> Result<Self, CodecError> {
        let len = u16::unmarshal(input, record, field)? as usize;
        let mut buf = vec![0u8; len];
        input.read(record, field, &mut buf)?;
        Ok(ByteArray(buf))
    }
}

/// Writes a length-prefixed byte run whose length the reader is expected to
/// check against a fixed local capacity (used for `TPM2B`-style fields with
/// a known fixed size, and for `Array_Marshal`-style fixed arrays such as
/// `contextArray`/`commitArray`). The write side is identical to
/// [`ByteArray::marshal`]; only the read side enforces the exact-size
/// contract.
pub fn marshal_fixed<O: Output + ?Sized>(bytes: &[u8], out: &mut O) -> usize {
    ByteArray(bytes.to_vec()).marshal(out)
}

/// Reads a length-prefixed byte run and fails `SIZE` unless its length is
/// exactly `expected_len` (spec §7 "array cardinality or byte-length
/// differs from the reader's fixed expectation").
pub fn unmarshal_fixed<I: Input + ?Sized>(
    input: &mut I,
    record: &'static str,
    field: &'static str,
    expected_len: usize,
) -> Result<Vec<u8>, CodecError> {
    let len = u16::unmarshal(input, record, field)? as usize;
    if len != expected_len {
        return Err(CodecError::size(record, field, expected_len, len));
    }
    let mut buf = vec![0u8; len];
    input.read(record, field, &mut buf)?;
    Ok(buf)
}

/// Copies a source array into a fixed local capacity using `min(source_len,
/// local_len)` semantics: bytes beyond local capacity are discarded, bytes
/// short of local capacity leave the tail zeroed. This is the one place
/// (spec §4.3 `ppList`/`auditCommands`, §8 invariant 8) where a size
/// mismatch is tolerated rather than fatal.
pub fn min_copy(source: &[u8], local: &mut [u8]) {
    let n = source.len().min(local.len());
    local[..n].copy_from_slice(&source[..n]);
    for b in &mut local[n..] {
        *b = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{SliceInput, VecOutput};

    fn roundtrip<T: Marshal + Unmarshal + PartialEq + core::fmt::Debug>(value: T) {
        let mut out = VecOutput::new();
        let written = value.marshal(&mut out);
        assert_eq!(written, out.0.len());
        let mut input = SliceInput::new(&out.0);
        let read_back = T::unmarshal(&mut input, "test", "value").unwrap();
        assert_eq!(value, read_back);
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn primitives_roundtrip() {
        roundtrip(0u8);
        roundtrip(255u8);
        roundtrip(0x1234u16);
        roundtrip(0xdead_beefu32);
        roundtrip(0x0123_4567_89ab_cdefu64);
        roundtrip(true);
        roundtrip(false);
    }

    #[test]
    fn big_endian_byte_order() {
        let mut out = VecOutput::new();
        0xdead_beefu32.marshal(&mut out);
        assert_eq!(out.0, vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn bool_any_nonzero_byte_is_true() {
        let mut input = SliceInput::new(&[7u8]);
        assert!(bool::unmarshal(&mut input, "test", "flag").unwrap());
    }

    #[test]
    fn byte_array_roundtrip() {
        roundtrip(ByteArray::new(vec![1, 2, 3, 4, 5]));
        roundtrip(ByteArray::new(vec![]));
    }

    #[test]
    fn insufficient_on_short_buffer() {
        let mut input = SliceInput::new(&[0x00]);
        let err = u16::unmarshal(&mut input, "test", "value").unwrap_err();
        assert!(matches!(err, CodecError::Insufficient { .. }));
    }

    #[test]
    fn min_copy_truncates_and_zero_fills() {
        let mut local = [0xffu8; 4];
        min_copy(&[1, 2], &mut local);
        assert_eq!(local, [1, 2, 0, 0]);

        let mut local2 = [0xffu8; 2];
        min_copy(&[1, 2, 3, 4], &mut local2);
        assert_eq!(local2, [1, 2]);
    }

    #[quickcheck_macros::quickcheck]
    fn qc_u32_roundtrip(value: u32) -> bool {
        let mut out = VecOutput::new();
        value.marshal(&mut out);
        let mut input = SliceInput::new(&out.0);
        u32::unmarshal(&mut input, "qc", "value").unwrap() == value
    }

    #[quickcheck_macros::quickcheck]
    fn qc_byte_array_roundtrip(bytes: Vec<u8>) -> bool {
        let bytes = if bytes.len() > u16::MAX as usize {
            bytes[..u16::MAX as usize].to_vec()
        } else {
            bytes
        };
        let arr = ByteArray::new(bytes.clone());
        let mut out = VecOutput::new();
        arr.marshal(&mut out);
        let mut input = SliceInput::new(&out.0);
        ByteArray::unmarshal(&mut input, "qc", "arr").unwrap().0 == bytes
    }
}
