//! NV-index record (spec §3, §4.3 "NV-index"): the public area and auth
//! value of one non-volatile index, as written into `USER_NVRAM` entries.

use tpmstate_types::{ByteArray, CodecError, Input, Marshal, NvHeader, Output, Unmarshal};

use crate::consts::{NV_INDEX_MAGIC, NV_INDEX_VERSION};

const RECORD: &str = "NV_INDEX";

/// `TPMS_NV_PUBLIC`, treated as an opaque blob (spec §1: the NV-index
/// public-area layout itself is owned by the wider TPM command-processing
/// code, not the state codec).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NvIndex {
    pub public_area: Vec<u8>,
    pub auth_value: Vec<u8>,
}

impl NvIndex {
    pub fn marshal<O: Output + ?Sized>(&self, out: &mut O) -> usize {
        let mut written = NvHeader::new(NV_INDEX_VERSION, NV_INDEX_MAGIC).marshal(out);
        written += ByteArray::new(self.public_area.clone()).marshal(out);
        written += ByteArray::new(self.auth_value.clone()).marshal(out);
        written
    }

    pub fn unmarshal<I: Input + ?Sized>(input: &mut I) -> Result<Self, CodecError> {
        NvHeader::unmarshal(input, RECORD, NV_INDEX_MAGIC, NV_INDEX_VERSION)?;
        let public_area = ByteArray::unmarshal(input, RECORD, "public_area")?.0;
        let auth_value = ByteArray::unmarshal(input, RECORD, "auth_value")?.0;
        Ok(NvIndex { public_area, auth_value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpmstate_types::{SliceInput, VecOutput};

    /// Scenario A (spec §8): handle `0x01000000`, a three-byte auth value,
    /// first six wire bytes `00 01 25 47 26 5a`.
    #[test]
    fn scenario_a_nv_index_roundtrip() {
        let index = NvIndex { public_area: vec![0u8; 4], auth_value: vec![0xaa, 0xbb, 0xcc] };
        let mut out = VecOutput::new();
        index.marshal(&mut out);
        assert_eq!(&out.0[..6], &[0x00, 0x01, 0x25, 0x47, 0x26, 0x5a]);

        let mut input = SliceInput::new(&out.0);
        let read_back = NvIndex::unmarshal(&mut input).unwrap();
        assert_eq!(read_back, index);
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn bad_tag_on_magic_mismatch() {
        let mut out = VecOutput::new();
        NvHeader::new(NV_INDEX_VERSION, 0xdead_beef).marshal(&mut out);
        let mut input = SliceInput::new(&out.0);
        let err = NvIndex::unmarshal(&mut input).unwrap_err();
        assert!(matches!(err, CodecError::BadTag { .. }));
    }
}
