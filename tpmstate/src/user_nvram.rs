//! `USER_NVRAM` (spec §4.4): the dynamic NV region — persisted NV indices
//! and persistent objects — streamed by walking the backing store.

use tpmstate_records::consts::{USER_NVRAM_MAGIC, USER_NVRAM_VERSION};
use tpmstate_records::{AnyObject, NvIndex};
use tpmstate_types::{AmbientConfig, CodecError, Input, Marshal, NvHeader, Output, Unmarshal};

const RECORD: &str = "USER_NVRAM";

/// Handle most-significant byte for an NV index (TPM handle-type registry,
/// `TPM_HT_NV_INDEX`).
const HANDLE_TYPE_NV_INDEX: u8 = 0x01;
/// Handle most-significant byte for a persistent object
/// (`TPM_HT_PERSISTENT`).
const HANDLE_TYPE_PERSISTENT: u8 = 0x81;

fn handle_type(handle: u32) -> u8 {
    (handle >> 24) as u8
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NvramEntryKind {
    Index { index: NvIndex, bulk_data: Vec<u8> },
    Object(AnyObject),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NvramEntry {
    pub handle: u32,
    pub kind: NvramEntryKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserNvram {
    pub entries: Vec<NvramEntry>,
    pub max_count: u64,
}

impl UserNvram {
    pub fn marshal<O: Output + ?Sized>(&self, out: &mut O, config: &AmbientConfig) -> usize {
        let mut written = NvHeader::new(USER_NVRAM_VERSION, USER_NVRAM_MAGIC).marshal(out);
        for entry in &self.entries {
            let mut body = tpmstate_types::VecOutput::new();
            body.write(&entry.handle.to_be_bytes());
            match &entry.kind {
                NvramEntryKind::Index { index, bulk_data } => {
                    index.marshal(&mut body);
                    body.write(&(bulk_data.len() as u32).to_be_bytes());
                    body.write(bulk_data);
                }
                NvramEntryKind::Object(object) => {
                    body.write(&entry.handle.to_be_bytes());
                    object.marshal(&mut body, config);
                }
            }
            written += (body.0.len() as u32).marshal(out);
            out.write(&body.0);
            written += body.0.len();
        }
        written += 0u32.marshal(out); // terminator
        written += self.max_count.marshal(out);
        written
    }

    /// `local_capacity` bounds the dynamic NV region (spec §4.4 "advancing an
    /// offset that must not overflow the dynamic region"); `is_sequence`,
    /// `local_hash_states_len`, `local_hmac_key_len`, `max_bn_words` are
    /// forwarded to [`AnyObject::unmarshal`] for persistent-object entries.
    #[allow(clippy::too_many_arguments)]
    pub fn unmarshal<I: Input + ?Sized>(
        input: &mut I,
        config: &AmbientConfig,
        local_capacity: usize,
        is_sequence: impl Fn(tpmstate_records::ObjectAttributes) -> bool,
        local_hash_states_len: usize,
        local_hmac_key_len: usize,
        max_bn_words: usize,
    ) -> Result<Self, CodecError> {
        NvHeader::unmarshal(input, RECORD, USER_NVRAM_MAGIC, USER_NVRAM_VERSION)?;
        let mut entries = Vec::new();
        let mut used = 0usize;
        loop {
            let total_size = u32::unmarshal(input, RECORD, "entry_size")? as usize;
            if total_size == 0 {
                break;
            }
            used += total_size;
            if used > local_capacity {
                tracing::warn!(record = RECORD, used, local_capacity, "user-nvram overflow");
                return Err(CodecError::size(RECORD, "entries", local_capacity, used));
            }
            let handle = u32::unmarshal(input, RECORD, "handle")?;
            let kind = match handle_type(handle) {
                HANDLE_TYPE_NV_INDEX => {
                    let index = NvIndex::unmarshal(input)?;
                    let datasize = u32::unmarshal(input, RECORD, "datasize")? as usize;
                    let mut bulk_data = vec![0u8; datasize];
                    input.read(RECORD, "bulk_data", &mut bulk_data)?;
                    NvramEntryKind::Index { index, bulk_data }
                }
                HANDLE_TYPE_PERSISTENT => {
                    let cross_check = u32::unmarshal(input, RECORD, "handle")?;
                    if cross_check != handle {
                        return Err(CodecError::bad_parameter(
                            RECORD,
                            "handle",
                            format!("cross-check handle 0x{cross_check:08x} != 0x{handle:08x}"),
                        ));
                    }
                    let object = AnyObject::unmarshal(
                        input,
                        config,
                        &is_sequence,
                        local_hash_states_len,
                        local_hmac_key_len,
                        max_bn_words,
                    )?;
                    NvramEntryKind::Object(object)
                }
                _ => return Err(CodecError::handle(RECORD, handle)),
            };
            entries.push(NvramEntry { handle, kind });
        }
        let max_count = u64::unmarshal(input, RECORD, "max_count")?;
        Ok(UserNvram { entries, max_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpmstate_records::ObjectAttributes;
    use tpmstate_types::{SliceInput, VecOutput};

    #[test]
    fn roundtrip_index_entry() {
        let nvram = UserNvram {
            entries: vec![NvramEntry {
                handle: 0x0100_0000,
                kind: NvramEntryKind::Index {
                    index: NvIndex { public_area: vec![0u8; 4], auth_value: vec![0xaa, 0xbb, 0xcc] },
                    bulk_data: vec![0x11; 16],
                },
            }],
            max_count: 7,
        };
        let config = AmbientConfig::default();
        let mut out = VecOutput::new();
        nvram.marshal(&mut out, &config);
        let mut input = SliceInput::new(&out.0);
        let read_back =
            UserNvram::unmarshal(&mut input, &config, 4096, |_: ObjectAttributes| false, 0, 0, 64).unwrap();
        assert_eq!(read_back, nvram);
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn empty_roundtrip() {
        let nvram = UserNvram { entries: Vec::new(), max_count: 0 };
        let config = AmbientConfig::default();
        let mut out = VecOutput::new();
        nvram.marshal(&mut out, &config);
        let mut input = SliceInput::new(&out.0);
        let read_back =
            UserNvram::unmarshal(&mut input, &config, 4096, |_: ObjectAttributes| false, 0, 0, 64).unwrap();
        assert_eq!(read_back, nvram);
    }

    /// Testable Property 7 (spec §8): a source size exceeding the local
    /// dynamic-region capacity returns `SIZE`.
    #[test]
    fn overflow_is_size_error() {
        let nvram = UserNvram {
            entries: vec![NvramEntry {
                handle: 0x0100_0000,
                kind: NvramEntryKind::Index {
                    index: NvIndex { public_area: vec![0u8; 4], auth_value: vec![0xaa, 0xbb, 0xcc] },
                    bulk_data: vec![0x11; 16],
                },
            }],
            max_count: 0,
        };
        let config = AmbientConfig::default();
        let mut out = VecOutput::new();
        nvram.marshal(&mut out, &config);
        let mut input = SliceInput::new(&out.0);
        let err = UserNvram::unmarshal(&mut input, &config, 4, |_: ObjectAttributes| false, 0, 0, 64).unwrap_err();
        assert!(matches!(err, CodecError::Size { .. }));
    }

    #[test]
    fn unknown_handle_type_is_handle_error() {
        let mut out = VecOutput::new();
        NvHeader::new(USER_NVRAM_VERSION, USER_NVRAM_MAGIC).marshal(&mut out);
        let mut body = VecOutput::new();
        body.write(&0x4000_0000u32.to_be_bytes());
        (body.0.len() as u32).marshal(&mut out);
        out.write(&body.0);
        0u32.marshal(&mut out);
        0u64.marshal(&mut out);

        let config = AmbientConfig::default();
        let mut input = SliceInput::new(&out.0);
        let err = UserNvram::unmarshal(&mut input, &config, 4096, |_: ObjectAttributes| false, 0, 0, 64).unwrap_err();
        assert!(matches!(err, CodecError::Handle { .. }));
    }
}
