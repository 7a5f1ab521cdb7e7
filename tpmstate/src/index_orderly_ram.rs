//! `INDEX_ORDERLY_RAM` (spec §4.4): the shadow copy of orderly-backed NV
//! indices kept entirely in RAM, streamed as a linked-list-style region.

use tpmstate_records::consts::{INDEX_ORDERLY_RAM_MAGIC, INDEX_ORDERLY_RAM_VERSION};
use tpmstate_types::{CodecError, Input, Marshal, NvHeader, Output, Unmarshal};

const RECORD: &str = "INDEX_ORDERLY_RAM";

/// One shadow entry: a handle, its attributes word, and its bulk data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOrderlyEntry {
    pub handle: u32,
    pub attributes: u32,
    pub data: Vec<u8>,
}

impl IndexOrderlyEntry {
    /// Bytes this entry occupies after its own size field: handle +
    /// attributes + the 16-bit datasize prefix + the data itself (spec
    /// §4.4 "back-fills each entry's `size` field to the
    /// target-architecture-correct layout (header + datasize)").
    fn payload_len(&self) -> usize {
        4 + 4 + 2 + self.data.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexOrderlyRam {
    pub entries: Vec<IndexOrderlyEntry>,
}

impl IndexOrderlyRam {
    pub fn marshal<O: Output + ?Sized>(&self, out: &mut O) -> usize {
        let mut written = NvHeader::new(INDEX_ORDERLY_RAM_VERSION, INDEX_ORDERLY_RAM_MAGIC).marshal(out);
        let source_byte_size: u32 = self.entries.iter().map(|e| (4 + e.payload_len()) as u32).sum();
        written += source_byte_size.marshal(out);
        for entry in &self.entries {
            written += (entry.payload_len() as u32).marshal(out);
            written += entry.handle.marshal(out);
            written += entry.attributes.marshal(out);
            written += (entry.data.len() as u16).marshal(out);
            out.write(&entry.data);
            written += entry.data.len();
        }
        written += 0u32.marshal(out); // terminator
        written
    }

    /// `local_capacity` bounds the total reconstructed region size (spec §4.4
    /// "must bail with `SIZE` if any entry would overflow the local
    /// capacity").
    pub fn unmarshal<I: Input + ?Sized>(input: &mut I, local_capacity: usize) -> Result<Self, CodecError> {
        NvHeader::unmarshal(input, RECORD, INDEX_ORDERLY_RAM_MAGIC, INDEX_ORDERLY_RAM_VERSION)?;
        let _source_byte_size = u32::unmarshal(input, RECORD, "source_byte_size")?;

        let mut entries = Vec::new();
        let mut used = 0usize;
        loop {
            let size = u32::unmarshal(input, RECORD, "entry_size")? as usize;
            if size == 0 {
                break;
            }
            if used + size > local_capacity {
                tracing::warn!(record = RECORD, used, size, local_capacity, "index-orderly-ram overflow");
                return Err(CodecError::size(RECORD, "entries", local_capacity, used + size));
            }
            let handle = u32::unmarshal(input, RECORD, "handle")?;
            let attributes = u32::unmarshal(input, RECORD, "attributes")?;
            let datasize = u16::unmarshal(input, RECORD, "datasize")? as usize;
            let mut data = vec![0u8; datasize];
            input.read(RECORD, "data", &mut data)?;
            used += size;
            entries.push(IndexOrderlyEntry { handle, attributes, data });
        }
        Ok(IndexOrderlyRam { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpmstate_types::{SliceInput, VecOutput};

    fn sample() -> IndexOrderlyRam {
        IndexOrderlyRam {
            entries: vec![
                IndexOrderlyEntry { handle: 0x0100_0000, attributes: 1, data: vec![0xaa; 8] },
                IndexOrderlyEntry { handle: 0x0100_0001, attributes: 2, data: vec![0xbb; 4] },
            ],
        }
    }

    #[test]
    fn roundtrip() {
        let region = sample();
        let mut out = VecOutput::new();
        region.marshal(&mut out);
        let mut input = SliceInput::new(&out.0);
        let read_back = IndexOrderlyRam::unmarshal(&mut input, 1024).unwrap();
        assert_eq!(read_back, region);
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn empty_region_roundtrip() {
        let region = IndexOrderlyRam::default();
        let mut out = VecOutput::new();
        region.marshal(&mut out);
        let mut input = SliceInput::new(&out.0);
        let read_back = IndexOrderlyRam::unmarshal(&mut input, 1024).unwrap();
        assert_eq!(read_back, region);
    }

    #[test]
    fn overflow_is_size_error() {
        let region = sample();
        let mut out = VecOutput::new();
        region.marshal(&mut out);
        let mut input = SliceInput::new(&out.0);
        let err = IndexOrderlyRam::unmarshal(&mut input, 4).unwrap_err();
        assert!(matches!(err, CodecError::Size { .. }));
    }
}
