//! Algorithm-tagged union streams (spec §4.1/§6): a sequence of
//! `(alg_id, payload)` pairs terminated by the sentinel `alg_id =
//! TPM_ALG_NULL`. Used by PCR save / PCR bank records in `tpmstate-records`.

use crate::error::CodecError;
use crate::io::{Input, Output};
use crate::primitive::{Marshal, Unmarshal};

/// The sentinel algorithm id that terminates a tagged stream.
pub const TPM_ALG_NULL: u16 = 0x0010;

/// Writes a sentinel-terminated sequence of `(alg_id, len, bytes)` triples.
pub fn marshal_tagged_stream<O: Output + ?Sized>(items: &[(u16, Vec<u8>)], out: &mut O) -> usize {
    let mut written = 0;
    for (alg, payload) in items {
        written += alg.marshal(out);
        written += (payload.len() as u16).marshal(out);
        out.write(payload);
        written += payload.len();
    }
    written += TPM_ALG_NULL.marshal(out);
    written
}

/// Reads a sentinel-terminated sequence of `(alg_id, len, bytes)` triples.
/// Stops as soon as `TPM_ALG_NULL` is seen; a tag this reader's build does
/// not recognize is still collected verbatim — the catalog note in spec
/// §4.3 is that forward compatibility across algorithm *sets* is handled by
/// the enclosing skip block, not by silently discarding unknown tags here.
pub fn unmarshal_tagged_stream<I: Input + ?Sized>(
    input: &mut I,
    record: &'static str,
    field: &'static str,
) -> Result<Vec<(u16, Vec<u8>)>, CodecError> {
    let mut items = Vec::new();
    loop {
        let alg = u16::unmarshal(input, record, field)?;
        if alg == TPM_ALG_NULL {
            break;
        }
        let len = u16::unmarshal(input, record, field)? as usize;
        let mut buf = vec![0u8; len];
        input.read(record, field, &mut buf)?;
        items.push((alg, buf));
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{SliceInput, VecOutput};

    #[test]
    fn empty_stream_is_just_the_sentinel() {
        let mut out = VecOutput::new();
        let written = marshal_tagged_stream(&[], &mut out);
        assert_eq!(written, 2);
        assert_eq!(out.0, TPM_ALG_NULL.to_be_bytes());
    }

    #[test]
    fn roundtrip_multiple_banks() {
        let items = vec![(0x0004u16, vec![1u8; 20]), (0x000bu16, vec![2u8; 32])];
        let mut out = VecOutput::new();
        marshal_tagged_stream(&items, &mut out);

        let mut input = SliceInput::new(&out.0);
        let read_back = unmarshal_tagged_stream(&mut input, "test", "banks").unwrap();
        assert_eq!(read_back, items);
        assert_eq!(input.remaining(), 0);
    }
}
