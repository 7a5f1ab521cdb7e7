//! Hash-engine state records (spec §3, §4.3 "hash states", "any-hash-state
//! wrapper", "HMAC state"): the opaque SHA context a running hash or HMAC
//! sequence object carries between TPM2_SequenceUpdate calls.
//!
//! Each per-algorithm state is its own framed record (mirroring the
//! original's `tpmHashStateSHA1_t`/`tpmHashStateSHA256_t`/`SHA512_CTX`
//! wrappers); `AnyHashState` wraps whichever one applies, dispatching on an
//! algorithm id supplied by the caller rather than stored inline — the id
//! lives one level up, in `HashState`.

use tpmstate_types::{CodecError, Input, Marshal, NvHeader, Output, Unmarshal};

use crate::consts::{
    ANY_HASH_STATE_MAGIC, ANY_HASH_STATE_VERSION, HASH_STATE_MAGIC, HASH_STATE_SHA1_MAGIC,
    HASH_STATE_SHA1_VERSION, HASH_STATE_SHA256_MAGIC, HASH_STATE_SHA256_VERSION, HASH_STATE_SHA512_MAGIC,
    HASH_STATE_SHA512_VERSION, HASH_STATE_VERSION, TPM_ALG_SHA1, TPM_ALG_SHA256, TPM_ALG_SHA384, TPM_ALG_SHA512,
};

/// A 32-bit-word SHA context (SHA-1, SHA-256): five or eight running hash
/// words, the bit-length counters, a pending-block buffer, and the two
/// bookkeeping counters OpenSSL's `SHA_CTX` carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaWordState {
    pub h: Vec<u32>,
    pub nl: u32,
    pub nh: u32,
    pub data: Vec<u8>,
    pub num: u32,
    pub md_len: u32,
}

impl ShaWordState {
    fn marshal<O: Output + ?Sized>(&self, out: &mut O, magic: u32, version: u16) -> usize {
        let mut written = NvHeader::new(version, magic).marshal(out);
        written += (self.h.len() as u16).marshal(out);
        for word in &self.h {
            written += word.marshal(out);
        }
        written += self.nl.marshal(out);
        written += self.nh.marshal(out);
        written += (self.data.len() as u16).marshal(out);
        out.write(&self.data);
        written += self.data.len();
        written += self.num.marshal(out);
        written += self.md_len.marshal(out);
        written
    }

    fn unmarshal<I: Input + ?Sized>(
        input: &mut I,
        record: &'static str,
        magic: u32,
        version: u16,
        local_h_len: usize,
        local_data_len: usize,
    ) -> Result<Self, CodecError> {
        NvHeader::unmarshal(input, record, magic, version)?;
        let h_len = u16::unmarshal(input, record, "h")? as usize;
        if h_len != local_h_len {
            return Err(CodecError::size(record, "h", local_h_len, h_len));
        }
        let mut h = Vec::with_capacity(h_len);
        for _ in 0..h_len {
            h.push(u32::unmarshal(input, record, "h")?);
        }
        let nl = u32::unmarshal(input, record, "nl")?;
        let nh = u32::unmarshal(input, record, "nh")?;

        let data_len = u16::unmarshal(input, record, "data")? as usize;
        if data_len != local_data_len {
            return Err(CodecError::size(record, "data", local_data_len, data_len));
        }
        let mut data = vec![0u8; data_len];
        input.read(record, "data", &mut data)?;

        let num = u32::unmarshal(input, record, "num")?;
        let md_len = u32::unmarshal(input, record, "md_len")?;
        Ok(ShaWordState { h, nl, nh, data, num, md_len })
    }
}

/// A 64-bit-word SHA context (SHA-384, SHA-512, sharing `SHA512_CTX`'s
/// layout in the original — SHA-384 truncates the digest but reuses the
/// same running state shape).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaLongState {
    pub h: Vec<u64>,
    pub nl: u64,
    pub nh: u64,
    pub padding: Vec<u8>,
    pub num: u32,
    pub md_len: u32,
}

impl ShaLongState {
    fn marshal<O: Output + ?Sized>(&self, out: &mut O) -> usize {
        let mut written = NvHeader::new(HASH_STATE_SHA512_VERSION, HASH_STATE_SHA512_MAGIC).marshal(out);
        written += (self.h.len() as u16).marshal(out);
        for word in &self.h {
            written += word.marshal(out);
        }
        written += self.nl.marshal(out);
        written += self.nh.marshal(out);
        written += (self.padding.len() as u16).marshal(out);
        out.write(&self.padding);
        written += self.padding.len();
        written += self.num.marshal(out);
        written += self.md_len.marshal(out);
        written
    }

    fn unmarshal<I: Input + ?Sized>(
        input: &mut I,
        record: &'static str,
        local_h_len: usize,
        local_padding_len: usize,
    ) -> Result<Self, CodecError> {
        NvHeader::unmarshal(input, record, HASH_STATE_SHA512_MAGIC, HASH_STATE_SHA512_VERSION)?;
        let h_len = u16::unmarshal(input, record, "h")? as usize;
        if h_len != local_h_len {
            return Err(CodecError::size(record, "h", local_h_len, h_len));
        }
        let mut h = Vec::with_capacity(h_len);
        for _ in 0..h_len {
            h.push(u64::unmarshal(input, record, "h")?);
        }
        let nl = u64::unmarshal(input, record, "nl")?;
        let nh = u64::unmarshal(input, record, "nh")?;

        let padding_len = u16::unmarshal(input, record, "padding")? as usize;
        if padding_len != local_padding_len {
            return Err(CodecError::size(record, "padding", local_padding_len, padding_len));
        }
        let mut padding = vec![0u8; padding_len];
        input.read(record, "padding", &mut padding)?;

        let num = u32::unmarshal(input, record, "num")?;
        let md_len = u32::unmarshal(input, record, "md_len")?;
        Ok(ShaLongState { h, nl, nh, padding, num, md_len })
    }
}

const ANY_HASH_STATE_RECORD: &str = "ANY_HASH_STATE";

/// Whichever per-algorithm context applies, dispatched by the `hashAlg`
/// passed down from the enclosing [`HashState`] rather than stored here
/// (spec §4.3 "any-hash-state wrapper").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnyHashState {
    Sha1(ShaWordState),
    Sha256(ShaWordState),
    Sha384(ShaLongState),
    Sha512(ShaLongState),
}

impl AnyHashState {
    pub fn marshal<O: Output + ?Sized>(&self, out: &mut O) -> usize {
        let mut written = NvHeader::new(ANY_HASH_STATE_VERSION, ANY_HASH_STATE_MAGIC).marshal(out);
        written += match self {
            AnyHashState::Sha1(s) => s.marshal(out, HASH_STATE_SHA1_MAGIC, HASH_STATE_SHA1_VERSION),
            AnyHashState::Sha256(s) => s.marshal(out, HASH_STATE_SHA256_MAGIC, HASH_STATE_SHA256_VERSION),
            AnyHashState::Sha384(s) | AnyHashState::Sha512(s) => s.marshal(out),
        };
        written
    }

    pub fn unmarshal<I: Input + ?Sized>(input: &mut I, hash_alg: u16) -> Result<Self, CodecError> {
        NvHeader::unmarshal(input, ANY_HASH_STATE_RECORD, ANY_HASH_STATE_MAGIC, ANY_HASH_STATE_VERSION)?;
        match hash_alg {
            TPM_ALG_SHA1 => Ok(AnyHashState::Sha1(ShaWordState::unmarshal(
                input,
                "HASH_STATE_SHA1",
                HASH_STATE_SHA1_MAGIC,
                HASH_STATE_SHA1_VERSION,
                5,
                64,
            )?)),
            TPM_ALG_SHA256 => Ok(AnyHashState::Sha256(ShaWordState::unmarshal(
                input,
                "HASH_STATE_SHA256",
                HASH_STATE_SHA256_MAGIC,
                HASH_STATE_SHA256_VERSION,
                8,
                64,
            )?)),
            TPM_ALG_SHA384 => Ok(AnyHashState::Sha384(ShaLongState::unmarshal(
                input,
                "HASH_STATE_SHA384",
                8,
                128,
            )?)),
            TPM_ALG_SHA512 => Ok(AnyHashState::Sha512(ShaLongState::unmarshal(
                input,
                "HASH_STATE_SHA512",
                8,
                128,
            )?)),
            other => Err(CodecError::bad_parameter(
                ANY_HASH_STATE_RECORD,
                "hash_alg",
                format!("unsupported hash algorithm id 0x{other:04x}"),
            )),
        }
    }
}

const HASH_STATE_RECORD: &str = "HASH_STATE";

/// `HASH_STATE_TYPE` values (spec §3 hash-state entry): whether this is a
/// live sequence context or the empty/initial state.
pub const HASH_STATE_TYPE_EMPTY: u16 = 0;
pub const HASH_STATE_TYPE_COPY: u16 = 1;

/// A framed hash-sequence element: the state-type discriminant, the
/// algorithm id, and the per-algorithm context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashState {
    pub state_type: u16,
    pub hash_alg: u16,
    pub state: AnyHashState,
}

impl HashState {
    pub fn marshal<O: Output + ?Sized>(&self, out: &mut O) -> usize {
        let mut written = NvHeader::new(HASH_STATE_VERSION, HASH_STATE_MAGIC).marshal(out);
        written += self.state_type.marshal(out);
        written += self.hash_alg.marshal(out);
        written += self.state.marshal(out);
        written
    }

    pub fn unmarshal<I: Input + ?Sized>(input: &mut I) -> Result<Self, CodecError> {
        NvHeader::unmarshal(input, HASH_STATE_RECORD, HASH_STATE_MAGIC, HASH_STATE_VERSION)?;
        let state_type = u16::unmarshal(input, HASH_STATE_RECORD, "state_type")?;
        let hash_alg = u16::unmarshal(input, HASH_STATE_RECORD, "hash_alg")?;
        let state = AnyHashState::unmarshal(input, hash_alg)?;
        Ok(HashState { state_type, hash_alg, state })
    }
}

/// An HMAC sequence's state: a [`HashState`] plus the hash-block-sized key
/// blob. Unlike every other composite record in this catalog, `HMAC_STATE`
/// carries no frame of its own in the original — it's a plain concatenation
/// of its two parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HmacState {
    pub hash_state: HashState,
    pub hmac_key: Vec<u8>,
}

impl HmacState {
    pub fn marshal<O: Output + ?Sized>(&self, out: &mut O) -> usize {
        let mut written = self.hash_state.marshal(out);
        written += (self.hmac_key.len() as u16).marshal(out);
        out.write(&self.hmac_key);
        written += self.hmac_key.len();
        written
    }

    pub fn unmarshal<I: Input + ?Sized>(input: &mut I, local_hmac_key_len: usize) -> Result<Self, CodecError> {
        let hash_state = HashState::unmarshal(input)?;
        let len = u16::unmarshal(input, "HMAC_STATE", "hmac_key")? as usize;
        if len != local_hmac_key_len {
            return Err(CodecError::size("HMAC_STATE", "hmac_key", local_hmac_key_len, len));
        }
        let mut hmac_key = vec![0u8; len];
        input.read("HMAC_STATE", "hmac_key", &mut hmac_key)?;
        Ok(HmacState { hash_state, hmac_key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpmstate_types::{SliceInput, VecOutput};

    fn sha256_state() -> ShaWordState {
        ShaWordState { h: vec![1, 2, 3, 4, 5, 6, 7, 8], nl: 9, nh: 10, data: vec![0u8; 64], num: 0, md_len: 32 }
    }

    #[test]
    fn any_hash_state_sha256_roundtrip() {
        let state = AnyHashState::Sha256(sha256_state());
        let mut out = VecOutput::new();
        state.marshal(&mut out);
        let mut input = SliceInput::new(&out.0);
        let read_back = AnyHashState::unmarshal(&mut input, TPM_ALG_SHA256).unwrap();
        assert_eq!(read_back, state);
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn any_hash_state_unknown_alg_is_bad_parameter() {
        let state = AnyHashState::Sha256(sha256_state());
        let mut out = VecOutput::new();
        state.marshal(&mut out);
        let mut input = SliceInput::new(&out.0);
        let err = AnyHashState::unmarshal(&mut input, 0x9999).unwrap_err();
        assert!(matches!(err, CodecError::BadParameter { .. }));
    }

    #[test]
    fn hash_state_roundtrip() {
        let state = HashState { state_type: HASH_STATE_TYPE_COPY, hash_alg: TPM_ALG_SHA256, state: AnyHashState::Sha256(sha256_state()) };
        let mut out = VecOutput::new();
        state.marshal(&mut out);
        let mut input = SliceInput::new(&out.0);
        assert_eq!(HashState::unmarshal(&mut input).unwrap(), state);
    }

    #[test]
    fn hmac_state_roundtrip_has_no_own_frame() {
        let hash_state = HashState { state_type: HASH_STATE_TYPE_COPY, hash_alg: TPM_ALG_SHA256, state: AnyHashState::Sha256(sha256_state()) };
        let hmac = HmacState { hash_state, hmac_key: vec![0xaa; 64] };
        let mut out = VecOutput::new();
        hmac.marshal(&mut out);
        let mut input = SliceInput::new(&out.0);
        let read_back = HmacState::unmarshal(&mut input, 64).unwrap();
        assert_eq!(read_back, hmac);
        assert_eq!(input.remaining(), 0);
    }
}
