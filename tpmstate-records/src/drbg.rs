//! DRBG state (spec §4.3 "DRBG state"): reseed counter, seed bytes, and the
//! last-value ring used by the deterministic random bit generator.

use tpmstate_types::{CodecError, Input, Marshal, NvHeader, Output, Unmarshal};

use crate::consts::{DRBG_STATE_MAGIC, DRBG_STATE_VERSION};

const RECORD: &str = "DRBG_STATE";

/// Mirrors `DRBG_STATE` in the original: a reseed counter, a fixed-size
/// 440-bit seed, and a ring of `u32` "last value" words used for continuous
/// self-test. Array sizes must match the reader's build exactly (spec §3
/// "DRBG state").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrbgState {
    pub reseed_counter: u64,
    pub seed: Vec<u8>,
    pub last_value: Vec<u32>,
}

impl DrbgState {
    pub fn marshal<O: Output + ?Sized>(&self, out: &mut O) -> usize {
        let mut written = NvHeader::new(DRBG_STATE_VERSION, DRBG_STATE_MAGIC).marshal(out);
        written += self.reseed_counter.marshal(out);
        written += (self.seed.len() as u16).marshal(out);
        out.write(&self.seed);
        written += self.seed.len();
        written += (self.last_value.len() as u16).marshal(out);
        for word in &self.last_value {
            written += word.marshal(out);
        }
        written
    }

    pub fn unmarshal<I: Input + ?Sized>(
        input: &mut I,
        local_seed_len: usize,
        local_last_value_len: usize,
    ) -> Result<Self, CodecError> {
        NvHeader::unmarshal(input, RECORD, DRBG_STATE_MAGIC, DRBG_STATE_VERSION)?;
        let reseed_counter = u64::unmarshal(input, RECORD, "reseed_counter")?;

        let seed_len = u16::unmarshal(input, RECORD, "seed")? as usize;
        if seed_len != local_seed_len {
            return Err(CodecError::size(RECORD, "seed", local_seed_len, seed_len));
        }
        let mut seed = vec![0u8; seed_len];
        input.read(RECORD, "seed", &mut seed)?;

        let last_value_len = u16::unmarshal(input, RECORD, "last_value")? as usize;
        if last_value_len != local_last_value_len {
            return Err(CodecError::size(RECORD, "last_value", local_last_value_len, last_value_len));
        }
        let mut last_value = Vec::with_capacity(last_value_len);
        for _ in 0..last_value_len {
            last_value.push(u32::unmarshal(input, RECORD, "last_value")?);
        }

        Ok(DrbgState { reseed_counter, seed, last_value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpmstate_types::{SliceInput, VecOutput};

    fn sample() -> DrbgState {
        DrbgState { reseed_counter: 7, seed: vec![0xab; 55], last_value: vec![1, 2, 3, 4] }
    }

    #[test]
    fn roundtrip() {
        let state = sample();
        let mut out = VecOutput::new();
        state.marshal(&mut out);
        let mut input = SliceInput::new(&out.0);
        let read_back = DrbgState::unmarshal(&mut input, 55, 4).unwrap();
        assert_eq!(read_back, state);
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn size_mismatch_on_seed_is_fatal() {
        let state = sample();
        let mut out = VecOutput::new();
        state.marshal(&mut out);
        let mut input = SliceInput::new(&out.0);
        let err = DrbgState::unmarshal(&mut input, 999, 4).unwrap_err();
        assert!(matches!(err, CodecError::Size { .. }));
    }
}
