//! State-reset data (spec §3, §4.3): the subset of state that survives a
//! TPM2_Startup(CLEAR) but is reset on TPM Reset, plus an
//! ECC-commit-gated skip block.

use tpmstate_types::{
    marshal_fixed, skip_begin, skip_end, unmarshal_fixed, AmbientConfig, ByteArray, CodecError,
    Input, Marshal, NvHeader, Output, SkipDecision, SkipWriter, Unmarshal,
};

use crate::consts::{PRIMARY_SEED_SIZE, PROOF_SIZE, STATE_RESET_DATA_MAGIC, STATE_RESET_DATA_VERSION};

const RECORD: &str = "STATE_RESET_DATA";

/// The ECC-commit counter triplet, carried only when `TPM_ALG_ECC` is
/// configured in (spec §4.3 "optional ECC skip block").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EccCommit {
    pub commit_counter: u64,
    pub commit_nonce: Vec<u8>,
    pub commit_array: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateResetData {
    pub null_proof: Vec<u8>,
    pub null_seed: Vec<u8>,
    pub clear_count: u32,
    pub object_context_id: u64,
    pub context_array: Vec<u8>,
    pub context_counter: u64,
    pub command_audit_digest: Vec<u8>,
    pub restart_count: u32,
    pub pcr_counter: u32,
    pub ecc_commit: Option<EccCommit>,
}

impl StateResetData {
    pub fn marshal<O: Output + ?Sized>(&self, out: &mut O, config: &AmbientConfig, commit_array_len: usize) -> usize {
        let mut written = NvHeader::new(STATE_RESET_DATA_VERSION, STATE_RESET_DATA_MAGIC).marshal(out);
        written += marshal_fixed(&self.null_proof, out);
        written += marshal_fixed(&self.null_seed, out);
        written += self.clear_count.marshal(out);
        written += self.object_context_id.marshal(out);
        written += marshal_fixed(&self.context_array, out);
        written += self.context_counter.marshal(out);
        written += ByteArray::new(self.command_audit_digest.clone()).marshal(out);
        written += self.restart_count.marshal(out);
        written += self.pcr_counter.marshal(out);

        let mut skip = SkipWriter::new();
        written += skip.push(out, config.ecc);
        if config.ecc {
            let commit = self.ecc_commit.as_ref().expect("ecc configured without commit state");
            written += commit.commit_counter.marshal(out);
            written += ByteArray::new(commit.commit_nonce.clone()).marshal(out);
            written += marshal_fixed(&commit.commit_array, out);
            let _ = commit_array_len;
        }
        skip.pop(out);
        skip.finish();
        written
    }

    pub fn unmarshal<I: Input + ?Sized>(
        input: &mut I,
        config: &AmbientConfig,
        context_array_len: usize,
        commit_array_len: usize,
    ) -> Result<Self, CodecError> {
        NvHeader::unmarshal(input, RECORD, STATE_RESET_DATA_MAGIC, STATE_RESET_DATA_VERSION)?;
        let null_proof = unmarshal_fixed(input, RECORD, "null_proof", PROOF_SIZE)?;
        let null_seed = unmarshal_fixed(input, RECORD, "null_seed", PRIMARY_SEED_SIZE)?;
        let clear_count = u32::unmarshal(input, RECORD, "clear_count")?;
        let object_context_id = u64::unmarshal(input, RECORD, "object_context_id")?;
        let context_array = unmarshal_fixed(input, RECORD, "context_array", context_array_len)?;
        let context_counter = u64::unmarshal(input, RECORD, "context_counter")?;
        let command_audit_digest = ByteArray::unmarshal(input, RECORD, "command_audit_digest")?.0;
        let restart_count = u32::unmarshal(input, RECORD, "restart_count")?;
        let pcr_counter = u32::unmarshal(input, RECORD, "pcr_counter")?;

        let decision = skip_begin(input, config.ecc, RECORD, "ecc_commit")?;
        let remaining_before = input.remaining();
        let ecc_commit = if let SkipDecision::Present { .. } = decision {
            let commit_counter = u64::unmarshal(input, RECORD, "commit_counter")?;
            let commit_nonce = ByteArray::unmarshal(input, RECORD, "commit_nonce")?.0;
            let commit_array = unmarshal_fixed(input, RECORD, "commit_array", commit_array_len)?;
            Some(EccCommit { commit_counter, commit_nonce, commit_array })
        } else {
            None
        };
        skip_end(decision, remaining_before, input.remaining(), RECORD, "ecc_commit")?;

        Ok(StateResetData {
            null_proof,
            null_seed,
            clear_count,
            object_context_id,
            context_array,
            context_counter,
            command_audit_digest,
            restart_count,
            pcr_counter,
            ecc_commit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpmstate_types::{SliceInput, VecOutput};

    fn sample(ecc_commit: Option<EccCommit>) -> StateResetData {
        StateResetData {
            null_proof: vec![0x11; PROOF_SIZE],
            null_seed: vec![0x22; PRIMARY_SEED_SIZE],
            clear_count: 3,
            object_context_id: 4,
            context_array: vec![0x33; 16],
            context_counter: 5,
            command_audit_digest: vec![0x44; 32],
            restart_count: 6,
            pcr_counter: 7,
            ecc_commit,
        }
    }

    #[test]
    fn roundtrip_without_ecc() {
        let mut config = AmbientConfig::default();
        config.ecc = false;
        let data = sample(None);
        let mut out = VecOutput::new();
        data.marshal(&mut out, &config, 0);
        let mut input = SliceInput::new(&out.0);
        let read_back = StateResetData::unmarshal(&mut input, &config, 16, 0).unwrap();
        assert_eq!(read_back, data);
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn roundtrip_with_ecc() {
        let mut config = AmbientConfig::default();
        config.ecc = true;
        let data = sample(Some(EccCommit {
            commit_counter: 99,
            commit_nonce: vec![0x55; 32],
            commit_array: vec![0x66; 8],
        }));
        let mut out = VecOutput::new();
        data.marshal(&mut out, &config, 8);
        let mut input = SliceInput::new(&out.0);
        let read_back = StateResetData::unmarshal(&mut input, &config, 16, 8).unwrap();
        assert_eq!(read_back, data);
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn context_array_size_mismatch_is_fatal() {
        let config = AmbientConfig::default();
        let data = sample(Some(EccCommit { commit_counter: 1, commit_nonce: vec![], commit_array: vec![0; 8] }));
        let mut out = VecOutput::new();
        data.marshal(&mut out, &config, 8);
        let mut input = SliceInput::new(&out.0);
        let err = StateResetData::unmarshal(&mut input, &config, 999, 8).unwrap_err();
        assert!(matches!(err, CodecError::Size { .. }));
    }

    /// A reader with `ecc` disabled still accepts a blob written with it
    /// enabled, skipping the commit-counter/nonce/array region transparently.
    #[test]
    fn ecc_skip_block_forward_compat() {
        let mut writer_config = AmbientConfig::default();
        writer_config.ecc = true;
        let data = sample(Some(EccCommit {
            commit_counter: 1,
            commit_nonce: vec![0xaa; 16],
            commit_array: vec![0xbb; 4],
        }));
        let mut out = VecOutput::new();
        data.marshal(&mut out, &writer_config, 4);

        let mut reader_config = AmbientConfig::default();
        reader_config.ecc = false;
        let mut input = SliceInput::new(&out.0);
        let read_back = StateResetData::unmarshal(&mut input, &reader_config, 16, 4).unwrap();
        assert_eq!(read_back.ecc_commit, None);
        assert_eq!(input.remaining(), 0);
    }
}
