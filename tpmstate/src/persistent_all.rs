//! `PERSISTENT_ALL` (spec §4.4): the on-disk NVRAM blob, composing the
//! compile-constants manifest with persistent data, orderly data, the two
//! reset/clear records, and the two RAM-region shadows, in the order
//! `SPEC_FULL.md` §4.3's PERSISTENT_ALL supplement fixes.

use tpmstate_records::consts::PERSISTENT_ALL_MAGIC;
use tpmstate_records::{OrderlyData, PersistentData, StateClearData, StateResetData};
use tpmstate_types::{marshal_trailing_magic, unmarshal_trailing_magic, AmbientConfig, CodecError, Input, Marshal, NvHeader, Output, Unmarshal};

use crate::compile_constants;
use crate::index_orderly_ram::IndexOrderlyRam;
use crate::user_nvram::UserNvram;

const RECORD: &str = "PERSISTENT_ALL";
const PERSISTENT_ALL_VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistentAll {
    pub persistent_data: PersistentData,
    pub orderly_data: OrderlyData,
    pub state_reset_data: StateResetData,
    pub state_clear_data: StateClearData,
    pub index_orderly_ram: IndexOrderlyRam,
    pub user_nvram: UserNvram,
}

/// Local build parameters [`PersistentAll::unmarshal`] needs to check every
/// fixed-cardinality or exact-size field nested inside the records it
/// composes — one entry per sub-record's own local-size arguments.
#[derive(Debug, Clone, Copy)]
pub struct PersistentAllLocalSizes {
    pub clock_stops: bool,
    pub local_pp_list_len: usize,
    pub local_audit_commands_len: usize,
    pub seed_len: usize,
    pub last_value_len: usize,
    pub context_array_len: usize,
    pub commit_array_len: usize,
    pub index_orderly_ram_capacity: usize,
    pub user_nvram_capacity: usize,
    pub max_bn_words: usize,
    pub local_hash_states_len: usize,
    pub local_hmac_key_len: usize,
}

impl PersistentAll {
    pub fn marshal<O: Output + ?Sized>(&self, out: &mut O, config: &AmbientConfig) -> usize {
        let mut written = NvHeader::new(PERSISTENT_ALL_VERSION, PERSISTENT_ALL_MAGIC).marshal(out);
        written += compile_constants::marshal(out);
        written += self.persistent_data.marshal(out, config);
        written += self.orderly_data.marshal(out, config);
        written += self.state_reset_data.marshal(out, config, 0);
        written += self.state_clear_data.marshal(out);
        written += self.index_orderly_ram.marshal(out);
        written += self.user_nvram.marshal(out, config);
        written += marshal_trailing_magic(PERSISTENT_ALL_MAGIC, out);
        written
    }

    pub fn unmarshal<I: Input + ?Sized>(
        input: &mut I,
        config: &AmbientConfig,
        sizes: PersistentAllLocalSizes,
        is_sequence: impl Fn(tpmstate_records::ObjectAttributes) -> bool,
    ) -> Result<Self, CodecError> {
        NvHeader::unmarshal(input, RECORD, PERSISTENT_ALL_MAGIC, PERSISTENT_ALL_VERSION)?;
        compile_constants::unmarshal(input)?;
        let persistent_data = PersistentData::unmarshal(
            input,
            config,
            sizes.clock_stops,
            sizes.local_pp_list_len,
            sizes.local_audit_commands_len,
        )?;
        let orderly_data = OrderlyData::unmarshal(input, config, sizes.seed_len, sizes.last_value_len)?;
        let state_reset_data =
            StateResetData::unmarshal(input, config, sizes.context_array_len, sizes.commit_array_len)?;
        let state_clear_data = StateClearData::unmarshal(input)?;
        let index_orderly_ram = IndexOrderlyRam::unmarshal(input, sizes.index_orderly_ram_capacity)?;
        let user_nvram = UserNvram::unmarshal(
            input,
            config,
            sizes.user_nvram_capacity,
            is_sequence,
            sizes.local_hash_states_len,
            sizes.local_hmac_key_len,
            sizes.max_bn_words,
        )?;
        unmarshal_trailing_magic(input, RECORD, PERSISTENT_ALL_MAGIC)?;

        Ok(PersistentAll {
            persistent_data,
            orderly_data,
            state_reset_data,
            state_clear_data,
            index_orderly_ram,
            user_nvram,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpmstate_records::consts::{PRIMARY_SEED_SIZE, PROOF_SIZE};
    use tpmstate_records::{DrbgState, EccCommit, ObjectAttributes, PcrAuthvalueSet, PcrSave, TimeEpoch};
    use tpmstate_types::{SliceInput, VecOutput};

    fn sample_persistent_data(config: &AmbientConfig) -> PersistentData {
        PersistentData {
            disable_clear: false,
            owner_alg: 0x000b,
            endorsement_alg: 0x000b,
            lockout_alg: 0x000b,
            owner_policy: vec![0; 32],
            endorsement_policy: vec![0; 32],
            lockout_policy: vec![0; 32],
            owner_auth: vec![0; 32],
            endorsement_auth: vec![0; 32],
            lockout_auth: vec![0; 32],
            ep_seed: vec![0x01; PRIMARY_SEED_SIZE],
            sp_seed: vec![0x02; PRIMARY_SEED_SIZE],
            pp_seed: vec![0x03; PRIMARY_SEED_SIZE],
            ph_proof: vec![0x04; PROOF_SIZE],
            sh_proof: vec![0x05; PROOF_SIZE],
            eh_proof: vec![0x06; PROOF_SIZE],
            total_reset_count: 1,
            reset_count: 2,
            pcr_policies: config
                .pcr_policies
                .then_some(tpmstate_records::PcrPolicySet { entries: vec![(0x000b, vec![0u8; 32])] }),
            pcr_allocated: vec![0u8; 8],
            pp_list: vec![0u8; 16],
            failed_tries: 0,
            max_tries: 3,
            recovery_time: 1000,
            lockout_recovery: 1000,
            lock_out_auth_enabled: true,
            orderly_state: 0x8000,
            audit_commands: vec![0u8; 32],
            audit_hash_alg: 0x000b,
            audit_counter: 0,
            algorithm_set: 1,
            firmware_v1: 1,
            firmware_v2: 2,
            time_epoch: TimeEpoch::Running(42),
        }
    }

    fn sample(config: &AmbientConfig) -> PersistentAll {
        PersistentAll {
            persistent_data: sample_persistent_data(config),
            orderly_data: OrderlyData {
                clock: 7,
                clock_safe: true,
                drbg_state: DrbgState { reseed_counter: 1, seed: vec![0u8; 55], last_value: vec![0u32; 4] },
                self_heal: None,
            },
            state_reset_data: StateResetData {
                null_proof: vec![0x11; PROOF_SIZE],
                null_seed: vec![0x22; PRIMARY_SEED_SIZE],
                clear_count: 1,
                object_context_id: 2,
                context_array: vec![0x33; 16],
                context_counter: 3,
                command_audit_digest: vec![0x44; 32],
                restart_count: 4,
                pcr_counter: 5,
                ecc_commit: config
                    .ecc
                    .then_some(EccCommit { commit_counter: 6, commit_nonce: vec![0x55; 16], commit_array: vec![0x66; 8] }),
            },
            state_clear_data: StateClearData {
                sh_enable: true,
                eh_enable: true,
                ph_enable_nv: true,
                platform_alg: 0x000b,
                platform_policy: vec![0x77; 32],
                platform_auth: vec![0x88; 32],
                pcr_save: PcrSave::default(),
                pcr_auth_values: PcrAuthvalueSet {
                    auth: vec![vec![0x99; 32]; tpmstate_records::consts::NUM_AUTHVALUE_PCR_GROUP],
                },
            },
            index_orderly_ram: IndexOrderlyRam::default(),
            user_nvram: UserNvram { entries: Vec::new(), max_count: 0 },
        }
    }

    fn sizes() -> PersistentAllLocalSizes {
        PersistentAllLocalSizes {
            clock_stops: false,
            local_pp_list_len: 16,
            local_audit_commands_len: 32,
            seed_len: 55,
            last_value_len: 4,
            context_array_len: 16,
            commit_array_len: 8,
            index_orderly_ram_capacity: 4096,
            user_nvram_capacity: 4096,
            max_bn_words: 64,
            local_hash_states_len: 0,
            local_hmac_key_len: 0,
        }
    }

    #[test]
    fn roundtrip() {
        let config = AmbientConfig::default();
        let blob = sample(&config);
        let mut out = VecOutput::new();
        blob.marshal(&mut out, &config);
        let mut input = SliceInput::new(&out.0);
        let read_back = PersistentAll::unmarshal(&mut input, &config, sizes(), |_: ObjectAttributes| false).unwrap();
        assert_eq!(read_back, blob);
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn bad_tag_on_magic_mismatch() {
        let mut out = VecOutput::new();
        NvHeader::new(PERSISTENT_ALL_VERSION, 0xdead_beef).marshal(&mut out);
        let mut input = SliceInput::new(&out.0);
        let err =
            PersistentAll::unmarshal(&mut input, &AmbientConfig::default(), sizes(), |_: ObjectAttributes| false)
                .unwrap_err();
        assert!(matches!(err, CodecError::BadTag { .. }));
    }

    /// A compile-constants mismatch fails before any persistent data is
    /// touched (spec §4.5, §6 ordering: manifest precedes persistent data).
    #[test]
    fn compile_constants_failure_short_circuits_before_persistent_data() {
        let config = AmbientConfig::default();
        let blob = sample(&config);
        let mut out = VecOutput::new();
        blob.marshal(&mut out, &config);

        let count_offset = 6 + 6; // PERSISTENT_ALL frame + PA_COMPILE_CONSTANTS frame
        let corrupted = 0u32.to_be_bytes();
        out.0[count_offset..count_offset + 4].copy_from_slice(&corrupted);

        let mut input = SliceInput::new(&out.0);
        let err = PersistentAll::unmarshal(&mut input, &config, sizes(), |_: ObjectAttributes| false).unwrap_err();
        assert!(matches!(err, CodecError::BadParameter { .. }));
    }
}
