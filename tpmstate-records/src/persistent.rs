//! Persistent data (spec §3, §4.3 "Persistent data"): the single long-lived
//! root record — hierarchy algorithms, policies, auth values, primary seeds
//! and proofs, dictionary-attack counters, and the two fixed-capacity
//! bitmaps (`ppList`, `auditCommands`) that use min-copy rather than
//! exact-match semantics (spec §8 invariant 8).

use tpmstate_types::{
    marshal_fixed, min_copy, skip_begin, skip_end, unmarshal_fixed, AmbientConfig, ByteArray, CodecError, Input,
    Marshal, NvHeader, Output, SkipDecision, SkipWriter, Unmarshal,
};

use crate::consts::{PERSISTENT_DATA_MAGIC, PERSISTENT_DATA_VERSION, PRIMARY_SEED_SIZE, PROOF_SIZE};
use crate::pcr::PcrPolicySet;

const RECORD: &str = "PERSISTENT_DATA";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeEpoch {
    ClockStopped(u64),
    Running(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistentData {
    pub disable_clear: bool,
    pub owner_alg: u16,
    pub endorsement_alg: u16,
    pub lockout_alg: u16,
    pub owner_policy: Vec<u8>,
    pub endorsement_policy: Vec<u8>,
    pub lockout_policy: Vec<u8>,
    pub owner_auth: Vec<u8>,
    pub endorsement_auth: Vec<u8>,
    pub lockout_auth: Vec<u8>,
    pub ep_seed: Vec<u8>,
    pub sp_seed: Vec<u8>,
    pub pp_seed: Vec<u8>,
    pub ph_proof: Vec<u8>,
    pub sh_proof: Vec<u8>,
    pub eh_proof: Vec<u8>,
    pub total_reset_count: u64,
    pub reset_count: u32,
    pub pcr_policies: Option<PcrPolicySet>,
    /// `TPML_PCR_SELECTION`, carried as an opaque blob — its internal
    /// layout belongs to the wider TPM command-processing code (spec §1).
    pub pcr_allocated: Vec<u8>,
    pub pp_list: Vec<u8>,
    pub failed_tries: u32,
    pub max_tries: u32,
    pub recovery_time: u32,
    pub lockout_recovery: u32,
    pub lock_out_auth_enabled: bool,
    pub orderly_state: u16,
    pub audit_commands: Vec<u8>,
    pub audit_hash_alg: u16,
    pub audit_counter: u64,
    pub algorithm_set: u32,
    pub firmware_v1: u32,
    pub firmware_v2: u32,
    pub time_epoch: TimeEpoch,
}

impl PersistentData {
    pub fn marshal<O: Output + ?Sized>(&self, out: &mut O, config: &AmbientConfig) -> usize {
        let mut written = NvHeader::new(PERSISTENT_DATA_VERSION, PERSISTENT_DATA_MAGIC).marshal(out);
        written += self.disable_clear.marshal(out);
        written += self.owner_alg.marshal(out);
        written += self.endorsement_alg.marshal(out);
        written += self.lockout_alg.marshal(out);
        written += ByteArray::new(self.owner_policy.clone()).marshal(out);
        written += ByteArray::new(self.endorsement_policy.clone()).marshal(out);
        written += ByteArray::new(self.lockout_policy.clone()).marshal(out);
        written += ByteArray::new(self.owner_auth.clone()).marshal(out);
        written += ByteArray::new(self.endorsement_auth.clone()).marshal(out);
        written += ByteArray::new(self.lockout_auth.clone()).marshal(out);
        written += marshal_fixed(&self.ep_seed, out);
        written += marshal_fixed(&self.sp_seed, out);
        written += marshal_fixed(&self.pp_seed, out);
        written += marshal_fixed(&self.ph_proof, out);
        written += marshal_fixed(&self.sh_proof, out);
        written += marshal_fixed(&self.eh_proof, out);
        written += self.total_reset_count.marshal(out);
        written += self.reset_count.marshal(out);

        let mut skip = SkipWriter::new();
        written += skip.push(out, config.pcr_policies);
        if config.pcr_policies {
            let policies = self.pcr_policies.as_ref().expect("pcr_policies set without policy values");
            written += policies.marshal(out);
        }
        skip.pop(out);
        skip.finish();

        written += ByteArray::new(self.pcr_allocated.clone()).marshal(out);

        written += (self.pp_list.len() as u16).marshal(out);
        out.write(&self.pp_list);
        written += self.pp_list.len();

        written += self.failed_tries.marshal(out);
        written += self.max_tries.marshal(out);
        written += self.recovery_time.marshal(out);
        written += self.lockout_recovery.marshal(out);
        written += self.lock_out_auth_enabled.marshal(out);
        written += self.orderly_state.marshal(out);

        written += (self.audit_commands.len() as u16).marshal(out);
        out.write(&self.audit_commands);
        written += self.audit_commands.len();

        written += self.audit_hash_alg.marshal(out);
        written += self.audit_counter.marshal(out);
        written += self.algorithm_set.marshal(out);
        written += self.firmware_v1.marshal(out);
        written += self.firmware_v2.marshal(out);

        match self.time_epoch {
            TimeEpoch::ClockStopped(value) => {
                written += crate::session::CLOCK_SIZE_64.marshal(out);
                written += value.marshal(out);
            }
            TimeEpoch::Running(value) => {
                written += crate::session::CLOCK_SIZE_32.marshal(out);
                written += value.marshal(out);
            }
        }
        written
    }

    /// `local_pp_list_len`/`local_audit_commands_len` are this build's fixed
    /// buffer capacities for the two bitmaps that use min-copy semantics
    /// (spec §8 invariant 8) rather than exact-match.
    #[allow(clippy::too_many_arguments)]
    pub fn unmarshal<I: Input + ?Sized>(
        input: &mut I,
        config: &AmbientConfig,
        clock_stops: bool,
        local_pp_list_len: usize,
        local_audit_commands_len: usize,
    ) -> Result<Self, CodecError> {
        NvHeader::unmarshal(input, RECORD, PERSISTENT_DATA_MAGIC, PERSISTENT_DATA_VERSION)?;
        let disable_clear = bool::unmarshal(input, RECORD, "disable_clear")?;
        let owner_alg = u16::unmarshal(input, RECORD, "owner_alg")?;
        let endorsement_alg = u16::unmarshal(input, RECORD, "endorsement_alg")?;
        let lockout_alg = u16::unmarshal(input, RECORD, "lockout_alg")?;
        let owner_policy = ByteArray::unmarshal(input, RECORD, "owner_policy")?.0;
        let endorsement_policy = ByteArray::unmarshal(input, RECORD, "endorsement_policy")?.0;
        let lockout_policy = ByteArray::unmarshal(input, RECORD, "lockout_policy")?.0;
        let owner_auth = ByteArray::unmarshal(input, RECORD, "owner_auth")?.0;
        let endorsement_auth = ByteArray::unmarshal(input, RECORD, "endorsement_auth")?.0;
        let lockout_auth = ByteArray::unmarshal(input, RECORD, "lockout_auth")?.0;
        let ep_seed = unmarshal_fixed(input, RECORD, "ep_seed", PRIMARY_SEED_SIZE)?;
        let sp_seed = unmarshal_fixed(input, RECORD, "sp_seed", PRIMARY_SEED_SIZE)?;
        let pp_seed = unmarshal_fixed(input, RECORD, "pp_seed", PRIMARY_SEED_SIZE)?;
        let ph_proof = unmarshal_fixed(input, RECORD, "ph_proof", PROOF_SIZE)?;
        let sh_proof = unmarshal_fixed(input, RECORD, "sh_proof", PROOF_SIZE)?;
        let eh_proof = unmarshal_fixed(input, RECORD, "eh_proof", PROOF_SIZE)?;
        let total_reset_count = u64::unmarshal(input, RECORD, "total_reset_count")?;
        let reset_count = u32::unmarshal(input, RECORD, "reset_count")?;

        let decision = skip_begin(input, config.pcr_policies, RECORD, "pcr_policies")?;
        let remaining_before = input.remaining();
        let pcr_policies = if let SkipDecision::Present { .. } = decision {
            Some(PcrPolicySet::unmarshal(input)?)
        } else {
            None
        };
        skip_end(decision, remaining_before, input.remaining(), RECORD, "pcr_policies")?;

        let pcr_allocated = ByteArray::unmarshal(input, RECORD, "pcr_allocated")?.0;

        let pp_list_wire_len = u16::unmarshal(input, RECORD, "pp_list")? as usize;
        let mut pp_list_wire = vec![0u8; pp_list_wire_len];
        input.read(RECORD, "pp_list", &mut pp_list_wire)?;
        let mut pp_list = vec![0u8; local_pp_list_len];
        min_copy(&pp_list_wire, &mut pp_list);

        let failed_tries = u32::unmarshal(input, RECORD, "failed_tries")?;
        let max_tries = u32::unmarshal(input, RECORD, "max_tries")?;
        let recovery_time = u32::unmarshal(input, RECORD, "recovery_time")?;
        let lockout_recovery = u32::unmarshal(input, RECORD, "lockout_recovery")?;
        let lock_out_auth_enabled = bool::unmarshal(input, RECORD, "lock_out_auth_enabled")?;
        let orderly_state = u16::unmarshal(input, RECORD, "orderly_state")?;

        let audit_commands_wire_len = u16::unmarshal(input, RECORD, "audit_commands")? as usize;
        let mut audit_commands_wire = vec![0u8; audit_commands_wire_len];
        input.read(RECORD, "audit_commands", &mut audit_commands_wire)?;
        let mut audit_commands = vec![0u8; local_audit_commands_len];
        min_copy(&audit_commands_wire, &mut audit_commands);

        let audit_hash_alg = u16::unmarshal(input, RECORD, "audit_hash_alg")?;
        let audit_counter = u64::unmarshal(input, RECORD, "audit_counter")?;
        let algorithm_set = u32::unmarshal(input, RECORD, "algorithm_set")?;
        let firmware_v1 = u32::unmarshal(input, RECORD, "firmware_v1")?;
        let firmware_v2 = u32::unmarshal(input, RECORD, "firmware_v2")?;

        let clocksize = u8::unmarshal(input, RECORD, "clocksize")?;
        let expected = if clock_stops { crate::session::CLOCK_SIZE_64 } else { crate::session::CLOCK_SIZE_32 };
        if clocksize != expected {
            return Err(CodecError::bad_parameter(
                RECORD,
                "clocksize",
                format!("expected {expected}, got {clocksize}"),
            ));
        }
        let time_epoch = if clock_stops {
            TimeEpoch::ClockStopped(u64::unmarshal(input, RECORD, "time_epoch")?)
        } else {
            TimeEpoch::Running(u32::unmarshal(input, RECORD, "time_epoch")?)
        };

        Ok(PersistentData {
            disable_clear,
            owner_alg,
            endorsement_alg,
            lockout_alg,
            owner_policy,
            endorsement_policy,
            lockout_policy,
            owner_auth,
            endorsement_auth,
            lockout_auth,
            ep_seed,
            sp_seed,
            pp_seed,
            ph_proof,
            sh_proof,
            eh_proof,
            total_reset_count,
            reset_count,
            pcr_policies,
            pcr_allocated,
            pp_list,
            failed_tries,
            max_tries,
            recovery_time,
            lockout_recovery,
            lock_out_auth_enabled,
            orderly_state,
            audit_commands,
            audit_hash_alg,
            audit_counter,
            algorithm_set,
            firmware_v1,
            firmware_v2,
            time_epoch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpmstate_types::{SliceInput, VecOutput};

    fn sample() -> PersistentData {
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
            pcr_policies: None,
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

    #[test]
    fn roundtrip_without_pcr_policies() {
        let mut config = AmbientConfig::default();
        config.pcr_policies = false;
        let data = sample();
        let mut out = VecOutput::new();
        data.marshal(&mut out, &config);
        let mut input = SliceInput::new(&out.0);
        let read_back = PersistentData::unmarshal(&mut input, &config, false, 16, 32).unwrap();
        assert_eq!(read_back, data);
        assert_eq!(input.remaining(), 0);
    }

    /// A reader built with a smaller `ppList` capacity than the stored blob
    /// tolerates the mismatch via min-copy rather than failing (spec §8
    /// invariant 8).
    #[test]
    fn pp_list_min_copy_on_capacity_mismatch() {
        let mut config = AmbientConfig::default();
        config.pcr_policies = false;
        let mut data = sample();
        data.pp_list = vec![0xabu8; 16];
        let mut out = VecOutput::new();
        data.marshal(&mut out, &config);
        let mut input = SliceInput::new(&out.0);
        let read_back = PersistentData::unmarshal(&mut input, &config, false, 4, 32).unwrap();
        assert_eq!(read_back.pp_list, vec![0xabu8; 4]);
    }

    #[test]
    fn roundtrip_with_pcr_policies() {
        use crate::pcr::PcrPolicySet;
        let config = AmbientConfig::default();
        let mut data = sample();
        data.pcr_policies = Some(PcrPolicySet { entries: vec![(0x000b, vec![0u8; 32])] });
        let mut out = VecOutput::new();
        data.marshal(&mut out, &config);
        let mut input = SliceInput::new(&out.0);
        let read_back = PersistentData::unmarshal(&mut input, &config, false, 16, 32).unwrap();
        assert_eq!(read_back, data);
        assert_eq!(input.remaining(), 0);
    }
}
