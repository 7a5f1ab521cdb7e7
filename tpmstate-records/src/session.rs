//! Session records (spec §3, §4.3 "session", "session slot"): the
//! authorization-session state an active TPM session carries between
//! commands, and the `occupied`-gated envelope a session-table slot wraps
//! it in.

use tpmstate_types::{ByteArray, CodecError, Input, Marshal, NvHeader, Output, Unmarshal};

use crate::consts::{SESSION_MAGIC, SESSION_SLOT_MAGIC, SESSION_SLOT_VERSION, SESSION_VERSION};

/// `TPMT_SYM_DEF`: a symmetric algorithm triple. The key-bits and mode
/// fields are algorithm-dependent unions in the original
/// (`TPMU_SYM_KEY_BITS`/`TPMU_SYM_MODE`); this catalog carries them as plain
/// 16-bit words, matching how every other union in this codec that isn't a
/// tagged stream is represented — as the raw selector-dependent payload,
/// since interpreting the union's internals is outside the state codec's
/// scope (spec §1, cryptographic primitives are external collaborators).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymmetricDef {
    pub algorithm: u16,
    pub key_bits: u16,
    pub mode: u16,
}

impl SymmetricDef {
    fn marshal<O: Output + ?Sized>(&self, out: &mut O) -> usize {
        let mut written = self.algorithm.marshal(out);
        written += self.key_bits.marshal(out);
        written += self.mode.marshal(out);
        written
    }

    fn unmarshal<I: Input + ?Sized>(input: &mut I, record: &'static str) -> Result<Self, CodecError> {
        let algorithm = u16::unmarshal(input, record, "symmetric.algorithm")?;
        let key_bits = u16::unmarshal(input, record, "symmetric.key_bits")?;
        let mode = u16::unmarshal(input, record, "symmetric.mode")?;
        Ok(SymmetricDef { algorithm, key_bits, mode })
    }
}

const SESSION_RECORD: &str = "SESSION";

/// Clock-size discriminants the session's epoch field is tagged with (spec
/// §3 "Session ... clock-size discriminator lets a reader validate that the
/// writer's CLOCK_STOPS configuration matches").
pub const CLOCK_SIZE_32: u8 = 4;
pub const CLOCK_SIZE_64: u8 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Epoch {
    ClockStopped(u64),
    Running(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub attributes: u32,
    pub pcr_counter: u32,
    pub start_time: u64,
    pub timeout: u64,
    pub epoch: Epoch,
    pub command_code: u32,
    pub auth_hash_alg: u16,
    pub command_locality: u8,
    pub symmetric: SymmetricDef,
    pub session_key: Vec<u8>,
    pub nonce_tpm: Vec<u8>,
    pub bound_entity: Vec<u8>,
    pub audit_digest: Vec<u8>,
}

impl Session {
    pub fn marshal<O: Output + ?Sized>(&self, out: &mut O) -> usize {
        let mut written = NvHeader::new(SESSION_VERSION, SESSION_MAGIC).marshal(out);
        written += self.attributes.marshal(out);
        written += self.pcr_counter.marshal(out);
        written += self.start_time.marshal(out);
        written += self.timeout.marshal(out);
        match self.epoch {
            Epoch::ClockStopped(value) => {
                written += CLOCK_SIZE_64.marshal(out);
                written += value.marshal(out);
            }
            Epoch::Running(value) => {
                written += CLOCK_SIZE_32.marshal(out);
                written += value.marshal(out);
            }
        }
        written += self.command_code.marshal(out);
        written += self.auth_hash_alg.marshal(out);
        written += self.command_locality.marshal(out);
        written += self.symmetric.marshal(out);
        written += ByteArray::new(self.session_key.clone()).marshal(out);
        written += ByteArray::new(self.nonce_tpm.clone()).marshal(out);
        written += ByteArray::new(self.bound_entity.clone()).marshal(out);
        written += ByteArray::new(self.audit_digest.clone()).marshal(out);
        written
    }

    pub fn unmarshal<I: Input + ?Sized>(input: &mut I, clock_stops: bool) -> Result<Self, CodecError> {
        NvHeader::unmarshal(input, SESSION_RECORD, SESSION_MAGIC, SESSION_VERSION)?;
        let attributes = u32::unmarshal(input, SESSION_RECORD, "attributes")?;
        let pcr_counter = u32::unmarshal(input, SESSION_RECORD, "pcr_counter")?;
        let start_time = u64::unmarshal(input, SESSION_RECORD, "start_time")?;
        let timeout = u64::unmarshal(input, SESSION_RECORD, "timeout")?;

        let clocksize = u8::unmarshal(input, SESSION_RECORD, "clocksize")?;
        let expected = if clock_stops { CLOCK_SIZE_64 } else { CLOCK_SIZE_32 };
        if clocksize != expected {
            return Err(CodecError::bad_parameter(
                SESSION_RECORD,
                "clocksize",
                format!("expected {expected}, got {clocksize}"),
            ));
        }
        let epoch = if clock_stops {
            Epoch::ClockStopped(u64::unmarshal(input, SESSION_RECORD, "epoch")?)
        } else {
            Epoch::Running(u32::unmarshal(input, SESSION_RECORD, "epoch")?)
        };

        let command_code = u32::unmarshal(input, SESSION_RECORD, "command_code")?;
        let auth_hash_alg = u16::unmarshal(input, SESSION_RECORD, "auth_hash_alg")?;
        let command_locality = u8::unmarshal(input, SESSION_RECORD, "command_locality")?;
        let symmetric = SymmetricDef::unmarshal(input, SESSION_RECORD)?;
        let session_key = ByteArray::unmarshal(input, SESSION_RECORD, "session_key")?.0;
        let nonce_tpm = ByteArray::unmarshal(input, SESSION_RECORD, "nonce_tpm")?.0;
        let bound_entity = ByteArray::unmarshal(input, SESSION_RECORD, "bound_entity")?.0;
        let audit_digest = ByteArray::unmarshal(input, SESSION_RECORD, "audit_digest")?.0;

        Ok(Session {
            attributes,
            pcr_counter,
            start_time,
            timeout,
            epoch,
            command_code,
            auth_hash_alg,
            command_locality,
            symmetric,
            session_key,
            nonce_tpm,
            bound_entity,
            audit_digest,
        })
    }
}

const SESSION_SLOT_RECORD: &str = "SESSION_SLOT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSlot {
    pub occupied: bool,
    pub session: Option<Session>,
}

impl SessionSlot {
    pub fn marshal<O: Output + ?Sized>(&self, out: &mut O) -> usize {
        let mut written = NvHeader::new(SESSION_SLOT_VERSION, SESSION_SLOT_MAGIC).marshal(out);
        written += self.occupied.marshal(out);
        if !self.occupied {
            return written;
        }
        written += self.session.as_ref().expect("occupied slot without session").marshal(out);
        written
    }

    pub fn unmarshal<I: Input + ?Sized>(input: &mut I, clock_stops: bool) -> Result<Self, CodecError> {
        NvHeader::unmarshal(input, SESSION_SLOT_RECORD, SESSION_SLOT_MAGIC, SESSION_SLOT_VERSION)?;
        let occupied = bool::unmarshal(input, SESSION_SLOT_RECORD, "occupied")?;
        if !occupied {
            return Ok(SessionSlot { occupied, session: None });
        }
        let session = Session::unmarshal(input, clock_stops)?;
        Ok(SessionSlot { occupied, session: Some(session) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpmstate_types::{SliceInput, VecOutput};

    fn sample(epoch: Epoch) -> Session {
        Session {
            attributes: 0x0001_0203,
            pcr_counter: 1,
            start_time: 2,
            timeout: 3,
            epoch,
            command_code: 0x0000_0143,
            auth_hash_alg: 0x000b,
            command_locality: 0,
            symmetric: SymmetricDef { algorithm: 0x0006, key_bits: 128, mode: 0x0043 },
            session_key: vec![0x11; 32],
            nonce_tpm: vec![0x22; 16],
            bound_entity: vec![0x33; 34],
            audit_digest: vec![0x44; 32],
        }
    }

    #[test]
    fn roundtrip_clock_running() {
        let session = sample(Epoch::Running(999));
        let mut out = VecOutput::new();
        session.marshal(&mut out);
        let mut input = SliceInput::new(&out.0);
        let read_back = Session::unmarshal(&mut input, false).unwrap();
        assert_eq!(read_back, session);
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn roundtrip_clock_stopped() {
        let session = sample(Epoch::ClockStopped(123456));
        let mut out = VecOutput::new();
        session.marshal(&mut out);
        let mut input = SliceInput::new(&out.0);
        let read_back = Session::unmarshal(&mut input, true).unwrap();
        assert_eq!(read_back, session);
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn clocksize_mismatch_is_bad_parameter() {
        let session = sample(Epoch::Running(1));
        let mut out = VecOutput::new();
        session.marshal(&mut out);
        let mut input = SliceInput::new(&out.0);
        let err = Session::unmarshal(&mut input, true).unwrap_err();
        assert!(matches!(err, CodecError::BadParameter { .. }));
    }

    #[test]
    fn unoccupied_slot_roundtrip() {
        let slot = SessionSlot { occupied: false, session: None };
        let mut out = VecOutput::new();
        slot.marshal(&mut out);
        let mut input = SliceInput::new(&out.0);
        let read_back = SessionSlot::unmarshal(&mut input, false).unwrap();
        assert_eq!(read_back, slot);
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn occupied_slot_roundtrip() {
        let slot = SessionSlot { occupied: true, session: Some(sample(Epoch::Running(1))) };
        let mut out = VecOutput::new();
        slot.marshal(&mut out);
        let mut input = SliceInput::new(&out.0);
        let read_back = SessionSlot::unmarshal(&mut input, false).unwrap();
        assert_eq!(read_back, slot);
        assert_eq!(input.remaining(), 0);
    }
}
