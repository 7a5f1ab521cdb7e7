//! Compile-constants manifest (spec §4.5): a framed list of named 32-bit
//! constants, each checked against this build's own value using a
//! statically-paired comparator. Precedes persistent data in
//! `PERSISTENT_ALL` so an incompatible build fails before touching any real
//! state.

use tpmstate_records::consts::{PA_COMPILE_CONSTANTS_MAGIC, PA_COMPILE_CONSTANTS_VERSION};
use tpmstate_types::{CodecError, Input, Marshal, NvHeader, Output, Unmarshal};

const RECORD: &str = "PA_COMPILE_CONSTANTS";

/// How a stored constant is checked against this build's own value (spec
/// §4.5, §6 table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Le,
    Ge,
    /// Logged but never gated on — reserved for forward-compatible
    /// diagnostics (spec §4.5 "`DONTCARE` is reserved for constants the
    /// original logs but never actually gates on").
    DontCare,
}

impl Comparator {
    fn holds(self, stored: u32, local: u32) -> bool {
        match self {
            Comparator::Eq => stored == local,
            Comparator::Le => stored <= local,
            Comparator::Ge => stored >= local,
            Comparator::DontCare => true,
        }
    }
}

/// One named entry in the manifest: this build's own value for the
/// constant and the comparator a stored value must satisfy against it.
#[derive(Debug, Clone, Copy)]
pub struct CompileConstant {
    pub name: &'static str,
    pub value: u32,
    pub comparator: Comparator,
}

/// The manifest this build carries, in the order the original's
/// `PACompileConstants_Marshal`/`_Unmarshal` enumerate it (spec §4.5
/// Supplement).
pub const COMPILE_CONSTANTS: &[CompileConstant] = &[
    CompileConstant { name: "MAX_LOADED_SESSIONS", value: tpmstate_records::consts::MAX_LOADED_SESSIONS as u32, comparator: Comparator::Eq },
    CompileConstant { name: "MAX_ACTIVE_SESSIONS", value: tpmstate_records::consts::MAX_ACTIVE_SESSIONS as u32, comparator: Comparator::Le },
    CompileConstant { name: "PCR_SELECT_MAX", value: tpmstate_records::consts::PCR_SELECT_MAX as u32, comparator: Comparator::Eq },
    CompileConstant { name: "MAX_HANDLE_NUMBER", value: tpmstate_records::consts::MAX_HANDLE_NUM as u32, comparator: Comparator::Eq },
    CompileConstant { name: "MAX_LOADED_OBJECTS", value: tpmstate_records::consts::MAX_LOADED_OBJECTS as u32, comparator: Comparator::Eq },
    CompileConstant { name: "MIN_EVICT_OBJECTS", value: tpmstate_records::consts::MIN_EVICT_OBJECTS as u32, comparator: Comparator::Ge },
    CompileConstant { name: "NUM_POLICY_PCR_GROUP", value: tpmstate_records::consts::NUM_POLICY_PCR_GROUP as u32, comparator: Comparator::Eq },
    CompileConstant { name: "NUM_AUTHVALUE_PCR_GROUP", value: tpmstate_records::consts::NUM_AUTHVALUE_PCR_GROUP as u32, comparator: Comparator::Eq },
    CompileConstant { name: "MAX_CONTEXT_SIZE", value: tpmstate_records::consts::MAX_CONTEXT_SIZE as u32, comparator: Comparator::Le },
    CompileConstant { name: "PROOF_SIZE", value: tpmstate_records::consts::PROOF_SIZE as u32, comparator: Comparator::Eq },
    CompileConstant { name: "PRIMARY_SEED_SIZE", value: tpmstate_records::consts::PRIMARY_SEED_SIZE as u32, comparator: Comparator::Eq },
    CompileConstant { name: "NV_MEMORY_SIZE", value: tpmstate_records::consts::NV_MEMORY_SIZE as u32, comparator: Comparator::Le },
    CompileConstant { name: "NUM_STATIC_PCR", value: tpmstate_records::consts::NUM_STATIC_PCR as u32, comparator: Comparator::Eq },
];

/// Writes the frame, the manifest's length, and each constant's value (spec
/// §4.5 "Writer emits the count and the values" — the comparator is a
/// purely local, reader-side property and never goes on the wire).
pub fn marshal<O: Output + ?Sized>(out: &mut O) -> usize {
    let mut written = NvHeader::new(PA_COMPILE_CONSTANTS_VERSION, PA_COMPILE_CONSTANTS_MAGIC).marshal(out);
    written += (COMPILE_CONSTANTS.len() as u32).marshal(out);
    for constant in COMPILE_CONSTANTS {
        written += constant.value.marshal(out);
    }
    written
}

/// Re-reads the count and each value, checking both against this build's
/// own manifest. A count mismatch is `BAD_PARAMETER` here — the original's
/// `PACompileConstants_Unmarshal` logs this mismatch without failing, which
/// this codec treats as an oversight rather than a behavior to preserve
/// (see `DESIGN.md`).
pub fn unmarshal<I: Input + ?Sized>(input: &mut I) -> Result<(), CodecError> {
    NvHeader::unmarshal(input, RECORD, PA_COMPILE_CONSTANTS_MAGIC, PA_COMPILE_CONSTANTS_VERSION)?;
    let stored_count = u32::unmarshal(input, RECORD, "count")? as usize;
    if stored_count != COMPILE_CONSTANTS.len() {
        tracing::warn!(record = RECORD, expected = COMPILE_CONSTANTS.len(), actual = stored_count, "compile-constants count mismatch");
        return Err(CodecError::bad_parameter(
            RECORD,
            "count",
            format!("expected {} entries, blob has {stored_count}", COMPILE_CONSTANTS.len()),
        ));
    }
    for constant in COMPILE_CONSTANTS {
        let stored = u32::unmarshal(input, RECORD, "value")?;
        if !constant.comparator.holds(stored, constant.value) {
            tracing::warn!(record = RECORD, name = constant.name, stored, local = constant.value, "compile-constants mismatch");
            return Err(CodecError::bad_parameter(
                RECORD,
                "value",
                format!("{}: blob has {stored}, this build has {}", constant.name, constant.value),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpmstate_types::{SliceInput, VecOutput};

    #[test]
    fn roundtrip_accepts_matching_manifest() {
        let mut out = VecOutput::new();
        marshal(&mut out);
        let mut input = SliceInput::new(&out.0);
        unmarshal(&mut input).unwrap();
        assert_eq!(input.remaining(), 0);
    }

    /// Scenario C (spec §8): an `EQ`-tagged constant mismatch names the
    /// offending constant and fails `BAD_PARAMETER`.
    #[test]
    fn eq_constant_mismatch_is_bad_parameter() {
        let mut out = VecOutput::new();
        marshal(&mut out);
        let session_index = COMPILE_CONSTANTS.iter().position(|c| c.name == "MAX_LOADED_SESSIONS").unwrap();
        let value_offset = 6 + 4 + session_index * 4;
        let corrupted = (COMPILE_CONSTANTS[session_index].value + 1).to_be_bytes();
        out.0[value_offset..value_offset + 4].copy_from_slice(&corrupted);

        let mut input = SliceInput::new(&out.0);
        let err = unmarshal(&mut input).unwrap_err();
        match err {
            CodecError::BadParameter { detail, .. } => assert!(detail.contains("MAX_LOADED_SESSIONS")),
            other => panic!("expected BadParameter, got {other:?}"),
        }
    }

    #[test]
    fn dont_care_constant_tolerates_mismatch() {
        assert!(Comparator::DontCare.holds(0, 999));
    }

    #[test]
    fn count_mismatch_is_bad_parameter() {
        let mut out = VecOutput::new();
        NvHeader::new(PA_COMPILE_CONSTANTS_VERSION, PA_COMPILE_CONSTANTS_MAGIC).marshal(&mut out);
        ((COMPILE_CONSTANTS.len() as u32) + 1).marshal(&mut out);

        let mut input = SliceInput::new(&out.0);
        let err = unmarshal(&mut input).unwrap_err();
        assert!(matches!(err, CodecError::BadParameter { .. }));
    }
}
