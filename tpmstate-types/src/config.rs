//! Ambient configuration (spec §9): the original implementation elides
//! whole sub-regions behind C preprocessor guards chosen at compile time.
//! In this codec those guards become fields on [`AmbientConfig`], read at
//! every skip-block site so both sides of a gate are reachable from a
//! single build — including from a single test binary.

/// Runtime stand-in for the compile-time option set a TPM build is
/// configured with. Every field corresponds to one `#ifdef` gate found in
/// the original source's marshaling code; see `SPEC_FULL.md` §4.3/§4.4 for
/// the mapping from field to gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmbientConfig {
    /// `USE_DA_USED`: whether `g_daUsed` is carried in `VOLATILE_STATE`.
    pub use_da_used: bool,
    /// `SESSION_PROCESS_C || GLOBAL_C || MANUFACTURE_C`: whether the
    /// session-process table is carried in `VOLATILE_STATE`.
    pub session_process: bool,
    /// `TPM_CC_GetCommandAuditDigest`: whether the command-audit cpHash is
    /// carried inside the session-process table.
    pub command_audit_digest: bool,
    /// `DA_C || GLOBAL_C || MANUFACTURE_C`: whether the dictionary-attack
    /// timer pair is carried at all.
    pub dictionary_attack: bool,
    /// `ACCUMULATE_SELF_HEAL_TIMER`: when set, the self-heal/lockout timers
    /// accumulate in persistent orderly data instead of being carried as
    /// live volatile counters — this *inverts* the sense of the
    /// `dictionary_attack` sub-block and the orderly-data skip block.
    pub accumulate_self_heal_timer: bool,
    /// `NV_C || GLOBAL_C`: whether the NV cache state (`evictNvEnd`, the
    /// index-orderly-RAM shadow, `maxCounter`) is carried.
    pub nv_cache: bool,
    /// `OBJECT_C || GLOBAL_C`: whether the object table is carried.
    pub object_table: bool,
    /// `PCR_C || GLOBAL_C`: whether the PCR array is carried.
    pub pcr_table: bool,
    /// `SESSION_C || GLOBAL_C`: whether the session-slot table is carried.
    pub session_table: bool,
    /// `HARDWARE_CLOCK` (negated at the call site): when *not* set, the
    /// software clock pair (`realTimePrevious`, `tpmTime`) is carried.
    pub hardware_clock: bool,
    /// `TPM_ALG_RSA`: whether state-reset data carries the private-exponent
    /// commit region.
    pub rsa: bool,
    /// `TPM_ALG_ECC`: whether PCR policy/authvalue sets and object private
    /// areas may contain ECC-shaped payloads.
    pub ecc: bool,
    /// `TPM_ALG_SHA384 || TPM_ALG_SHA512`: whether the 64-bit-word hash
    /// state (`tpmHashStateSHA512_t`) is reachable from the any-hash-state
    /// dispatch.
    pub sha384_or_sha512: bool,
    /// `NUM_POLICY_PCR_GROUP > 0`: whether persistent data carries the
    /// PCR-policy skip block.
    pub pcr_policies: bool,
}

impl Default for AmbientConfig {
    /// The "full" build: every optional region present, matching a TPM
    /// reference build compiled with the complete algorithm and session
    /// set. Tests that need to exercise the absent side of a gate start
    /// from this and flip individual fields off.
    fn default() -> Self {
        AmbientConfig {
            use_da_used: true,
            session_process: true,
            command_audit_digest: true,
            dictionary_attack: true,
            accumulate_self_heal_timer: false,
            nv_cache: true,
            object_table: true,
            pcr_table: true,
            session_table: true,
            hardware_clock: false,
            rsa: true,
            ecc: true,
            sha384_or_sha512: true,
            pcr_policies: true,
        }
    }
}
