//! Magic numbers, record versions, and the fixed sizes referenced
//! throughout the record catalog (spec §6). The magic values must
//! byte-match the original implementation to stay compatible with
//! existing stored blobs; the size constants mirror a typical reference
//! TPM build's `Implementation.h` (see `original_source/src/tpm2/
//! NVMarshal.c`'s compile-constants table for their names).

// --- magic constants (spec §6), byte-exact with the original implementation ---
pub const NV_INDEX_MAGIC: u32 = 0x2547_265a;
pub const PERSISTENT_ALL_MAGIC: u32 = 0xab36_4723;
pub const VOLATILE_STATE_MAGIC: u32 = 0x4563_7889;
pub const INDEX_ORDERLY_RAM_MAGIC: u32 = 0x5346_feab;
pub const USER_NVRAM_MAGIC: u32 = 0x094f_22c3;
pub const ORDERLY_DATA_MAGIC: u32 = 0x5665_7887;
pub const STATE_RESET_DATA_MAGIC: u32 = 0x0110_2332;
pub const STATE_CLEAR_DATA_MAGIC: u32 = 0x9889_7667;
pub const DRBG_STATE_MAGIC: u32 = 0x6fe8_3ea1;
pub const PCR_POLICY_MAGIC: u32 = 0x176b_e626;
pub const PCR_SAVE_MAGIC: u32 = 0x7372_eabc;
pub const PCR_MAGIC: u32 = 0xe95f_0387;
pub const PCR_AUTHVALUE_MAGIC: u32 = 0x6be8_2eaf;
pub const BN_PRIME_MAGIC: u32 = 0x2fe7_36ab;
pub const PRIVATE_EXPONENT_MAGIC: u32 = 0x0854_eab2;
pub const HASH_STATE_SHA1_MAGIC: u32 = 0x19d4_6f50;
pub const HASH_STATE_SHA256_MAGIC: u32 = 0x6ea0_59d0;
pub const HASH_STATE_SHA512_MAGIC: u32 = 0x1481_4b08;
pub const ANY_HASH_STATE_MAGIC: u32 = 0x349d_494b;
pub const HASH_STATE_MAGIC: u32 = 0x5628_78a2;
pub const HASH_OBJECT_MAGIC: u32 = 0xb874_fe38;
pub const OBJECT_MAGIC: u32 = 0x75be_73af;
pub const ANY_OBJECT_MAGIC: u32 = 0xfe9a_3974;
pub const SESSION_MAGIC: u32 = 0x44be_9f45;
pub const SESSION_SLOT_MAGIC: u32 = 0x3664_aebc;
pub const PA_COMPILE_CONSTANTS_MAGIC: u32 = 0xc9ea_6431;
pub const PERSISTENT_DATA_MAGIC: u32 = 0x1221_3443;

// --- record versions (spec §4.2: "versions never decrease") ---
pub const NV_INDEX_VERSION: u16 = 1;
pub const PERSISTENT_ALL_VERSION: u16 = 1;
pub const VOLATILE_STATE_VERSION: u16 = 1;
pub const ORDERLY_DATA_VERSION: u16 = 1;
pub const STATE_RESET_DATA_VERSION: u16 = 1;
pub const STATE_CLEAR_DATA_VERSION: u16 = 1;
pub const DRBG_STATE_VERSION: u16 = 1;
pub const PCR_POLICY_VERSION: u16 = 1;
pub const PCR_SAVE_VERSION: u16 = 1;
pub const PCR_VERSION: u16 = 1;
pub const PCR_AUTHVALUE_VERSION: u16 = 1;
pub const BN_PRIME_VERSION: u16 = 1;
pub const PRIVATE_EXPONENT_VERSION: u16 = 1;
pub const HASH_STATE_SHA1_VERSION: u16 = 1;
pub const HASH_STATE_SHA256_VERSION: u16 = 1;
pub const HASH_STATE_SHA512_VERSION: u16 = 1;
pub const ANY_HASH_STATE_VERSION: u16 = 1;
pub const HASH_STATE_VERSION: u16 = 1;
pub const HASH_OBJECT_VERSION: u16 = 1;
pub const OBJECT_VERSION: u16 = 1;
pub const ANY_OBJECT_VERSION: u16 = 1;
pub const SESSION_VERSION: u16 = 1;
pub const SESSION_SLOT_VERSION: u16 = 1;
pub const PA_COMPILE_CONSTANTS_VERSION: u16 = 1;
pub const PERSISTENT_DATA_VERSION: u16 = 1;
pub const INDEX_ORDERLY_RAM_VERSION: u16 = 1;
pub const USER_NVRAM_VERSION: u16 = 1;

// --- fixed sizes (compile-constants manifest table, spec §4.5) ---
pub const PROOF_SIZE: usize = 32;
pub const PRIMARY_SEED_SIZE: usize = 32;
pub const MAX_CONTEXT_SIZE: usize = 2560;
pub const MAX_LOADED_SESSIONS: usize = 3;
pub const MAX_ACTIVE_SESSIONS: usize = 64;
pub const MAX_LOADED_OBJECTS: usize = 3;
pub const MIN_EVICT_OBJECTS: usize = 2;
pub const NUM_POLICY_PCR_GROUP: usize = 1;
pub const NUM_AUTHVALUE_PCR_GROUP: usize = 1;
pub const PCR_SELECT_MAX: usize = 3;
pub const MAX_HANDLE_NUM: usize = 3;
pub const NV_MEMORY_SIZE: usize = 16 * 1024;
pub const NUM_STATIC_PCR: usize = 24;

/// Algorithm ids used by the hash-state `hashAlg` dispatch (spec §4.3 "any
/// hash-state wrapper"). Values match the TPM algorithm ID registry.
pub const TPM_ALG_SHA1: u16 = 0x0004;
pub const TPM_ALG_SHA256: u16 = 0x000b;
pub const TPM_ALG_SHA384: u16 = 0x000c;
pub const TPM_ALG_SHA512: u16 = 0x000d;
pub const TPM_ALG_RSA: u16 = 0x0001;
pub const TPM_ALG_ECC: u16 = 0x0023;
pub const TPM_ALG_KEYEDHASH: u16 = 0x0008;
