//! Record catalog: one module per framed (or, for `HMAC_STATE`, unframed)
//! structure that appears inside the four top-level TPM state blobs. Every
//! record here composes the primitives from `tpmstate-types` the way its
//! counterpart in `NVMarshal.c` composes `TPM2B`/byte-array helpers — this
//! crate adds TPM vocabulary, nothing else.

pub mod bignum;
pub mod clear;
pub mod consts;
pub mod drbg;
pub mod hash;
pub mod nvindex;
pub mod object;
pub mod orderly;
pub mod pcr;
pub mod persistent;
pub mod reset;
pub mod session;

pub use bignum::{BnPrime, PrivateExponent};
pub use clear::StateClearData;
pub use drbg::DrbgState;
pub use hash::{AnyHashState, HashState, HmacState, HASH_STATE_TYPE_COPY, HASH_STATE_TYPE_EMPTY};
pub use nvindex::NvIndex;
pub use object::{AnyObject, AnyObjectPayload, HashObject, Object, ObjectAttributes};
pub use orderly::{OrderlyData, SelfHealTimers};
pub use pcr::{DigestBank, Pcr, PcrAuthvalueSet, PcrPolicySet, PcrSave};
pub use persistent::{PersistentData, TimeEpoch};
pub use reset::{EccCommit, StateResetData};
pub use session::{Epoch, Session, SessionSlot, SymmetricDef, CLOCK_SIZE_32, CLOCK_SIZE_64};
