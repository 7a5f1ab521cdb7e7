//! TPM 2.0 state codec: the four top-level blobs a TPM emulator persists
//! and restores across a suspend/resume cycle — `VOLATILE_STATE`,
//! `PERSISTENT_ALL`, `INDEX_ORDERLY_RAM`, and `USER_NVRAM` — plus the
//! compile-constants manifest every `PERSISTENT_ALL` blob leads with.
//!
//! The wire codec for individual composite records lives in
//! `tpmstate-records`; this crate only adds the handful of structures that
//! exist purely to glue those records into a complete persisted image.

pub mod compile_constants;
pub mod index_orderly_ram;
pub mod persistent_all;
pub mod user_nvram;
pub mod volatile;

pub use index_orderly_ram::{IndexOrderlyEntry, IndexOrderlyRam};
pub use persistent_all::{PersistentAll, PersistentAllLocalSizes};
pub use user_nvram::{NvramEntry, NvramEntryKind, UserNvram};
pub use volatile::{
    DaTimers, FailureTriplet, NvCacheState, SessionProcessEntry, SessionProcessTable, SoftwareClock, VolatileState,
    VolatileStateLocalSizes,
};
