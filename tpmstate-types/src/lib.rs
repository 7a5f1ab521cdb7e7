//! Primitive wire codec, cursor traits, the skip-block mechanism and the
//! error taxonomy shared by the rest of the TPM state codec workspace.
//!
//! This crate has no knowledge of TPM semantics — it is the equivalent of
//! the teacher workspace's types crate: small, dependency-light, and
//! reused by every layer above it.

pub mod config;
pub mod error;
pub mod frame;
pub mod io;
pub mod primitive;
pub mod skip;
pub mod tagged;

pub use config::AmbientConfig;
pub use error::{CodecError, Result};
pub use frame::{marshal_trailing_magic, unmarshal_trailing_magic, NvHeader};
pub use io::{Input, Output, SliceInput, VecOutput};
pub use primitive::{marshal_fixed, min_copy, unmarshal_fixed, ByteArray, Marshal, Unmarshal};
pub use skip::{skip_begin, skip_end, SkipDecision, SkipWriter, MAX_SKIP_DEPTH};
pub use tagged::{marshal_tagged_stream, unmarshal_tagged_stream, TPM_ALG_NULL};
