//! PCR records (spec §4.3 "PCR save / PCR bank", "PCR policy set", "PCR
//! authvalue set"): per-algorithm digest banks emitted as an
//! algorithm-tagged stream, and fixed-cardinality policy/authvalue arrays.

use tpmstate_types::{
    marshal_tagged_stream, unmarshal_tagged_stream, AmbientConfig, CodecError, Input, Marshal, NvHeader, Output,
    Unmarshal,
};

use crate::consts::{
    NUM_AUTHVALUE_PCR_GROUP, NUM_POLICY_PCR_GROUP, NUM_STATIC_PCR, PCR_AUTHVALUE_MAGIC, PCR_AUTHVALUE_VERSION,
    PCR_MAGIC, PCR_POLICY_MAGIC, PCR_POLICY_VERSION, PCR_SAVE_MAGIC, PCR_SAVE_VERSION, PCR_VERSION, TPM_ALG_SHA1,
    TPM_ALG_SHA256, TPM_ALG_SHA384, TPM_ALG_SHA512,
};

fn digest_size(alg: u16) -> Option<usize> {
    match alg {
        TPM_ALG_SHA1 => Some(20),
        TPM_ALG_SHA256 => Some(32),
        TPM_ALG_SHA384 => Some(48),
        TPM_ALG_SHA512 => Some(64),
        _ => None,
    }
}

/// A set of per-algorithm PCR digests, in the fixed bank order SHA-1,
/// SHA-256, SHA-384, SHA-512 (spec §3 "PCR bank set", "emitted in a fixed
/// algorithm order").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestBank {
    pub sha1: Option<Vec<u8>>,
    pub sha256: Option<Vec<u8>>,
    pub sha384: Option<Vec<u8>>,
    pub sha512: Option<Vec<u8>>,
}

impl DigestBank {
    fn items(&self) -> Vec<(u16, Vec<u8>)> {
        let mut items = Vec::new();
        if let Some(bytes) = &self.sha1 {
            items.push((TPM_ALG_SHA1, bytes.clone()));
        }
        if let Some(bytes) = &self.sha256 {
            items.push((TPM_ALG_SHA256, bytes.clone()));
        }
        if let Some(bytes) = &self.sha384 {
            items.push((TPM_ALG_SHA384, bytes.clone()));
        }
        if let Some(bytes) = &self.sha512 {
            items.push((TPM_ALG_SHA512, bytes.clone()));
        }
        items
    }

    /// Reconstructs a bank from a tagged stream, failing `BAD_PARAMETER` on
    /// an unrecognized algorithm id and `SIZE` if a recognized bank's byte
    /// length doesn't match its digest size times `multiplier` (the
    /// `PCR_SAVE` record multiplies by `NUM_STATIC_PCR`; a single `PCR`
    /// record uses `multiplier = 1`).
    fn from_items(record: &'static str, items: Vec<(u16, Vec<u8>)>, multiplier: usize) -> Result<Self, CodecError> {
        let mut bank = DigestBank::default();
        for (alg, bytes) in items {
            let Some(size) = digest_size(alg) else {
                tracing::warn!(record, algid = format!("0x{alg:04x}"), "unsupported algorithm id");
                return Err(CodecError::bad_parameter(record, "algid", format!("unsupported algorithm id 0x{alg:04x}")));
            };
            let expected = size * multiplier;
            if bytes.len() != expected {
                tracing::warn!(record, algid = format!("0x{alg:04x}"), expected, actual = bytes.len(), "bad size for PCR bank");
                return Err(CodecError::size(record, "bank", expected, bytes.len()));
            }
            match alg {
                TPM_ALG_SHA1 => bank.sha1 = Some(bytes),
                TPM_ALG_SHA256 => bank.sha256 = Some(bytes),
                TPM_ALG_SHA384 => bank.sha384 = Some(bytes),
                TPM_ALG_SHA512 => bank.sha512 = Some(bytes),
                _ => unreachable!("filtered by digest_size above"),
            }
        }
        Ok(bank)
    }
}

const PCR_SAVE_RECORD: &str = "PCR_SAVE";

/// All static PCRs across every algorithm bank (spec §3 "PCR bank set").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PcrSave {
    pub banks: DigestBank,
}

impl PcrSave {
    pub fn marshal<O: Output + ?Sized>(&self, out: &mut O) -> usize {
        let mut written = NvHeader::new(PCR_SAVE_VERSION, PCR_SAVE_MAGIC).marshal(out);
        written += (NUM_STATIC_PCR as u16).marshal(out);
        written += marshal_tagged_stream(&self.banks.items(), out);
        written
    }

    pub fn unmarshal<I: Input + ?Sized>(input: &mut I) -> Result<Self, CodecError> {
        NvHeader::unmarshal(input, PCR_SAVE_RECORD, PCR_SAVE_MAGIC, PCR_SAVE_VERSION)?;
        let array_size = u16::unmarshal(input, PCR_SAVE_RECORD, "num_static_pcr")? as usize;
        if array_size != NUM_STATIC_PCR {
            return Err(CodecError::size(PCR_SAVE_RECORD, "num_static_pcr", NUM_STATIC_PCR, array_size));
        }
        let items = unmarshal_tagged_stream(input, PCR_SAVE_RECORD, "bank")?;
        let banks = DigestBank::from_items(PCR_SAVE_RECORD, items, NUM_STATIC_PCR)?;
        Ok(PcrSave { banks })
    }
}

const PCR_RECORD: &str = "PCR";

/// A single PCR register's per-algorithm digests (spec §3 entry "PCR bank
/// set", per-register instance gated by `PCR_C || GLOBAL_C` in
/// `VOLATILE_STATE`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pcr {
    pub banks: DigestBank,
}

impl Pcr {
    pub fn marshal<O: Output + ?Sized>(&self, out: &mut O) -> usize {
        let mut written = NvHeader::new(PCR_VERSION, PCR_MAGIC).marshal(out);
        written += marshal_tagged_stream(&self.banks.items(), out);
        written
    }

    pub fn unmarshal<I: Input + ?Sized>(input: &mut I) -> Result<Self, CodecError> {
        NvHeader::unmarshal(input, PCR_RECORD, PCR_MAGIC, PCR_VERSION)?;
        let items = unmarshal_tagged_stream(input, PCR_RECORD, "bank")?;
        let banks = DigestBank::from_items(PCR_RECORD, items, 1)?;
        Ok(Pcr { banks })
    }
}

const PCR_POLICY_RECORD: &str = "PCR_POLICY";

/// Fixed-cardinality `(alg, digest)` policy set (spec §4.3 "PCR policy
/// set"), cardinality checked for exact equality against
/// `NUM_POLICY_PCR_GROUP`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcrPolicySet {
    pub entries: Vec<(u16, Vec<u8>)>,
}

impl PcrPolicySet {
    pub fn marshal<O: Output + ?Sized>(&self, out: &mut O) -> usize {
        let mut written = NvHeader::new(PCR_POLICY_VERSION, PCR_POLICY_MAGIC).marshal(out);
        written += (self.entries.len() as u16).marshal(out);
        for (alg, digest) in &self.entries {
            written += alg.marshal(out);
            written += (digest.len() as u16).marshal(out);
            out.write(digest);
            written += digest.len();
        }
        written
    }

    pub fn unmarshal<I: Input + ?Sized>(input: &mut I) -> Result<Self, CodecError> {
        NvHeader::unmarshal(input, PCR_POLICY_RECORD, PCR_POLICY_MAGIC, PCR_POLICY_VERSION)?;
        let array_size = u16::unmarshal(input, PCR_POLICY_RECORD, "array_size")? as usize;
        if array_size != NUM_POLICY_PCR_GROUP {
            return Err(CodecError::size(PCR_POLICY_RECORD, "array_size", NUM_POLICY_PCR_GROUP, array_size));
        }
        let mut entries = Vec::with_capacity(array_size);
        for _ in 0..array_size {
            let alg = u16::unmarshal(input, PCR_POLICY_RECORD, "hash_alg")?;
            let len = u16::unmarshal(input, PCR_POLICY_RECORD, "policy")? as usize;
            let mut digest = vec![0u8; len];
            input.read(PCR_POLICY_RECORD, "policy", &mut digest)?;
            entries.push((alg, digest));
        }
        Ok(PcrPolicySet { entries })
    }
}

const PCR_AUTHVALUE_RECORD: &str = "PCR_AUTHVALUE";

/// Fixed-cardinality digest array (spec §4.3 "PCR authvalue set"),
/// cardinality checked against `NUM_AUTHVALUE_PCR_GROUP`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcrAuthvalueSet {
    pub auth: Vec<Vec<u8>>,
}

impl PcrAuthvalueSet {
    pub fn marshal<O: Output + ?Sized>(&self, out: &mut O) -> usize {
        let mut written = NvHeader::new(PCR_AUTHVALUE_VERSION, PCR_AUTHVALUE_MAGIC).marshal(out);
        written += (self.auth.len() as u16).marshal(out);
        for digest in &self.auth {
            written += (digest.len() as u16).marshal(out);
            out.write(digest);
            written += digest.len();
        }
        written
    }

    pub fn unmarshal<I: Input + ?Sized>(input: &mut I) -> Result<Self, CodecError> {
        NvHeader::unmarshal(input, PCR_AUTHVALUE_RECORD, PCR_AUTHVALUE_MAGIC, PCR_AUTHVALUE_VERSION)?;
        let array_size = u16::unmarshal(input, PCR_AUTHVALUE_RECORD, "array_size")? as usize;
        if array_size != NUM_AUTHVALUE_PCR_GROUP {
            return Err(CodecError::size(PCR_AUTHVALUE_RECORD, "array_size", NUM_AUTHVALUE_PCR_GROUP, array_size));
        }
        let mut auth = Vec::with_capacity(array_size);
        for _ in 0..array_size {
            let len = u16::unmarshal(input, PCR_AUTHVALUE_RECORD, "auth")? as usize;
            let mut digest = vec![0u8; len];
            input.read(PCR_AUTHVALUE_RECORD, "auth", &mut digest)?;
            auth.push(digest);
        }
        Ok(PcrAuthvalueSet { auth })
    }
}

/// Whether the ambient configuration's SHA-384/512 gate permits a digest
/// bank of the given algorithm to appear (spec §9 "algorithm-tagged
/// unions").
pub fn bank_allowed(config: &AmbientConfig, alg: u16) -> bool {
    match alg {
        TPM_ALG_SHA384 | TPM_ALG_SHA512 => config.sha384_or_sha512,
        _ => true,
    }
}
