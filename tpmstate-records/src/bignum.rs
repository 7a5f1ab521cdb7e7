//! Big-number records (spec §3, §9 "cross-architecture radix
//! recomposition"): `bn_prime_t`, an RSA prime or CRT coefficient, and
//! `privateExponent_t`, the four-prime RSA private-key tail.
//!
//! The original stores each `bn_prime_t` as an array of machine-native
//! "limbs" (32 or 64 bits depending on the build's `RADIX_BITS`) but always
//! serializes and deserializes at 32-bit granularity — a 64-bit build splits
//! each limb into two big-endian half-words on the wire, and a reader
//! recombines pairs of 32-bit words into native limbs regardless of its own
//! radix. Rust has no equivalent "native limb width" here, so [`BnPrime`]
//! models the value directly as the wire's true unit: a big-endian sequence
//! of `u32` words, high word first. This is wire-compatible with any
//! original-implementation build (the recomposition the original performs
//! when its radix is 64 bits is exactly the inverse of treating the words as
//! one continuous big-endian integer) without needing a notion of native
//! word width on the Rust side.

use tpmstate_types::{CodecError, Input, Marshal, NvHeader, Output, Unmarshal};

use crate::consts::{BN_PRIME_MAGIC, BN_PRIME_VERSION, PRIVATE_EXPONENT_MAGIC, PRIVATE_EXPONENT_VERSION};

const BN_PRIME_RECORD: &str = "BN_PRIME";

/// An arbitrary-precision unsigned integer, stored as big-endian 32-bit
/// words (spec §9).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BnPrime {
    pub words: Vec<u32>,
}

impl BnPrime {
    pub fn marshal<O: Output + ?Sized>(&self, out: &mut O) -> usize {
        let mut written = NvHeader::new(BN_PRIME_VERSION, BN_PRIME_MAGIC).marshal(out);
        let numbytes = (self.words.len() * 4) as u16;
        written += numbytes.marshal(out);
        for word in &self.words {
            written += word.marshal(out);
        }
        written
    }

    /// `max_words` is the reader's allocated limb capacity (spec §9 "Require
    /// size larger than allocated" in the original): unlike most size checks
    /// in this catalog, this one is a capacity bound (`LE`), not an exact
    /// match, since a smaller stored value is perfectly valid.
    pub fn unmarshal<I: Input + ?Sized>(input: &mut I, max_words: usize) -> Result<Self, CodecError> {
        NvHeader::unmarshal(input, BN_PRIME_RECORD, BN_PRIME_MAGIC, BN_PRIME_VERSION)?;
        let numbytes = u16::unmarshal(input, BN_PRIME_RECORD, "numbytes")? as usize;
        if numbytes % 4 != 0 {
            return Err(CodecError::bad_parameter(
                BN_PRIME_RECORD,
                "numbytes",
                format!("byte count {numbytes} is not a multiple of the 32-bit word size"),
            ));
        }
        let word_count = numbytes / 4;
        if word_count > max_words {
            return Err(CodecError::size(BN_PRIME_RECORD, "words", max_words, word_count));
        }
        let mut words = Vec::with_capacity(word_count);
        for _ in 0..word_count {
            words.push(u32::unmarshal(input, BN_PRIME_RECORD, "word")?);
        }
        Ok(BnPrime { words })
    }
}

const PRIVATE_EXPONENT_RECORD: &str = "PRIVATE_EXPONENT";

/// The CRT-form RSA private-key tail: two primes and two CRT coefficients
/// (spec §3 "private-exponent").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivateExponent {
    pub q: BnPrime,
    pub d_p: BnPrime,
    pub d_q: BnPrime,
    pub q_inv: BnPrime,
}

impl PrivateExponent {
    pub fn marshal<O: Output + ?Sized>(&self, out: &mut O) -> usize {
        let mut written = NvHeader::new(PRIVATE_EXPONENT_VERSION, PRIVATE_EXPONENT_MAGIC).marshal(out);
        written += self.q.marshal(out);
        written += self.d_p.marshal(out);
        written += self.d_q.marshal(out);
        written += self.q_inv.marshal(out);
        written
    }

    pub fn unmarshal<I: Input + ?Sized>(input: &mut I, max_words: usize) -> Result<Self, CodecError> {
        NvHeader::unmarshal(input, PRIVATE_EXPONENT_RECORD, PRIVATE_EXPONENT_MAGIC, PRIVATE_EXPONENT_VERSION)?;
        let q = BnPrime::unmarshal(input, max_words)?;
        let d_p = BnPrime::unmarshal(input, max_words)?;
        let d_q = BnPrime::unmarshal(input, max_words)?;
        let q_inv = BnPrime::unmarshal(input, max_words)?;
        Ok(PrivateExponent { q, d_p, d_q, q_inv })
    }
}
