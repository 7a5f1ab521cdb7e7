//! Object and hash-sequence records (spec §3, §4.3 "hash-object", "object",
//! "any-object"): the per-slot contents of the runtime object table, and the
//! `occupied`-gated envelope every slot is wrapped in.

use tpmstate_types::{
    skip_begin, skip_end, AmbientConfig, ByteArray, CodecError, Input, Marshal, NvHeader, Output, SkipDecision,
    SkipWriter, Unmarshal,
};

use crate::bignum::PrivateExponent;
use crate::consts::{ANY_OBJECT_MAGIC, ANY_OBJECT_VERSION, HASH_OBJECT_MAGIC, HASH_OBJECT_VERSION, OBJECT_MAGIC, OBJECT_VERSION};
use crate::hash::{HashState, HmacState};

/// The `ANY_OBJECT`/`HASH_OBJECT` attributes word, treated as an opaque
/// bitfield the way the original casts it to a raw `UINT32 *` (spec §3
/// "Object slot. Attributes word read first"). Only the two bits this
/// catalog must branch on — `occupied`, `hashSeq`, `hmacSeq` — are given
/// names; every other bit round-trips untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectAttributes(pub u32);

impl ObjectAttributes {
    const OCCUPIED: u32 = 1 << 0;
    const HASH_SEQ: u32 = 1 << 5;
    const HMAC_SEQ: u32 = 1 << 6;

    pub fn occupied(self) -> bool {
        self.0 & Self::OCCUPIED != 0
    }

    pub fn hash_seq(self) -> bool {
        self.0 & Self::HASH_SEQ != 0
    }

    pub fn hmac_seq(self) -> bool {
        self.0 & Self::HMAC_SEQ != 0
    }
}

/// A running hash or HMAC sequence (spec §3 "Hash-object"): type, name-alg,
/// attributes, auth value, then either an array of hash states (`hashSeq`
/// set) or a single HMAC state (`hmacSeq` set).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashObject {
    pub object_type: u16,
    pub name_alg: u16,
    pub attributes: ObjectAttributes,
    pub auth: Vec<u8>,
    pub hash_states: Vec<HashState>,
    pub hmac_state: Option<HmacState>,
}

const HASH_OBJECT_RECORD: &str = "HASH_OBJECT";

impl HashObject {
    pub fn marshal<O: Output + ?Sized>(&self, out: &mut O) -> usize {
        let mut written = NvHeader::new(HASH_OBJECT_VERSION, HASH_OBJECT_MAGIC).marshal(out);
        written += self.object_type.marshal(out);
        written += self.name_alg.marshal(out);
        written += self.attributes.0.marshal(out);
        written += ByteArray::new(self.auth.clone()).marshal(out);
        if self.attributes.hash_seq() {
            written += (self.hash_states.len() as u16).marshal(out);
            for state in &self.hash_states {
                written += state.marshal(out);
            }
        } else if self.attributes.hmac_seq() {
            let hmac = self.hmac_state.as_ref().expect("hmacSeq set without hmac_state");
            written += hmac.marshal(out);
        }
        written
    }

    pub fn unmarshal<I: Input + ?Sized>(
        input: &mut I,
        local_hash_states_len: usize,
        local_hmac_key_len: usize,
    ) -> Result<Self, CodecError> {
        NvHeader::unmarshal(input, HASH_OBJECT_RECORD, HASH_OBJECT_MAGIC, HASH_OBJECT_VERSION)?;
        let object_type = u16::unmarshal(input, HASH_OBJECT_RECORD, "type")?;
        let name_alg = u16::unmarshal(input, HASH_OBJECT_RECORD, "name_alg")?;
        let attributes = ObjectAttributes(u32::unmarshal(input, HASH_OBJECT_RECORD, "attributes")?);
        let auth = ByteArray::unmarshal(input, HASH_OBJECT_RECORD, "auth")?.0;

        let mut hash_states = Vec::new();
        let mut hmac_state = None;
        if attributes.hash_seq() {
            let array_size = u16::unmarshal(input, HASH_OBJECT_RECORD, "hash_states")? as usize;
            if array_size != local_hash_states_len {
                return Err(CodecError::size(HASH_OBJECT_RECORD, "hash_states", local_hash_states_len, array_size));
            }
            for _ in 0..array_size {
                hash_states.push(HashState::unmarshal(input)?);
            }
        } else if attributes.hmac_seq() {
            hmac_state = Some(HmacState::unmarshal(input, local_hmac_key_len)?);
        }

        Ok(HashObject { object_type, name_alg, attributes, auth, hash_states, hmac_state })
    }
}

const OBJECT_RECORD: &str = "OBJECT";

/// An ordinary key object (spec §3 "Object"): public/sensitive areas (opaque
/// blobs — the cryptographic object layout itself is out of scope, per
/// spec.md's external-collaborator boundary), an RSA-only skip block
/// carrying the CRT private exponent, then the qualified name, evict handle
/// and name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    pub public_area: Vec<u8>,
    pub sensitive_area: Vec<u8>,
    pub private_exponent: Option<PrivateExponent>,
    pub qualified_name: Vec<u8>,
    pub evict_handle: u32,
    pub name: Vec<u8>,
}

impl Object {
    pub fn marshal<O: Output + ?Sized>(&self, out: &mut O, config: &AmbientConfig) -> usize {
        let mut written = NvHeader::new(OBJECT_VERSION, OBJECT_MAGIC).marshal(out);
        written += ByteArray::new(self.public_area.clone()).marshal(out);
        written += ByteArray::new(self.sensitive_area.clone()).marshal(out);

        let mut skip = SkipWriter::new();
        written += skip.push(out, config.rsa);
        if config.rsa {
            let pe = self.private_exponent.as_ref().expect("rsa configured without private_exponent");
            written += pe.marshal(out);
        }
        skip.pop(out);
        skip.finish();

        written += ByteArray::new(self.qualified_name.clone()).marshal(out);
        written += self.evict_handle.marshal(out);
        written += ByteArray::new(self.name.clone()).marshal(out);
        written
    }

    pub fn unmarshal<I: Input + ?Sized>(input: &mut I, config: &AmbientConfig, max_bn_words: usize) -> Result<Self, CodecError> {
        NvHeader::unmarshal(input, OBJECT_RECORD, OBJECT_MAGIC, OBJECT_VERSION)?;
        let public_area = ByteArray::unmarshal(input, OBJECT_RECORD, "public_area")?.0;
        let sensitive_area = ByteArray::unmarshal(input, OBJECT_RECORD, "sensitive_area")?.0;

        let decision = skip_begin(input, config.rsa, OBJECT_RECORD, "private_exponent")?;
        let remaining_before = input.remaining();
        let private_exponent = if let SkipDecision::Present { .. } = decision {
            Some(PrivateExponent::unmarshal(input, max_bn_words)?)
        } else {
            None
        };
        skip_end(decision, remaining_before, input.remaining(), OBJECT_RECORD, "private_exponent")?;

        let qualified_name = ByteArray::unmarshal(input, OBJECT_RECORD, "qualified_name")?.0;
        let evict_handle = u32::unmarshal(input, OBJECT_RECORD, "evict_handle")?;
        let name = ByteArray::unmarshal(input, OBJECT_RECORD, "name")?.0;

        Ok(Object { public_area, sensitive_area, private_exponent, qualified_name, evict_handle, name })
    }
}

const ANY_OBJECT_RECORD: &str = "ANY_OBJECT";

/// Whether a slot holds a hash/HMAC sequence object or an ordinary key
/// object (spec §3 "Object slot ... dispatch to hash-object or object by
/// the isSequence predicate").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnyObjectPayload {
    HashObject(HashObject),
    Object(Object),
}

/// A slot in the object table: the attributes word read first, gating
/// whether any payload follows at all (spec §3 "Object slot").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnyObject {
    pub attributes: ObjectAttributes,
    pub payload: Option<AnyObjectPayload>,
}

impl AnyObject {
    pub fn marshal<O: Output + ?Sized>(&self, out: &mut O, config: &AmbientConfig) -> usize {
        let mut written = NvHeader::new(ANY_OBJECT_VERSION, ANY_OBJECT_MAGIC).marshal(out);
        written += self.attributes.0.marshal(out);
        if !self.attributes.occupied() {
            return written;
        }
        written += match self.payload.as_ref().expect("occupied slot without payload") {
            AnyObjectPayload::HashObject(h) => h.marshal(out),
            AnyObjectPayload::Object(o) => o.marshal(out, config),
        };
        written
    }

    /// `is_sequence` mirrors the original's `ObjectIsSequence` predicate:
    /// the caller decides from the object type whether this slot, once
    /// known to be occupied, holds a hash-sequence or an ordinary object.
    pub fn unmarshal<I: Input + ?Sized>(
        input: &mut I,
        config: &AmbientConfig,
        is_sequence: impl FnOnce(ObjectAttributes) -> bool,
        local_hash_states_len: usize,
        local_hmac_key_len: usize,
        max_bn_words: usize,
    ) -> Result<Self, CodecError> {
        NvHeader::unmarshal(input, ANY_OBJECT_RECORD, ANY_OBJECT_MAGIC, ANY_OBJECT_VERSION)?;
        let attributes = ObjectAttributes(u32::unmarshal(input, ANY_OBJECT_RECORD, "attributes")?);
        if !attributes.occupied() {
            return Ok(AnyObject { attributes, payload: None });
        }
        let payload = if is_sequence(attributes) {
            AnyObjectPayload::HashObject(HashObject::unmarshal(input, local_hash_states_len, local_hmac_key_len)?)
        } else {
            AnyObjectPayload::Object(Object::unmarshal(input, config, max_bn_words)?)
        };
        Ok(AnyObject { attributes, payload: Some(payload) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpmstate_types::{SliceInput, VecOutput};

    #[test]
    fn unoccupied_slot_has_no_payload() {
        let slot = AnyObject { attributes: ObjectAttributes(0), payload: None };
        let mut out = VecOutput::new();
        let config = AmbientConfig::default();
        slot.marshal(&mut out, &config);
        assert_eq!(out.0.len(), 6 + 4); // frame + attributes only

        let mut input = SliceInput::new(&out.0);
        let read_back = AnyObject::unmarshal(&mut input, &config, |_| false, 0, 0, 64).unwrap();
        assert_eq!(read_back, slot);
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn occupied_object_slot_without_rsa_roundtrip() {
        let mut config = AmbientConfig::default();
        config.rsa = false;
        let object = Object {
            public_area: vec![0x01; 16],
            sensitive_area: vec![0x02; 16],
            private_exponent: None,
            qualified_name: vec![0x03; 32],
            evict_handle: 0x8100_0000,
            name: vec![0x04; 32],
        };
        let slot = AnyObject {
            attributes: ObjectAttributes(ObjectAttributes::OCCUPIED),
            payload: Some(AnyObjectPayload::Object(object)),
        };
        let mut out = VecOutput::new();
        slot.marshal(&mut out, &config);
        let mut input = SliceInput::new(&out.0);
        let read_back = AnyObject::unmarshal(&mut input, &config, |_| false, 0, 0, 64).unwrap();
        assert_eq!(read_back, slot);
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn occupied_hash_object_slot_roundtrip() {
        let config = AmbientConfig::default();
        let hash_object = HashObject {
            object_type: 0x0008,
            name_alg: 0x000b,
            attributes: ObjectAttributes(ObjectAttributes::OCCUPIED),
            auth: vec![0x05; 16],
            hash_states: Vec::new(),
            hmac_state: None,
        };
        let slot = AnyObject {
            attributes: ObjectAttributes(ObjectAttributes::OCCUPIED),
            payload: Some(AnyObjectPayload::HashObject(hash_object)),
        };
        let mut out = VecOutput::new();
        slot.marshal(&mut out, &config);
        let mut input = SliceInput::new(&out.0);
        let read_back = AnyObject::unmarshal(&mut input, &config, |_| true, 0, 0, 64).unwrap();
        assert_eq!(read_back, slot);
        assert_eq!(input.remaining(), 0);
    }
}
