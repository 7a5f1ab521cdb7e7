//! State-clear data (spec §3, §4.3): the subset of state reset by
//! TPM2_Clear, covering platform hierarchy enable flags and the PCR
//! state that's re-seeded on clear. No skip blocks in this record.

use tpmstate_types::{ByteArray, CodecError, Input, Marshal, NvHeader, Output, Unmarshal};

use crate::consts::{STATE_CLEAR_DATA_MAGIC, STATE_CLEAR_DATA_VERSION};
use crate::pcr::{PcrAuthvalueSet, PcrSave};

const RECORD: &str = "STATE_CLEAR_DATA";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateClearData {
    pub sh_enable: bool,
    pub eh_enable: bool,
    pub ph_enable_nv: bool,
    pub platform_alg: u16,
    pub platform_policy: Vec<u8>,
    pub platform_auth: Vec<u8>,
    pub pcr_save: PcrSave,
    pub pcr_auth_values: PcrAuthvalueSet,
}

impl StateClearData {
    pub fn marshal<O: Output + ?Sized>(&self, out: &mut O) -> usize {
        let mut written = NvHeader::new(STATE_CLEAR_DATA_VERSION, STATE_CLEAR_DATA_MAGIC).marshal(out);
        written += self.sh_enable.marshal(out);
        written += self.eh_enable.marshal(out);
        written += self.ph_enable_nv.marshal(out);
        written += self.platform_alg.marshal(out);
        written += ByteArray::new(self.platform_policy.clone()).marshal(out);
        written += ByteArray::new(self.platform_auth.clone()).marshal(out);
        written += self.pcr_save.marshal(out);
        written += self.pcr_auth_values.marshal(out);
        written
    }

    pub fn unmarshal<I: Input + ?Sized>(input: &mut I) -> Result<Self, CodecError> {
        NvHeader::unmarshal(input, RECORD, STATE_CLEAR_DATA_MAGIC, STATE_CLEAR_DATA_VERSION)?;
        let sh_enable = bool::unmarshal(input, RECORD, "sh_enable")?;
        let eh_enable = bool::unmarshal(input, RECORD, "eh_enable")?;
        let ph_enable_nv = bool::unmarshal(input, RECORD, "ph_enable_nv")?;
        let platform_alg = u16::unmarshal(input, RECORD, "platform_alg")?;
        let platform_policy = ByteArray::unmarshal(input, RECORD, "platform_policy")?.0;
        let platform_auth = ByteArray::unmarshal(input, RECORD, "platform_auth")?.0;
        let pcr_save = PcrSave::unmarshal(input)?;
        let pcr_auth_values = PcrAuthvalueSet::unmarshal(input)?;

        Ok(StateClearData {
            sh_enable,
            eh_enable,
            ph_enable_nv,
            platform_alg,
            platform_policy,
            platform_auth,
            pcr_save,
            pcr_auth_values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{NUM_AUTHVALUE_PCR_GROUP, NUM_STATIC_PCR};
    use crate::pcr::DigestBank;
    use tpmstate_types::{SliceInput, VecOutput};

    fn sample() -> StateClearData {
        StateClearData {
            sh_enable: true,
            eh_enable: false,
            ph_enable_nv: true,
            platform_alg: 0x000b,
            platform_policy: vec![0x11; 32],
            platform_auth: vec![0x22; 32],
            pcr_save: PcrSave {
                banks: DigestBank {
                    sha1: Some(vec![0x33; 20 * NUM_STATIC_PCR]),
                    sha256: None,
                    sha384: None,
                    sha512: None,
                },
            },
            pcr_auth_values: PcrAuthvalueSet { auth: vec![vec![0x44; 32]; NUM_AUTHVALUE_PCR_GROUP] },
        }
    }

    #[test]
    fn roundtrip() {
        let data = sample();
        let mut out = VecOutput::new();
        data.marshal(&mut out);
        let mut input = SliceInput::new(&out.0);
        let read_back = StateClearData::unmarshal(&mut input).unwrap();
        assert_eq!(read_back, data);
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn bad_tag_on_magic_mismatch() {
        let mut out = VecOutput::new();
        NvHeader::new(STATE_CLEAR_DATA_VERSION, 0xdead_beef).marshal(&mut out);
        let mut input = SliceInput::new(&out.0);
        let err = StateClearData::unmarshal(&mut input).unwrap_err();
        assert!(matches!(err, CodecError::BadTag { .. }));
    }
}
