//! Orderly data (spec §3, §4.3): clock state and DRBG state written on
//! clean shutdown, plus an optional skip block carrying the self-heal
//! timer triplet when `ACCUMULATE_SELF_HEAL_TIMER` is enabled.

use tpmstate_types::{skip_begin, skip_end, AmbientConfig, CodecError, Input, Marshal, NvHeader, Output, SkipDecision, SkipWriter, Unmarshal};

use crate::consts::{ORDERLY_DATA_MAGIC, ORDERLY_DATA_VERSION};
use crate::drbg::DrbgState;

const RECORD: &str = "ORDERLY_DATA";

/// Self-heal timer triplet, carried only when `ACCUMULATE_SELF_HEAL_TIMER`
/// is set (spec §4.3 "Orderly data ... optional skip block containing
/// three 64-bit self-heal/lockout/time counters"; Scenario B's 24 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfHealTimers {
    pub self_heal_timer: u64,
    pub lockout_timer: u64,
    pub time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderlyData {
    pub clock: u64,
    pub clock_safe: bool,
    pub drbg_state: DrbgState,
    pub self_heal: Option<SelfHealTimers>,
}

impl OrderlyData {
    pub fn marshal<O: Output + ?Sized>(&self, out: &mut O, config: &AmbientConfig) -> usize {
        let mut written = NvHeader::new(ORDERLY_DATA_VERSION, ORDERLY_DATA_MAGIC).marshal(out);
        written += self.clock.marshal(out);
        written += self.clock_safe.marshal(out);
        written += self.drbg_state.marshal(out);

        let mut skip = SkipWriter::new();
        written += skip.push(out, config.accumulate_self_heal_timer);
        if config.accumulate_self_heal_timer {
            let timers = self.self_heal.expect("accumulate_self_heal_timer set without timer values");
            written += timers.self_heal_timer.marshal(out);
            written += timers.lockout_timer.marshal(out);
            written += timers.time.marshal(out);
        }
        skip.pop(out);
        skip.finish();
        written
    }

    pub fn unmarshal<I: Input + ?Sized>(
        input: &mut I,
        config: &AmbientConfig,
        local_seed_len: usize,
        local_last_value_len: usize,
    ) -> Result<Self, CodecError> {
        NvHeader::unmarshal(input, RECORD, ORDERLY_DATA_MAGIC, ORDERLY_DATA_VERSION)?;
        let clock = u64::unmarshal(input, RECORD, "clock")?;
        let clock_safe = bool::unmarshal(input, RECORD, "clock_safe")?;
        let drbg_state = DrbgState::unmarshal(input, local_seed_len, local_last_value_len)?;

        let decision = skip_begin(input, config.accumulate_self_heal_timer, RECORD, "self_heal_timer")?;
        let remaining_before = input.remaining();
        let self_heal = if let SkipDecision::Present { .. } = decision {
            let self_heal_timer = u64::unmarshal(input, RECORD, "self_heal_timer")?;
            let lockout_timer = u64::unmarshal(input, RECORD, "lockout_timer")?;
            let time = u64::unmarshal(input, RECORD, "time")?;
            Some(SelfHealTimers { self_heal_timer, lockout_timer, time })
        } else {
            None
        };
        skip_end(decision, remaining_before, input.remaining(), RECORD, "self_heal_timer")?;

        Ok(OrderlyData { clock, clock_safe, drbg_state, self_heal })
    }
}
