//! `VOLATILE_STATE` (spec §4.4): the live runtime image, gated section by
//! gated section, field order grounded in `SPEC_FULL.md` §4.3's "VOLATILE_STATE
//! global section" supplement (itself read from
//! `original_source/src/tpm2/NVMarshal.c`'s `VolatileState_Marshal`).

use tpmstate_records::consts::VOLATILE_STATE_MAGIC;
use tpmstate_records::{
    AnyObject, ObjectAttributes, OrderlyData, Pcr, SessionSlot, StateClearData, StateResetData,
};
use tpmstate_types::{
    marshal_trailing_magic, skip_begin, skip_end, unmarshal_trailing_magic, AmbientConfig, ByteArray, CodecError,
    Input, Marshal, NvHeader, Output, SkipDecision, SkipWriter, Unmarshal,
};

const RECORD: &str = "VOLATILE_STATE";
const VOLATILE_STATE_VERSION: u16 = 1;

/// One row of the session-process table: the live per-session bookkeeping
/// the command dispatcher consults every command, distinct from the
/// persisted `Session`/`SessionSlot` records (spec §4.3 supplement
/// "per-slot handle/attributes/associated-handle/nonce/auth-value rows").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProcessEntry {
    pub handle: u32,
    pub attributes: u32,
    pub associated_handle: u32,
    pub nonce: Vec<u8>,
    pub auth_value: Vec<u8>,
}

impl SessionProcessEntry {
    fn marshal<O: Output + ?Sized>(&self, out: &mut O) -> usize {
        let mut written = self.handle.marshal(out);
        written += self.attributes.marshal(out);
        written += self.associated_handle.marshal(out);
        written += ByteArray::new(self.nonce.clone()).marshal(out);
        written += ByteArray::new(self.auth_value.clone()).marshal(out);
        written
    }

    fn unmarshal<I: Input + ?Sized>(input: &mut I) -> Result<Self, CodecError> {
        let handle = u32::unmarshal(input, RECORD, "session_process.handle")?;
        let attributes = u32::unmarshal(input, RECORD, "session_process.attributes")?;
        let associated_handle = u32::unmarshal(input, RECORD, "session_process.associated_handle")?;
        let nonce = ByteArray::unmarshal(input, RECORD, "session_process.nonce")?.0;
        let auth_value = ByteArray::unmarshal(input, RECORD, "session_process.auth_value")?.0;
        Ok(SessionProcessEntry { handle, attributes, associated_handle, nonce, auth_value })
    }
}

/// The `SESSION_PROCESS`-gated table (spec §4.3 supplement): per-slot rows,
/// the three well-known session indices, an optional command-audit cpHash,
/// and the trailing `daPendingOnNv` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProcessTable {
    pub entries: Vec<SessionProcessEntry>,
    pub encrypt_session_index: u32,
    pub decrypt_session_index: u32,
    pub audit_session_index: u32,
    pub command_audit_c_p_hash: Option<Vec<u8>>,
    pub da_pending_on_nv: bool,
}

impl SessionProcessTable {
    fn marshal<O: Output + ?Sized>(&self, out: &mut O, config: &AmbientConfig) -> usize {
        let mut written = (self.entries.len() as u16).marshal(out);
        for entry in &self.entries {
            written += entry.marshal(out);
        }
        written += self.encrypt_session_index.marshal(out);
        written += self.decrypt_session_index.marshal(out);
        written += self.audit_session_index.marshal(out);

        let mut skip = SkipWriter::new();
        written += skip.push(out, config.command_audit_digest);
        if config.command_audit_digest {
            let digest = self.command_audit_c_p_hash.as_ref().expect("command_audit_digest set without cpHash");
            written += ByteArray::new(digest.clone()).marshal(out);
        }
        skip.pop(out);
        skip.finish();

        written += self.da_pending_on_nv.marshal(out);
        written
    }

    fn unmarshal<I: Input + ?Sized>(input: &mut I, config: &AmbientConfig, local_entries_len: usize) -> Result<Self, CodecError> {
        let array_size = u16::unmarshal(input, RECORD, "session_process.entries")? as usize;
        if array_size != local_entries_len {
            return Err(CodecError::size(RECORD, "session_process.entries", local_entries_len, array_size));
        }
        let mut entries = Vec::with_capacity(array_size);
        for _ in 0..array_size {
            entries.push(SessionProcessEntry::unmarshal(input)?);
        }
        let encrypt_session_index = u32::unmarshal(input, RECORD, "encrypt_session_index")?;
        let decrypt_session_index = u32::unmarshal(input, RECORD, "decrypt_session_index")?;
        let audit_session_index = u32::unmarshal(input, RECORD, "audit_session_index")?;

        let decision = skip_begin(input, config.command_audit_digest, RECORD, "command_audit_c_p_hash")?;
        let remaining_before = input.remaining();
        let command_audit_c_p_hash = if let SkipDecision::Present { .. } = decision {
            Some(ByteArray::unmarshal(input, RECORD, "command_audit_c_p_hash")?.0)
        } else {
            None
        };
        skip_end(decision, remaining_before, input.remaining(), RECORD, "command_audit_c_p_hash")?;

        let da_pending_on_nv = bool::unmarshal(input, RECORD, "da_pending_on_nv")?;
        Ok(SessionProcessTable {
            entries,
            encrypt_session_index,
            decrypt_session_index,
            audit_session_index,
            command_audit_c_p_hash,
            da_pending_on_nv,
        })
    }
}

/// The dictionary-attack timer pair, carried live only when the self-heal
/// timer is *not* being accumulated into persistent orderly data (spec §4.3
/// supplement: "written only when the orderly-data self-heal timer is not
/// being accumulated persistently").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaTimers {
    pub self_heal_timer: u64,
    pub lockout_timer: u64,
}

/// `evictNvEnd`, the index-orderly-RAM shadow, and `maxCounter` (spec §4.3
/// supplement "an `NV`-gated skip block").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NvCacheState {
    pub evict_nv_end: u32,
    pub index_orderly_ram: crate::index_orderly_ram::IndexOrderlyRam,
    pub max_counter: u64,
}

/// The failure-mode diagnostic triplet, in an always-present skip block
/// (spec §4.3 supplement, §9 Open Question 3: the original gates this on a
/// disjunction that always evaluates true at shipped configurations; see
/// `DESIGN.md`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureTriplet {
    pub fail_function: u32,
    pub fail_line: u32,
    pub fail_code: u32,
}

/// The software clock pair, carried when the build does not have a
/// hardware clock (spec §4.3 supplement "a `HARDWARE_CLOCK`-negated skip
/// block").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftwareClock {
    pub real_time_previous: u64,
    pub tpm_time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolatileState {
    pub exclusive_audit_session: u32,
    pub time: u64,
    pub ph_enable: bool,
    pub pcr_re_config: bool,
    pub drtm_handle: u32,
    pub drtm_pre_startup: bool,
    pub startup_locality3: bool,
    pub da_used: Option<bool>,
    pub power_was_lost: bool,
    pub prev_orderly_state: u16,
    pub nv_ok: bool,
    pub platform_unique_details: Vec<u8>,
    pub orderly_data: OrderlyData,
    pub state_reset_data: StateResetData,
    pub state_clear_data: StateClearData,
    pub manufactured: bool,
    pub initialized: bool,
    pub session_process: Option<SessionProcessTable>,
    pub da_timers: Option<DaTimers>,
    pub nv_cache: Option<NvCacheState>,
    pub object_table: Option<Vec<AnyObject>>,
    pub pcr_table: Option<Vec<Pcr>>,
    pub session_table: Option<Vec<SessionSlot>>,
    pub oldest_saved_session: u32,
    pub free_session_slots: u32,
    pub in_failure_mode: bool,
    pub tpm_established: bool,
    pub failure_triplet: FailureTriplet,
    pub software_clock: Option<SoftwareClock>,
    pub timer_reset: bool,
    pub timer_stopped: bool,
    pub adjust_rate: u32,
    pub wall_clock_reading: u64,
}

/// Local build parameters [`VolatileState::unmarshal`] needs in order to
/// check every fixed-cardinality and exact-size field it reads — the
/// `tpmstate` equivalent of the per-field local-length arguments threaded
/// through the record catalog below it.
#[derive(Debug, Clone, Copy)]
pub struct VolatileStateLocalSizes {
    pub seed_len: usize,
    pub last_value_len: usize,
    pub context_array_len: usize,
    pub commit_array_len: usize,
    pub session_process_entries: usize,
    pub object_table_len: usize,
    pub pcr_table_len: usize,
    pub session_table_len: usize,
    pub nv_cache_capacity: usize,
    pub max_bn_words: usize,
}

impl VolatileState {
    pub fn marshal<O: Output + ?Sized>(&self, out: &mut O, config: &AmbientConfig) -> usize {
        let mut written = NvHeader::new(VOLATILE_STATE_VERSION, VOLATILE_STATE_MAGIC).marshal(out);
        written += self.exclusive_audit_session.marshal(out);
        written += self.time.marshal(out);
        written += self.ph_enable.marshal(out);
        written += self.pcr_re_config.marshal(out);
        written += self.drtm_handle.marshal(out);
        written += self.drtm_pre_startup.marshal(out);
        written += self.startup_locality3.marshal(out);

        let mut skip = SkipWriter::new();
        written += skip.push(out, config.use_da_used);
        if config.use_da_used {
            written += self.da_used.expect("use_da_used set without value").marshal(out);
        }
        skip.pop(out);
        skip.finish();

        written += self.power_was_lost.marshal(out);
        written += self.prev_orderly_state.marshal(out);
        written += self.nv_ok.marshal(out);
        written += ByteArray::new(self.platform_unique_details.clone()).marshal(out);
        written += self.orderly_data.marshal(out, config);
        written += self.state_reset_data.marshal(out, config, 0);
        written += self.state_clear_data.marshal(out);
        written += self.manufactured.marshal(out);
        written += self.initialized.marshal(out);

        let mut skip = SkipWriter::new();
        written += skip.push(out, config.session_process);
        if config.session_process {
            let table = self.session_process.as_ref().expect("session_process set without table");
            written += table.marshal(out, config);
        }
        skip.pop(out);
        skip.finish();

        let mut skip = SkipWriter::new();
        written += skip.push(out, config.dictionary_attack);
        if config.dictionary_attack {
            let mut inner_skip = SkipWriter::new();
            written += inner_skip.push(out, !config.accumulate_self_heal_timer);
            if !config.accumulate_self_heal_timer {
                let timers = self.da_timers.expect("dictionary_attack set without accumulation gives timers");
                written += timers.self_heal_timer.marshal(out);
                written += timers.lockout_timer.marshal(out);
            }
            inner_skip.pop(out);
            inner_skip.finish();
        }
        skip.pop(out);
        skip.finish();

        let mut skip = SkipWriter::new();
        written += skip.push(out, config.nv_cache);
        if config.nv_cache {
            let cache = self.nv_cache.as_ref().expect("nv_cache set without state");
            written += cache.evict_nv_end.marshal(out);
            written += cache.index_orderly_ram.marshal(out);
            written += cache.max_counter.marshal(out);
        }
        skip.pop(out);
        skip.finish();

        let mut skip = SkipWriter::new();
        written += skip.push(out, config.object_table);
        if config.object_table {
            let table = self.object_table.as_ref().expect("object_table set without slots");
            written += (table.len() as u16).marshal(out);
            for slot in table {
                written += slot.marshal(out, config);
            }
        }
        skip.pop(out);
        skip.finish();

        let mut skip = SkipWriter::new();
        written += skip.push(out, config.pcr_table);
        if config.pcr_table {
            let table = self.pcr_table.as_ref().expect("pcr_table set without slots");
            written += (table.len() as u16).marshal(out);
            for pcr in table {
                written += pcr.marshal(out);
            }
        }
        skip.pop(out);
        skip.finish();

        let mut skip = SkipWriter::new();
        written += skip.push(out, config.session_table);
        if config.session_table {
            let table = self.session_table.as_ref().expect("session_table set without slots");
            written += (table.len() as u16).marshal(out);
            for slot in table {
                written += slot.marshal(out);
            }
            written += self.oldest_saved_session.marshal(out);
            written += self.free_session_slots.marshal(out);
        }
        skip.pop(out);
        skip.finish();

        written += self.in_failure_mode.marshal(out);
        written += self.tpm_established.marshal(out);

        let mut skip = SkipWriter::new();
        written += skip.push(out, true);
        written += self.failure_triplet.fail_function.marshal(out);
        written += self.failure_triplet.fail_line.marshal(out);
        written += self.failure_triplet.fail_code.marshal(out);
        skip.pop(out);
        skip.finish();

        let mut skip = SkipWriter::new();
        written += skip.push(out, !config.hardware_clock);
        if !config.hardware_clock {
            let clock = self.software_clock.expect("software clock expected without hardware_clock");
            written += clock.real_time_previous.marshal(out);
            written += clock.tpm_time.marshal(out);
        }
        skip.pop(out);
        skip.finish();

        written += self.timer_reset.marshal(out);
        written += self.timer_stopped.marshal(out);
        written += self.adjust_rate.marshal(out);
        written += self.wall_clock_reading.marshal(out);

        written += marshal_trailing_magic(VOLATILE_STATE_MAGIC, out);
        written
    }

    pub fn unmarshal<I: Input + ?Sized>(
        input: &mut I,
        config: &AmbientConfig,
        sizes: VolatileStateLocalSizes,
    ) -> Result<Self, CodecError> {
        NvHeader::unmarshal(input, RECORD, VOLATILE_STATE_MAGIC, VOLATILE_STATE_VERSION)?;
        let exclusive_audit_session = u32::unmarshal(input, RECORD, "exclusive_audit_session")?;
        let time = u64::unmarshal(input, RECORD, "time")?;
        let ph_enable = bool::unmarshal(input, RECORD, "ph_enable")?;
        let pcr_re_config = bool::unmarshal(input, RECORD, "pcr_re_config")?;
        let drtm_handle = u32::unmarshal(input, RECORD, "drtm_handle")?;
        let drtm_pre_startup = bool::unmarshal(input, RECORD, "drtm_pre_startup")?;
        let startup_locality3 = bool::unmarshal(input, RECORD, "startup_locality3")?;

        let decision = skip_begin(input, config.use_da_used, RECORD, "da_used")?;
        let remaining_before = input.remaining();
        let da_used = if let SkipDecision::Present { .. } = decision {
            Some(bool::unmarshal(input, RECORD, "da_used")?)
        } else {
            None
        };
        skip_end(decision, remaining_before, input.remaining(), RECORD, "da_used")?;

        let power_was_lost = bool::unmarshal(input, RECORD, "power_was_lost")?;
        let prev_orderly_state = u16::unmarshal(input, RECORD, "prev_orderly_state")?;
        let nv_ok = bool::unmarshal(input, RECORD, "nv_ok")?;
        let platform_unique_details = ByteArray::unmarshal(input, RECORD, "platform_unique_details")?.0;
        let orderly_data = OrderlyData::unmarshal(input, config, sizes.seed_len, sizes.last_value_len)?;
        let state_reset_data = StateResetData::unmarshal(input, config, sizes.context_array_len, sizes.commit_array_len)?;
        let state_clear_data = StateClearData::unmarshal(input)?;
        let manufactured = bool::unmarshal(input, RECORD, "manufactured")?;
        let initialized = bool::unmarshal(input, RECORD, "initialized")?;

        let decision = skip_begin(input, config.session_process, RECORD, "session_process")?;
        let remaining_before = input.remaining();
        let session_process = if let SkipDecision::Present { .. } = decision {
            Some(SessionProcessTable::unmarshal(input, config, sizes.session_process_entries)?)
        } else {
            None
        };
        skip_end(decision, remaining_before, input.remaining(), RECORD, "session_process")?;

        let decision = skip_begin(input, config.dictionary_attack, RECORD, "dictionary_attack")?;
        let remaining_before = input.remaining();
        let da_timers = if let SkipDecision::Present { .. } = decision {
            let inner_decision = skip_begin(input, !config.accumulate_self_heal_timer, RECORD, "da_timers")?;
            let inner_remaining_before = input.remaining();
            let timers = if let SkipDecision::Present { .. } = inner_decision {
                let self_heal_timer = u64::unmarshal(input, RECORD, "self_heal_timer")?;
                let lockout_timer = u64::unmarshal(input, RECORD, "lockout_timer")?;
                Some(DaTimers { self_heal_timer, lockout_timer })
            } else {
                None
            };
            skip_end(inner_decision, inner_remaining_before, input.remaining(), RECORD, "da_timers")?;
            timers
        } else {
            None
        };
        skip_end(decision, remaining_before, input.remaining(), RECORD, "dictionary_attack")?;

        let decision = skip_begin(input, config.nv_cache, RECORD, "nv_cache")?;
        let remaining_before = input.remaining();
        let nv_cache = if let SkipDecision::Present { .. } = decision {
            let evict_nv_end = u32::unmarshal(input, RECORD, "evict_nv_end")?;
            let index_orderly_ram =
                crate::index_orderly_ram::IndexOrderlyRam::unmarshal(input, sizes.nv_cache_capacity)?;
            let max_counter = u64::unmarshal(input, RECORD, "max_counter")?;
            Some(NvCacheState { evict_nv_end, index_orderly_ram, max_counter })
        } else {
            None
        };
        skip_end(decision, remaining_before, input.remaining(), RECORD, "nv_cache")?;

        let decision = skip_begin(input, config.object_table, RECORD, "object_table")?;
        let remaining_before = input.remaining();
        let object_table = if let SkipDecision::Present { .. } = decision {
            let array_size = u16::unmarshal(input, RECORD, "object_table")? as usize;
            if array_size != sizes.object_table_len {
                return Err(CodecError::size(RECORD, "object_table", sizes.object_table_len, array_size));
            }
            let mut slots = Vec::with_capacity(array_size);
            for _ in 0..array_size {
                slots.push(AnyObject::unmarshal(input, config, |_: ObjectAttributes| false, 0, 0, sizes.max_bn_words)?);
            }
            Some(slots)
        } else {
            None
        };
        skip_end(decision, remaining_before, input.remaining(), RECORD, "object_table")?;

        let decision = skip_begin(input, config.pcr_table, RECORD, "pcr_table")?;
        let remaining_before = input.remaining();
        let pcr_table = if let SkipDecision::Present { .. } = decision {
            let array_size = u16::unmarshal(input, RECORD, "pcr_table")? as usize;
            if array_size != sizes.pcr_table_len {
                return Err(CodecError::size(RECORD, "pcr_table", sizes.pcr_table_len, array_size));
            }
            let mut slots = Vec::with_capacity(array_size);
            for _ in 0..array_size {
                slots.push(Pcr::unmarshal(input)?);
            }
            Some(slots)
        } else {
            None
        };
        skip_end(decision, remaining_before, input.remaining(), RECORD, "pcr_table")?;

        let decision = skip_begin(input, config.session_table, RECORD, "session_table")?;
        let remaining_before = input.remaining();
        let (session_table, oldest_saved_session, free_session_slots) = if let SkipDecision::Present { .. } = decision
        {
            let array_size = u16::unmarshal(input, RECORD, "session_table")? as usize;
            if array_size != sizes.session_table_len {
                return Err(CodecError::size(RECORD, "session_table", sizes.session_table_len, array_size));
            }
            let mut slots = Vec::with_capacity(array_size);
            for _ in 0..array_size {
                slots.push(SessionSlot::unmarshal(input, false)?);
            }
            let oldest = u32::unmarshal(input, RECORD, "oldest_saved_session")?;
            let free = u32::unmarshal(input, RECORD, "free_session_slots")?;
            (Some(slots), oldest, free)
        } else {
            (None, 0, 0)
        };
        skip_end(decision, remaining_before, input.remaining(), RECORD, "session_table")?;

        let in_failure_mode = bool::unmarshal(input, RECORD, "in_failure_mode")?;
        let tpm_established = bool::unmarshal(input, RECORD, "tpm_established")?;

        let decision = skip_begin(input, true, RECORD, "failure_triplet")?;
        let remaining_before = input.remaining();
        let fail_function = u32::unmarshal(input, RECORD, "fail_function")?;
        let fail_line = u32::unmarshal(input, RECORD, "fail_line")?;
        let fail_code = u32::unmarshal(input, RECORD, "fail_code")?;
        skip_end(decision, remaining_before, input.remaining(), RECORD, "failure_triplet")?;
        let failure_triplet = FailureTriplet { fail_function, fail_line, fail_code };

        let decision = skip_begin(input, !config.hardware_clock, RECORD, "software_clock")?;
        let remaining_before = input.remaining();
        let software_clock = if let SkipDecision::Present { .. } = decision {
            let real_time_previous = u64::unmarshal(input, RECORD, "real_time_previous")?;
            let tpm_time = u64::unmarshal(input, RECORD, "tpm_time")?;
            Some(SoftwareClock { real_time_previous, tpm_time })
        } else {
            None
        };
        skip_end(decision, remaining_before, input.remaining(), RECORD, "software_clock")?;

        let timer_reset = bool::unmarshal(input, RECORD, "timer_reset")?;
        let timer_stopped = bool::unmarshal(input, RECORD, "timer_stopped")?;
        let adjust_rate = u32::unmarshal(input, RECORD, "adjust_rate")?;
        let wall_clock_reading = u64::unmarshal(input, RECORD, "wall_clock_reading")?;

        unmarshal_trailing_magic(input, RECORD, VOLATILE_STATE_MAGIC)?;

        Ok(VolatileState {
            exclusive_audit_session,
            time,
            ph_enable,
            pcr_re_config,
            drtm_handle,
            drtm_pre_startup,
            startup_locality3,
            da_used,
            power_was_lost,
            prev_orderly_state,
            nv_ok,
            platform_unique_details,
            orderly_data,
            state_reset_data,
            state_clear_data,
            manufactured,
            initialized,
            session_process,
            da_timers,
            nv_cache,
            object_table,
            pcr_table,
            session_table,
            oldest_saved_session,
            free_session_slots,
            in_failure_mode,
            tpm_established,
            failure_triplet,
            software_clock,
            timer_reset,
            timer_stopped,
            adjust_rate,
            wall_clock_reading,
        })
    }

    /// Adds the wall-clock delta between `self.wall_clock_reading` (the
    /// writer's reading just before the trailing sentinel) and `now` to
    /// every live timer, so timer-based state resumes with continuity
    /// across a suspend/resume cycle (spec §4.4 "Time re-anchoring on
    /// load").
    pub fn reanchor_time(&mut self, now: u64) {
        let delta = now.saturating_sub(self.wall_clock_reading);
        self.time = self.time.saturating_add(delta);
        if let Some(clock) = self.software_clock.as_mut() {
            clock.real_time_previous = clock.real_time_previous.saturating_add(delta);
            clock.tpm_time = clock.tpm_time.saturating_add(delta);
        }
    }
}
