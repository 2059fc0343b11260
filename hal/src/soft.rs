//! # Software Reference Platform
//!
//! An in-memory TPM 1.2 that implements [`TpmDriver`]. It stands in for
//! the firmware on hosts and emulators: a SHA-1 PCR bank, a bounded event
//! log area, and the MOR control byte. Faults can be injected per
//! primitive, and every call is counted.

use crate::firmware::{tcg_status, RawEvent};
use crate::{Digest, DriverError, DriverResult, MorFlags, TpmDriver, PCR_COUNT};
use alloc::vec::Vec;
use bitflags::bitflags;

/// Default log area size (64 KiB, as reserved by PC Client BIOSes)
pub const DEFAULT_LOG_CAPACITY: usize = 64 * 1024;

bitflags! {
    /// Primitives that fail with `TCG_PC_TPMERROR` when set
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SoftFaults: u8 {
        /// `read_pcr`
        const READ_PCR = 1 << 0;
        /// `log_area`
        const READ_LOG = 1 << 1;
        /// `extend`
        const EXTEND = 1 << 2;
        /// `append_log`
        const APPEND_LOG = 1 << 3;
        /// `write_mor`
        const WRITE_MOR = 1 << 4;
    }
}

/// Number of calls made to each primitive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `probe`
    pub probes: usize,
    /// `read_pcr`
    pub pcr_reads: usize,
    /// `log_area`
    pub log_reads: usize,
    /// `extend`, including the extend inside `hash_log_extend`
    pub extends: usize,
    /// `append_log`, including the append inside `hash_log_extend`
    pub appends: usize,
    /// `write_mor`
    pub mor_writes: usize,
}

impl CallCounts {
    /// Calls other than `probe`
    pub const fn hardware_calls(&self) -> usize {
        self.pcr_reads + self.log_reads + self.extends + self.appends + self.mor_writes
    }
}

/// In-memory TPM 1.2
#[derive(Debug, Clone)]
pub struct SoftTpm {
    present: bool,
    pcrs: [Digest; PCR_COUNT as usize],
    log: Vec<u8>,
    log_capacity: usize,
    mor: Option<MorFlags>,
    faults: SoftFaults,
    calls: CallCounts,
}

impl Default for SoftTpm {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftTpm {
    /// Create a present TPM with reset PCRs and an empty log
    pub fn new() -> Self {
        Self {
            present: true,
            pcrs: [Digest::ZERO; PCR_COUNT as usize],
            log: Vec::new(),
            log_capacity: DEFAULT_LOG_CAPACITY,
            mor: None,
            faults: SoftFaults::empty(),
            calls: CallCounts::default(),
        }
    }

    /// Create a platform without a TPM
    pub fn absent() -> Self {
        Self {
            present: false,
            ..Self::new()
        }
    }

    /// Limit the size of the log area
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    /// Record a pre-boot measurement the way firmware would before handing
    /// control to the boot loader
    ///
    /// The event data is hashed, the PCR extended, and the record logged.
    /// Call counters are left untouched. Events for a PCR outside the bank
    /// are ignored.
    pub fn with_preboot_event(mut self, pcr_index: u32, event_type: u32, data: &[u8]) -> Self {
        let digest = Digest::sha1(data);
        let record = RawEvent {
            pcr_index,
            event_type,
            digest,
            data,
        };
        if let (Some(slot), Ok(bytes)) = (self.pcrs.get_mut(pcr_index as usize), record.to_bytes()) {
            *slot = slot.extend_sha1(&digest);
            self.log.extend_from_slice(&bytes);
        }
        self
    }

    /// Make the selected primitives fail
    pub fn set_faults(&mut self, faults: SoftFaults) {
        self.faults = faults;
    }

    /// Make the TPM appear or disappear
    pub fn set_present(&mut self, present: bool) {
        self.present = present;
    }

    /// Calls made so far
    pub const fn calls(&self) -> CallCounts {
        self.calls
    }

    /// Last MOR value written
    pub const fn mor(&self) -> Option<MorFlags> {
        self.mor
    }

    /// Current PCR value without counting a read
    pub fn pcr(&self, index: u32) -> Option<Digest> {
        self.pcrs.get(index as usize).copied()
    }

    /// Bytes of the log area in use
    pub fn log_len(&self) -> usize {
        self.log.len()
    }

    fn check(&self, fault: SoftFaults) -> DriverResult<()> {
        if !self.present {
            return Err(DriverError::NotPresent);
        }
        if self.faults.contains(fault) {
            return Err(DriverError::Firmware(tcg_status::TCG_PC_TPMERROR));
        }
        Ok(())
    }

    fn check_index(&self, index: u32) -> DriverResult<usize> {
        if index >= PCR_COUNT {
            return Err(DriverError::InvalidPcrIndex(index));
        }
        Ok(index as usize)
    }

    fn check_log_room(&self, record: &[u8]) -> DriverResult<()> {
        if self.log.len() + record.len() > self.log_capacity {
            return Err(DriverError::LogFull);
        }
        Ok(())
    }
}

impl TpmDriver for SoftTpm {
    fn probe(&mut self) -> bool {
        self.calls.probes += 1;
        self.present
    }

    fn read_pcr(&mut self, index: u32) -> DriverResult<Digest> {
        self.calls.pcr_reads += 1;
        self.check(SoftFaults::READ_PCR)?;
        let slot = self.check_index(index)?;
        Ok(self.pcrs[slot])
    }

    fn log_area(&mut self) -> DriverResult<&[u8]> {
        self.calls.log_reads += 1;
        self.check(SoftFaults::READ_LOG)?;
        Ok(&self.log)
    }

    fn extend(&mut self, index: u32, digest: &Digest) -> DriverResult<Digest> {
        self.calls.extends += 1;
        self.check(SoftFaults::EXTEND)?;
        let slot = self.check_index(index)?;
        self.pcrs[slot] = self.pcrs[slot].extend_sha1(digest);
        log::debug!("soft TPM: PCR[{}] extended to {:x}", index, self.pcrs[slot]);
        Ok(self.pcrs[slot])
    }

    fn append_log(&mut self, record: &[u8]) -> DriverResult<()> {
        self.calls.appends += 1;
        self.check(SoftFaults::APPEND_LOG)?;
        self.check_log_room(record)?;
        self.log.extend_from_slice(record);
        Ok(())
    }

    fn hash_log_extend(&mut self, index: u32, digest: &Digest, record: &[u8]) -> DriverResult<Digest> {
        // Every precondition is checked before either half takes effect.
        self.calls.extends += 1;
        self.calls.appends += 1;
        self.check(SoftFaults::EXTEND)?;
        self.check(SoftFaults::APPEND_LOG)?;
        let slot = self.check_index(index)?;
        self.check_log_room(record)?;

        self.pcrs[slot] = self.pcrs[slot].extend_sha1(digest);
        self.log.extend_from_slice(record);
        Ok(self.pcrs[slot])
    }

    fn write_mor(&mut self, flags: MorFlags) -> DriverResult<()> {
        self.calls.mor_writes += 1;
        self.check(SoftFaults::WRITE_MOR)?;
        self.mor = Some(flags);
        log::debug!("soft TPM: MOR control set to {:#04x}", flags.bits());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firmware::EVENT_HEADER_SIZE;
    use crate::DIGEST_SIZE;
    use sha1::{Digest as _, Sha1};

    #[test]
    fn test_extend_matches_sha1() {
        let mut tpm = SoftTpm::new();
        let measurement = Digest::new([0x42; DIGEST_SIZE]);
        let value = tpm.extend(4, &measurement).unwrap();

        let mut input = [0u8; 2 * DIGEST_SIZE];
        input[DIGEST_SIZE..].copy_from_slice(&[0x42; DIGEST_SIZE]);
        let expected: [u8; DIGEST_SIZE] = Sha1::digest(input).into();

        assert_eq!(value.as_bytes(), &expected);
        assert_eq!(tpm.read_pcr(4).unwrap(), value);
        assert!(tpm.read_pcr(5).unwrap().is_zero());
    }

    #[test]
    fn test_invalid_index() {
        let mut tpm = SoftTpm::new();
        assert_eq!(tpm.read_pcr(PCR_COUNT), Err(DriverError::InvalidPcrIndex(PCR_COUNT)));
        assert_eq!(
            tpm.extend(99, &Digest::ZERO),
            Err(DriverError::InvalidPcrIndex(99))
        );
    }

    #[test]
    fn test_absent() {
        let mut tpm = SoftTpm::absent();
        assert!(!tpm.probe());
        assert_eq!(tpm.read_pcr(0), Err(DriverError::NotPresent));
    }

    #[test]
    fn test_preboot_events() {
        let mut tpm = SoftTpm::new()
            .with_preboot_event(0, 0x08, b"CRTM 1.0")
            .with_preboot_event(0, 0x04, &[0, 0, 0, 0]);

        assert!(!tpm.pcr(0).unwrap().is_zero());
        assert_eq!(tpm.calls(), CallCounts::default());

        let log = tpm.log_area().unwrap();
        let (first, used) = RawEvent::parse(log).unwrap();
        assert_eq!(first.data, b"CRTM 1.0");
        let (second, _) = RawEvent::parse(&log[used..]).unwrap();
        assert_eq!(second.event_type, 0x04);
    }

    #[test]
    fn test_hash_log_extend_is_all_or_nothing() {
        let mut tpm = SoftTpm::new().with_log_capacity(EVENT_HEADER_SIZE);
        let record = RawEvent {
            pcr_index: 8,
            event_type: 0x0D,
            digest: Digest::new([1; DIGEST_SIZE]),
            data: b"x",
        }
        .to_bytes()
        .unwrap();

        assert_eq!(
            tpm.hash_log_extend(8, &Digest::new([1; DIGEST_SIZE]), &record),
            Err(DriverError::LogFull)
        );
        assert!(tpm.pcr(8).unwrap().is_zero());
        assert_eq!(tpm.log_len(), 0);
    }

    #[test]
    fn test_append_past_capacity_is_log_full() {
        let mut tpm = SoftTpm::new().with_log_capacity(EVENT_HEADER_SIZE + 1);
        assert_eq!(tpm.append_log(&[0xAA; EVENT_HEADER_SIZE + 2]), Err(DriverError::LogFull));
        assert_eq!(tpm.log_len(), 0);

        tpm.append_log(&[0xAA; EVENT_HEADER_SIZE + 1]).unwrap();
        assert_eq!(tpm.append_log(&[0xAA]), Err(DriverError::LogFull));
        assert_eq!(tpm.calls().appends, 3);
    }

    #[test]
    fn test_fault_injection() {
        let mut tpm = SoftTpm::new();
        tpm.set_faults(SoftFaults::WRITE_MOR);

        assert_eq!(
            tpm.write_mor(MorFlags::CLEAR_MEMORY),
            Err(DriverError::Firmware(tcg_status::TCG_PC_TPMERROR))
        );
        assert_eq!(tpm.mor(), None);
        assert!(tpm.read_pcr(0).is_ok());
        assert_eq!(tpm.calls().hardware_calls(), 2);
    }
}
