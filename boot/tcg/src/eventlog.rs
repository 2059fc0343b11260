//! # Event Log Model
//!
//! Logical view of the TCG event log: an append-only, totally ordered list
//! of `TCG_PCR_EVENT` records written by firmware before the boot loader
//! runs and by [`measure`](crate::measure) afterwards.
//!
//! Decoding is lazy. [`EventLog::entries`] walks the log area from the
//! first record and can be restarted any number of times. A zero-filled
//! header marks the end of the used area; a truncated record ends the walk
//! with a [`LogDecodeError`].

use crate::digest::DigestEngine;
use crate::format::{EventData, SpacedHex};
use crate::pcr::{self, PcrBank};
use crate::Tpm;
use alloc::vec::Vec;
use core::fmt;
use tcgboot_hal::firmware::{is_log_terminator, RawEvent, RecordError};
use tcgboot_hal::{Digest, DriverResult, TpmDriver};

// =============================================================================
// EVENT TYPES
// =============================================================================

/// TCG PC Client event types (TPM 1.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// `EV_PREBOOT_CERT`
    PrebootCert,
    /// `EV_POST_CODE`
    PostCode,
    /// `EV_UNUSED`
    Unused,
    /// `EV_NO_ACTION`: informational, never extended into a PCR
    NoAction,
    /// `EV_SEPARATOR`
    Separator,
    /// `EV_ACTION`
    Action,
    /// `EV_EVENT_TAG`
    EventTag,
    /// `EV_S_CRTM_CONTENTS`
    SCrtmContents,
    /// `EV_S_CRTM_VERSION`
    SCrtmVersion,
    /// `EV_CPU_MICROCODE`
    CpuMicrocode,
    /// `EV_PLATFORM_CONFIG_FLAGS`
    PlatformConfigFlags,
    /// `EV_TABLE_OF_DEVICES`
    TableOfDevices,
    /// `EV_COMPACT_HASH`
    CompactHash,
    /// `EV_IPL`: boot-loader measurements
    Ipl,
    /// `EV_IPL_PARTITION_DATA`
    IplPartitionData,
    /// `EV_NONHOST_CODE`
    NonHostCode,
    /// `EV_NONHOST_CONFIG`
    NonHostConfig,
    /// `EV_NONHOST_INFO`
    NonHostInfo,
    /// `EV_OMIT_BOOT_DEVICE_EVENTS`
    OmitBootDeviceEvents,
    /// Platform-specific value
    Other(u32),
}

const EVENT_TYPES: [(EventType, u32, &str); 19] = [
    (EventType::PrebootCert, 0x00, "EV_PREBOOT_CERT"),
    (EventType::PostCode, 0x01, "EV_POST_CODE"),
    (EventType::Unused, 0x02, "EV_UNUSED"),
    (EventType::NoAction, 0x03, "EV_NO_ACTION"),
    (EventType::Separator, 0x04, "EV_SEPARATOR"),
    (EventType::Action, 0x05, "EV_ACTION"),
    (EventType::EventTag, 0x06, "EV_EVENT_TAG"),
    (EventType::SCrtmContents, 0x07, "EV_S_CRTM_CONTENTS"),
    (EventType::SCrtmVersion, 0x08, "EV_S_CRTM_VERSION"),
    (EventType::CpuMicrocode, 0x09, "EV_CPU_MICROCODE"),
    (EventType::PlatformConfigFlags, 0x0A, "EV_PLATFORM_CONFIG_FLAGS"),
    (EventType::TableOfDevices, 0x0B, "EV_TABLE_OF_DEVICES"),
    (EventType::CompactHash, 0x0C, "EV_COMPACT_HASH"),
    (EventType::Ipl, 0x0D, "EV_IPL"),
    (EventType::IplPartitionData, 0x0E, "EV_IPL_PARTITION_DATA"),
    (EventType::NonHostCode, 0x0F, "EV_NONHOST_CODE"),
    (EventType::NonHostConfig, 0x10, "EV_NONHOST_CONFIG"),
    (EventType::NonHostInfo, 0x11, "EV_NONHOST_INFO"),
    (EventType::OmitBootDeviceEvents, 0x12, "EV_OMIT_BOOT_DEVICE_EVENTS"),
];

impl EventType {
    /// Decode a raw event type
    pub fn from_raw(raw: u32) -> Self {
        EVENT_TYPES
            .iter()
            .find(|(_, value, _)| *value == raw)
            .map_or(EventType::Other(raw), |(ty, _, _)| *ty)
    }

    /// Look up an event type by its TCG name (`EV_IPL`)
    pub fn from_name(name: &str) -> Option<Self> {
        EVENT_TYPES
            .iter()
            .find(|(_, _, known)| known.eq_ignore_ascii_case(name))
            .map(|(ty, _, _)| *ty)
    }

    /// Raw event type value
    pub fn raw(self) -> u32 {
        match self {
            EventType::Other(raw) => raw,
            known => EVENT_TYPES
                .iter()
                .find(|(ty, _, _)| *ty == known)
                .map_or(0, |(_, value, _)| *value),
        }
    }

    /// TCG name, or `UNKNOWN` for platform-specific values
    pub fn name(self) -> &'static str {
        EVENT_TYPES
            .iter()
            .find(|(ty, _, _)| *ty == self)
            .map_or("UNKNOWN", |(_, _, name)| *name)
    }

    /// Check whether events of this type were extended into their PCR
    pub fn is_extended(self) -> bool {
        self != EventType::NoAction
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#010x})", self.name(), self.raw())
    }
}

// =============================================================================
// ENTRIES
// =============================================================================

/// One decoded event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLogEntry {
    /// PCR the digest was extended into
    pub pcr_index: u32,
    /// Event category
    pub event_type: EventType,
    /// Digest used for the extend
    pub digest: Digest,
    /// Event payload
    pub event_data: Vec<u8>,
}

impl EventLogEntry {
    /// Create an entry
    pub fn new(pcr_index: u32, event_type: EventType, digest: Digest, event_data: impl Into<Vec<u8>>) -> Self {
        Self {
            pcr_index,
            event_type,
            digest,
            event_data: event_data.into(),
        }
    }

    /// Encode as a `TCG_PCR_EVENT` record
    ///
    /// Fails if the event data does not fit the record's 32-bit size field.
    pub fn to_record(&self) -> Result<Vec<u8>, RecordError> {
        RawEvent {
            pcr_index: self.pcr_index,
            event_type: self.event_type.raw(),
            digest: self.digest,
            data: &self.event_data,
        }
        .to_bytes()
    }

    fn from_raw(raw: &RawEvent<'_>) -> Self {
        Self::new(
            raw.pcr_index,
            EventType::from_raw(raw.event_type),
            raw.digest,
            raw.data,
        )
    }
}

/// Numbered, multi-line rendering of an entry for the console
#[derive(Debug, Clone, Copy)]
pub struct EntryDisplay<'a> {
    /// 1-based position in the log
    pub position: usize,
    /// The entry
    pub entry: &'a EventLogEntry,
    /// Include the event payload
    pub show_data: bool,
}

impl fmt::Display for EntryDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}]", self.position)?;
        writeln!(f, "  pcrIndex:  {}", self.entry.pcr_index)?;
        writeln!(f, "  eventType: {}", self.entry.event_type)?;
        write!(f, "  digest:    {}", SpacedHex(self.entry.digest.as_bytes()))?;
        if self.show_data {
            write!(f, "\n  eventData: {}", EventData(&self.entry.event_data))?;
        }
        Ok(())
    }
}

// =============================================================================
// DECODING
// =============================================================================

/// A record that could not be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogDecodeError {
    /// Byte offset of the record in the log area
    pub offset: usize,
    /// What was wrong with it
    pub kind: RecordError,
}

impl fmt::Display for LogDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RecordError::TruncatedHeader { available } => write!(
                f,
                "truncated event header at offset {} ({} bytes left)",
                self.offset, available
            ),
            RecordError::TruncatedData { expected, available } => write!(
                f,
                "truncated event data at offset {} ({} of {} bytes)",
                self.offset, available, expected
            ),
            RecordError::DataTooLarge { len } => write!(
                f,
                "oversized event data at offset {} ({} bytes)",
                self.offset, len
            ),
        }
    }
}

/// View of an event log area
#[derive(Debug, Clone, Copy)]
pub struct EventLog<'a> {
    area: &'a [u8],
}

impl<'a> EventLog<'a> {
    /// Wrap the raw bytes of a log area
    pub const fn new(area: &'a [u8]) -> Self {
        Self { area }
    }

    /// Iterate over the entries from first to last
    pub fn entries(&self) -> Entries<'a> {
        Entries {
            rest: self.area,
            offset: 0,
            done: false,
        }
    }

    /// Entry at a 1-based position
    ///
    /// `Ok(None)` when the log has fewer entries. Position 0 never matches.
    pub fn entry(&self, position: usize) -> Result<Option<EventLogEntry>, LogDecodeError> {
        let Some(skip) = position.checked_sub(1) else {
            return Ok(None);
        };
        self.entries().nth(skip).transpose()
    }

    /// Number of entries
    pub fn len(&self) -> Result<usize, LogDecodeError> {
        self.entries().try_fold(0, |count, entry| entry.map(|_| count + 1))
    }

    /// Check if the log holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    /// Entries recorded against one PCR
    pub fn for_pcr(&self, pcr_index: u32) -> impl Iterator<Item = Result<EventLogEntry, LogDecodeError>> + 'a {
        self.entries()
            .filter(move |entry| entry.as_ref().map_or(true, |e| e.pcr_index == pcr_index))
    }

    /// Recompute a PCR from its reset value and the logged digests
    pub fn replay<E: DigestEngine + ?Sized>(
        &self,
        engine: &E,
        pcr_index: u32,
        initial: Digest,
    ) -> Result<Digest, LogDecodeError> {
        let mut digests = Vec::new();
        for entry in self.for_pcr(pcr_index) {
            let entry = entry?;
            if entry.event_type.is_extended() {
                digests.push(entry.digest);
            }
        }
        Ok(pcr::replay(engine, initial, digests))
    }

    /// Recompute every PCR from zero
    pub fn replay_all<E: DigestEngine + ?Sized>(&self, engine: &E) -> Result<PcrBank, LogDecodeError> {
        let mut bank = PcrBank::new();
        for entry in self.entries() {
            let entry = entry?;
            if entry.event_type.is_extended() {
                bank.extend(engine, entry.pcr_index, &entry.digest);
            }
        }
        Ok(bank)
    }
}

/// Lazy walk over a log area
#[derive(Debug, Clone)]
pub struct Entries<'a> {
    rest: &'a [u8],
    offset: usize,
    done: bool,
}

impl Iterator for Entries<'_> {
    type Item = Result<EventLogEntry, LogDecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.rest.is_empty() || is_log_terminator(self.rest) {
            self.done = true;
            return None;
        }

        match RawEvent::parse(self.rest) {
            Ok((raw, used)) => {
                let entry = EventLogEntry::from_raw(&raw);
                self.rest = &self.rest[used..];
                self.offset += used;
                Some(Ok(entry))
            }
            Err(kind) => {
                self.done = true;
                log::debug!("event log: bad record at offset {}", self.offset);
                Some(Err(LogDecodeError {
                    offset: self.offset,
                    kind,
                }))
            }
        }
    }
}

impl<D: TpmDriver> Tpm<D> {
    /// Borrow the platform event log
    pub fn event_log(&mut self) -> DriverResult<EventLog<'_>> {
        let area = self.driver_mut().log_area()?;
        log::debug!("event log: {} bytes", area.len());
        Ok(EventLog::new(area))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::Sha1Engine;
    use alloc::format;
    use tcgboot_hal::soft::SoftTpm;

    fn sample_log() -> Vec<u8> {
        let mut area = Vec::new();
        for (pcr, ty, data) in [
            (0u32, EventType::SCrtmVersion, &b"1.0"[..]),
            (0, EventType::NoAction, &b"spec id"[..]),
            (4, EventType::Ipl, &b"/boot/grub/kernel.img"[..]),
            (0, EventType::Separator, &[0, 0, 0, 0][..]),
        ] {
            let digest = Sha1Engine.digest(data);
            area.extend_from_slice(&EventLogEntry::new(pcr, ty, digest, data).to_record().unwrap());
        }
        area
    }

    #[test]
    fn test_event_type_codes() {
        assert_eq!(EventType::from_raw(0x0D), EventType::Ipl);
        assert_eq!(EventType::Ipl.raw(), 0x0D);
        assert_eq!(EventType::from_raw(0x1234), EventType::Other(0x1234));
        assert_eq!(EventType::Other(0x1234).raw(), 0x1234);
        assert_eq!(EventType::Other(0x1234).name(), "UNKNOWN");
        assert_eq!(EventType::from_name("ev_separator"), Some(EventType::Separator));
        assert_eq!(format!("{}", EventType::Ipl), "EV_IPL (0x0000000d)");
    }

    #[test]
    fn test_entries_restartable() {
        let area = sample_log();
        let log = EventLog::new(&area);

        assert_eq!(log.len(), Ok(4));
        assert_eq!(log.entries().count(), log.entries().count());

        let first = log.entries().next().unwrap().unwrap();
        assert_eq!(first.event_type, EventType::SCrtmVersion);
        assert_eq!(first.event_data, b"1.0");
    }

    #[test]
    fn test_entry_positions() {
        let area = sample_log();
        let log = EventLog::new(&area);

        assert_eq!(log.entry(0), Ok(None));
        assert_eq!(log.entry(3).unwrap().unwrap().pcr_index, 4);
        assert_eq!(log.entry(5), Ok(None));
    }

    #[test]
    fn test_terminator_ends_log() {
        let mut area = sample_log();
        area.extend_from_slice(&[0u8; 128]);
        assert_eq!(EventLog::new(&area).len(), Ok(4));
        assert!(EventLog::new(&[0u8; 64]).is_empty());
        assert!(EventLog::new(&[]).is_empty());
    }

    #[test]
    fn test_short_zero_padding_ends_log() {
        let mut area = EventLogEntry::new(4, EventType::Ipl, Digest::ZERO, &b"/boot/x"[..])
            .to_record()
            .unwrap();
        area.extend_from_slice(&[0u8; 16]);

        let log = EventLog::new(&area);
        assert_eq!(log.len(), Ok(1));
        assert_eq!(log.entry(1).unwrap().unwrap().event_data, b"/boot/x");
        assert_eq!(log.entry(2), Ok(None));

        let mut area = sample_log();
        area.push(0);
        assert_eq!(EventLog::new(&area).len(), Ok(4));
    }

    #[test]
    fn test_short_nonzero_tail_is_an_error() {
        let mut area = sample_log();
        let good = area.len();
        area.extend_from_slice(&[0, 0, 0, 0, 0xFF]);

        assert_eq!(
            EventLog::new(&area).len(),
            Err(LogDecodeError {
                offset: good,
                kind: RecordError::TruncatedHeader { available: 5 },
            })
        );
    }

    #[test]
    fn test_truncated_tail() {
        let mut area = sample_log();
        let good = area.len();
        let record = EventLogEntry::new(4, EventType::Ipl, Digest::ZERO, &b"cut"[..])
            .to_record()
            .unwrap();
        area.extend_from_slice(&record);
        area.truncate(area.len() - 1);

        let log = EventLog::new(&area);
        let results: Vec<_> = log.entries().collect();
        assert_eq!(results.len(), 5);
        assert_eq!(
            results[4],
            Err(LogDecodeError {
                offset: good,
                kind: RecordError::TruncatedData { expected: 3, available: 2 },
            })
        );
        assert!(log.len().is_err());
    }

    #[test]
    fn test_for_pcr_and_replay() {
        let area = sample_log();
        let log = EventLog::new(&area);

        assert_eq!(log.for_pcr(0).count(), 3);
        assert_eq!(log.for_pcr(4).count(), 1);

        let expected = pcr::replay(
            &Sha1Engine,
            Digest::ZERO,
            [Sha1Engine.digest(b"1.0"), Sha1Engine.digest(&[0, 0, 0, 0])],
        );
        assert_eq!(log.replay(&Sha1Engine, 0, Digest::ZERO), Ok(expected));

        let bank = log.replay_all(&Sha1Engine).unwrap();
        assert_eq!(bank.get(0), Some(expected));
    }

    #[test]
    fn test_soft_tpm_preboot_log_replays() {
        let mut soft = SoftTpm::new()
            .with_preboot_event(0, 0x08, b"CRTM 1.0")
            .with_preboot_event(0, 0x04, &[0xFF; 4]);
        let expected = soft.pcr(0).unwrap();

        let mut tpm = Tpm::new(&mut soft);
        let log = tpm.event_log().unwrap();
        assert_eq!(log.replay(&Sha1Engine, 0, Digest::ZERO), Ok(expected));
    }

    #[test]
    fn test_entry_display() {
        let entry = EventLogEntry::new(4, EventType::Ipl, Digest::ZERO, &b"/boot/x"[..]);
        let text = format!("{}", EntryDisplay { position: 2, entry: &entry, show_data: true });
        assert!(text.starts_with("[2]\n"));
        assert!(text.contains("pcrIndex:  4"));
        assert!(text.contains("EV_IPL"));
        assert!(text.ends_with("eventData: /boot/x"));

        let text = format!("{}", EntryDisplay { position: 2, entry: &entry, show_data: false });
        assert!(!text.contains("eventData"));
    }
}
