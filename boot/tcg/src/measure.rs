//! # Measurement Orchestrator
//!
//! "Measure file into PCR N": read the whole file, digest it, then extend
//! the PCR and append the matching log entry through the driver's
//! combined [`hash_log_extend`](TpmDriver::hash_log_extend). The extend
//! and the append are never attempted separately.

use crate::config::TcgConfig;
use crate::digest::DigestEngine;
use crate::error::MeasureError;
use crate::eventlog::{EventLogEntry, EventType};
use crate::file::FileSource;
use crate::Tpm;
use tcgboot_hal::{Digest, TpmDriver};

/// Outcome of a completed measurement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measurement {
    /// The log entry that was appended
    pub entry: EventLogEntry,
    /// PCR value after the extend
    pub pcr_value: Digest,
}

impl<D: TpmDriver> Tpm<D> {
    /// Measure a file into a PCR
    ///
    /// The log entry records `pcr_index`, the configured event type, the
    /// file digest, and the path as event data.
    pub fn measure_file<F, E>(
        &mut self,
        files: &mut F,
        engine: &E,
        config: &TcgConfig,
        path: &str,
        pcr_index: u32,
    ) -> Result<Measurement, MeasureError>
    where
        F: FileSource + ?Sized,
        E: DigestEngine + ?Sized,
    {
        let contents = files.read_file(path)?;
        if !config.allows_size(contents.len()) {
            return Err(MeasureError::TooLarge {
                size: contents.len(),
                limit: config.max_measure_size,
            });
        }

        let digest = engine.digest(&contents);
        log::debug!("measure: {} ({} bytes) digest {:x}", path, contents.len(), digest);

        self.measure_digest(pcr_index, config.measure_event_type, digest, path.as_bytes())
    }

    /// Extend a precomputed digest and log it with the given event data
    pub fn measure_digest(
        &mut self,
        pcr_index: u32,
        event_type: EventType,
        digest: Digest,
        event_data: &[u8],
    ) -> Result<Measurement, MeasureError> {
        let entry = EventLogEntry::new(pcr_index, event_type, digest, event_data);
        let record = entry
            .to_record()
            .map_err(|_| MeasureError::EventTooLarge(event_data.len()))?;
        let pcr_value = self
            .driver_mut()
            .hash_log_extend(pcr_index, &digest, &record)?;

        log::info!("PCR[{}] extended with {:x} ({})", pcr_index, digest, event_type.name());
        Ok(Measurement { entry, pcr_value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::Sha1Engine;
    use crate::file::{FileError, MemoryFiles};
    use crate::pcr;
    use tcgboot_hal::soft::{SoftFaults, SoftTpm};
    use tcgboot_hal::DriverError;

    const KERNEL: &str = "/boot/grub/kernel.img";

    fn files() -> MemoryFiles {
        MemoryFiles::new().with_file(KERNEL, &b"\x7fELF kernel image"[..])
    }

    #[test]
    fn test_measure_file() {
        let mut soft = SoftTpm::new();
        let mut tpm = Tpm::new(&mut soft);
        let config = TcgConfig::default();

        let m = tpm
            .measure_file(&mut files(), &Sha1Engine, &config, KERNEL, 4)
            .unwrap();

        let digest = Sha1Engine.digest(b"\x7fELF kernel image");
        assert_eq!(m.entry.pcr_index, 4);
        assert_eq!(m.entry.event_type, EventType::Ipl);
        assert_eq!(m.entry.digest, digest);
        assert_eq!(m.entry.event_data, KERNEL.as_bytes());
        assert_eq!(m.pcr_value, pcr::replay(&Sha1Engine, Digest::ZERO, [digest]));

        let log = tpm.event_log().unwrap();
        assert_eq!(log.entry(1).unwrap(), Some(m.entry));
    }

    #[test]
    fn test_missing_file_touches_nothing() {
        let mut soft = SoftTpm::new();
        let mut tpm = Tpm::new(&mut soft);

        let err = tpm
            .measure_file(&mut files(), &Sha1Engine, &TcgConfig::default(), "/boot/none", 4)
            .unwrap_err();
        assert_eq!(err, MeasureError::File(FileError::NotFound));
        assert_eq!(soft.calls().hardware_calls(), 0);
    }

    #[test]
    fn test_size_limit() {
        let mut soft = SoftTpm::new();
        let mut tpm = Tpm::new(&mut soft);
        let mut config = TcgConfig::default();
        config.max_measure_size = 4;

        let err = tpm
            .measure_file(&mut files(), &Sha1Engine, &config, KERNEL, 4)
            .unwrap_err();
        assert!(matches!(err, MeasureError::TooLarge { limit: 4, .. }));
        assert!(soft.pcr(4).unwrap().is_zero());
    }

    #[test]
    fn test_driver_failure_leaves_pcr_and_log() {
        let mut soft = SoftTpm::new();
        soft.set_faults(SoftFaults::APPEND_LOG);
        let mut tpm = Tpm::new(&mut soft);

        let err = tpm
            .measure_file(&mut files(), &Sha1Engine, &TcgConfig::default(), KERNEL, 4)
            .unwrap_err();
        assert!(matches!(err, MeasureError::Driver(DriverError::Firmware(_))));
        assert!(soft.pcr(4).unwrap().is_zero());
        assert_eq!(soft.log_len(), 0);
    }

    #[test]
    fn test_configured_event_type() {
        let mut soft = SoftTpm::new();
        let mut tpm = Tpm::new(&mut soft);
        let mut config = TcgConfig::default();
        config.measure_event_type = EventType::Other(0x1401);

        let m = tpm
            .measure_file(&mut files(), &Sha1Engine, &config, KERNEL, 9)
            .unwrap();
        assert_eq!(m.entry.event_type, EventType::Other(0x1401));

        let log = tpm.event_log().unwrap();
        let entry = log.entry(1).unwrap().unwrap();
        assert_eq!(entry.event_type.raw(), 0x1401);
    }
}
