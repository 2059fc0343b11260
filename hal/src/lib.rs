//! # tcgboot HAL - TPM Driver Adapter
//!
//! This crate defines the narrow interface through which the measured-boot
//! core talks to the platform TPM. Firmware ports implement [`TpmDriver`]
//! on top of whatever transport the platform offers (BIOS `int 1Ah` TCG
//! calls, a TIS/CRB register window, an EFI protocol).
//!
//! ## Design Philosophy
//!
//! The adapter is designed to be:
//! - **Narrow**: one synchronous call per firmware primitive
//! - **Stateless**: presence is probed, never cached
//! - **Substitutable**: [`soft::SoftTpm`] implements the same trait in memory
//!
//! The TPM 1.2 model is used throughout: one SHA-1 bank of
//! [`PCR_COUNT`] registers, and a TCG PC Client event log.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

pub mod firmware;
pub mod soft;

use core::fmt;
use sha1::{Digest as _, Sha1};

pub use firmware::MorFlags;

/// Width of a TPM 1.2 PCR and of every measurement digest (SHA-1)
pub const DIGEST_SIZE: usize = 20;

/// Number of PCRs in a PC Client TPM 1.2
pub const PCR_COUNT: u32 = 24;

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors reported by a TPM driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// No TPM answered on this platform
    NotPresent,
    /// The PCR index is outside the platform's register bank
    InvalidPcrIndex(u32),
    /// The event log area has no room for another record
    LogFull,
    /// The firmware returned a non-zero TCG status code
    Firmware(u32),
    /// The platform does not implement this primitive
    NotSupported,
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::NotPresent => write!(f, "TPM not present"),
            DriverError::InvalidPcrIndex(index) => write!(f, "invalid PCR index {}", index),
            DriverError::LogFull => write!(f, "event log full"),
            DriverError::Firmware(code) => {
                write!(f, "firmware error {:#x} ({})", code, firmware::status_name(*code))
            }
            DriverError::NotSupported => write!(f, "operation not supported"),
        }
    }
}

// =============================================================================
// DIGEST
// =============================================================================

/// A 20-byte SHA-1 digest, either a PCR value or a measurement
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Digest([u8; DIGEST_SIZE]);

impl Digest {
    /// All-zero digest (PCR 0-15 reset value)
    pub const ZERO: Self = Self([0; DIGEST_SIZE]);

    /// Create a digest from raw bytes
    #[inline]
    pub const fn new(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create a digest from a slice of exactly [`DIGEST_SIZE`] bytes
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; DIGEST_SIZE] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Raw digest bytes
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    /// Check if every byte is zero
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// SHA-1 of a byte stream
    pub fn sha1(data: &[u8]) -> Self {
        Self(Sha1::digest(data).into())
    }

    /// TPM 1.2 extend rule: `SHA1(self || measurement)`
    pub fn extend_sha1(&self, measurement: &Digest) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(self.0);
        hasher.update(measurement.0);
        Self(hasher.finalize().into())
    }
}

impl From<[u8; DIGEST_SIZE]> for Digest {
    fn from(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({:x})", self)
    }
}

impl fmt::LowerHex for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::UpperHex for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

// =============================================================================
// DRIVER TRAIT
// =============================================================================

/// Firmware primitives the measured-boot core needs from a TPM
///
/// Every method is a single synchronous call into firmware. Callers hold
/// the driver through `&mut`, so there is exactly one user at a time.
pub trait TpmDriver {
    /// Check whether a TPM is present and enabled
    ///
    /// Absence is a normal answer, never an error.
    fn probe(&mut self) -> bool;

    /// Read the current value of a PCR
    fn read_pcr(&mut self, index: u32) -> DriverResult<Digest>;

    /// Raw bytes of the event log, from the first record to the last
    fn log_area(&mut self) -> DriverResult<&[u8]>;

    /// Extend a PCR: `value' = SHA1(value || digest)`
    ///
    /// Returns the new register value.
    fn extend(&mut self, index: u32, digest: &Digest) -> DriverResult<Digest>;

    /// Append one encoded `TCG_PCR_EVENT` record to the event log
    fn append_log(&mut self, record: &[u8]) -> DriverResult<()>;

    /// Extend a PCR and append the matching log record as one operation
    ///
    /// Firmware with a combined primitive (`TCG_HashLogExtendEvent`)
    /// should override this. The default extends first and appends only
    /// if the extend succeeded, so a failed extend leaves both the PCR and
    /// the log untouched.
    ///
    /// The default is not atomic: if `append_log` fails after `extend`
    /// succeeded, the error is returned but the PCR stays extended with no
    /// matching log record, and replaying the log no longer reproduces it.
    /// A PCR extend cannot be undone. Drivers whose append can fail (a
    /// bounded log area, a flaky transport) must override this method and
    /// check their log room before extending.
    fn hash_log_extend(&mut self, index: u32, digest: &Digest, record: &[u8]) -> DriverResult<Digest> {
        let value = self.extend(index, digest)?;
        self.append_log(record)?;
        Ok(value)
    }

    /// Write the Memory Overwrite Request control bits
    fn write_mor(&mut self, flags: MorFlags) -> DriverResult<()>;
}

impl<T: TpmDriver + ?Sized> TpmDriver for &mut T {
    fn probe(&mut self) -> bool {
        (**self).probe()
    }

    fn read_pcr(&mut self, index: u32) -> DriverResult<Digest> {
        (**self).read_pcr(index)
    }

    fn log_area(&mut self) -> DriverResult<&[u8]> {
        (**self).log_area()
    }

    fn extend(&mut self, index: u32, digest: &Digest) -> DriverResult<Digest> {
        (**self).extend(index, digest)
    }

    fn append_log(&mut self, record: &[u8]) -> DriverResult<()> {
        (**self).append_log(record)
    }

    fn hash_log_extend(&mut self, index: u32, digest: &Digest, record: &[u8]) -> DriverResult<Digest> {
        (**self).hash_log_extend(index, digest, record)
    }

    fn write_mor(&mut self, flags: MorFlags) -> DriverResult<()> {
        (**self).write_mor(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_from_slice() {
        assert!(Digest::from_slice(&[0u8; 19]).is_none());
        assert!(Digest::from_slice(&[0u8; 21]).is_none());

        let digest = Digest::from_slice(&[0xAB; DIGEST_SIZE]).unwrap();
        assert_eq!(digest.as_bytes(), &[0xAB; DIGEST_SIZE]);
        assert!(!digest.is_zero());
        assert!(Digest::ZERO.is_zero());
    }

    #[test]
    fn test_digest_hex() {
        let mut bytes = [0u8; DIGEST_SIZE];
        bytes[0] = 0x0F;
        bytes[19] = 0xA0;
        let digest = Digest::new(bytes);

        let lower = alloc::format!("{:x}", digest);
        assert_eq!(lower.len(), 40);
        assert!(lower.starts_with("0f"));
        assert!(lower.ends_with("a0"));
        assert!(alloc::format!("{:X}", digest).ends_with("A0"));
        assert_eq!(lower, hex::encode(digest.as_bytes()));
    }

    #[test]
    fn test_sha1_extend_rule() {
        let measurement = Digest::sha1(b"abc");
        assert_eq!(
            hex::encode(measurement.as_bytes()),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );

        let mut joined = [0u8; 2 * DIGEST_SIZE];
        joined[DIGEST_SIZE..].copy_from_slice(measurement.as_bytes());
        assert_eq!(Digest::ZERO.extend_sha1(&measurement), Digest::sha1(&joined));
        assert_ne!(Digest::ZERO.extend_sha1(&measurement), measurement);
    }

    #[test]
    fn test_driver_error_display() {
        let msg = alloc::format!("{}", DriverError::InvalidPcrIndex(31));
        assert_eq!(msg, "invalid PCR index 31");

        let msg = alloc::format!("{}", DriverError::Firmware(firmware::tcg_status::TCG_PC_LOGOVERFLOW));
        assert!(msg.contains("log overflow"));

        assert_eq!(alloc::format!("{}", DriverError::LogFull), "event log full");
    }
}
