//! # tcgboot - Measured-Boot TPM Commands
//!
//! Boot-loader commands that inspect and extend the measured-boot chain of
//! trust before an operating system is loaded:
//!
//! - `readpcr <index>` prints a Platform Configuration Register
//! - `tcglog <index>` prints one event-log entry, or all of them for `0`
//! - `measure <file> <index>` hashes a file, extends a PCR and logs the event
//! - `setmor <0|1>` requests a memory wipe on the next reset
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Command Surface     readpcr │ tcglog │ measure │ setmor        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Models              PCR │ Event Log │ Measurement │ MOR        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Digest Engine       SHA-1 (TPM 1.2)                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Driver Adapter      tcgboot-hal::TpmDriver                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The TPM is reached only through a [`Tpm`] handle passed into every
//! operation. Presence is probed on each command; a platform without a TPM
//! prints `TPM not available` and keeps booting.
//!
//! ## Features
//!
//! - `std` - [`file::HostFiles`], a file source backed by `std::fs`

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod args;
pub mod commands;
pub mod config;
pub mod digest;
pub mod error;
pub mod eventlog;
pub mod file;
pub mod format;
pub mod measure;
pub mod mor;
pub mod pcr;


pub use tcgboot_hal as hal;
pub use tcgboot_hal::{Digest, DriverError, DriverResult, MorFlags, TpmDriver};

pub use commands::{CommandDescriptor, FailurePolicy, Shell, TcgModule, COMMANDS};
pub use config::TcgConfig;
pub use digest::{DigestEngine, Sha1Engine};
pub use error::{CommandError, CommandResult, MeasureError};
pub use eventlog::{EventLog, EventLogEntry, EventType};
pub use file::FileSource;
pub use measure::Measurement;
pub use mor::MorRequest;

/// Handle to the platform TPM
///
/// Owns (or mutably borrows) the driver for the duration of a command.
/// Nothing about the TPM is cached between calls.
#[derive(Debug)]
pub struct Tpm<D> {
    driver: D,
}

impl<D: TpmDriver> Tpm<D> {
    /// Wrap a driver
    pub const fn new(driver: D) -> Self {
        Self { driver }
    }

    /// Probe for a TPM
    ///
    /// Never fails; absence is reported as `false`.
    pub fn is_available(&mut self) -> bool {
        let present = self.driver.probe();
        if !present {
            log::debug!("TPM probe: no TPM present");
        }
        present
    }

    /// Borrow the driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Give the driver back
    pub fn into_inner(self) -> D {
        self.driver
    }

    pub(crate) fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}
