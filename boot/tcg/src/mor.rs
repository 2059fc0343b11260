//! # MOR Controller
//!
//! Memory Overwrite Request: ask the firmware to clear system memory on
//! the next reset, so secrets left in RAM do not survive a reboot into
//! another OS. The request always sets `CLEAR_MEMORY`; the caller chooses
//! whether firmware may skip the wipe after an orderly shutdown.

use crate::error::{messages, CommandError};
use crate::Tpm;
use tcgboot_hal::{DriverResult, MorFlags, TpmDriver};

/// A validated MOR request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MorRequest {
    disable_auto_detect: bool,
}

impl MorRequest {
    /// Request a wipe, with orderly-shutdown detection enabled or disabled
    pub const fn new(disable_auto_detect: bool) -> Self {
        Self { disable_auto_detect }
    }

    /// Validate the `setmor` argument
    ///
    /// Only `0` (auto-detect enabled) and `1` (disabled) are accepted.
    pub fn from_value(value: u32) -> Result<Self, CommandError> {
        match value {
            0 => Ok(Self::new(false)),
            1 => Ok(Self::new(true)),
            _ => Err(CommandError::BadArgument(messages::VALUE_MUST_BE_0_OR_1)),
        }
    }

    /// Whether orderly-shutdown detection is disabled
    pub const fn disable_auto_detect(&self) -> bool {
        self.disable_auto_detect
    }

    /// Control bits written to firmware
    pub fn flags(&self) -> MorFlags {
        if self.disable_auto_detect {
            MorFlags::CLEAR_MEMORY | MorFlags::DISABLE_AUTO_DETECT
        } else {
            MorFlags::CLEAR_MEMORY
        }
    }
}

impl<D: TpmDriver> Tpm<D> {
    /// Forward a MOR request to firmware
    pub fn set_mor(&mut self, request: MorRequest) -> DriverResult<()> {
        let flags = request.flags();
        self.driver_mut().write_mor(flags)?;
        log::info!("MOR set: {:?}", flags);
        Ok(())
    }
}
