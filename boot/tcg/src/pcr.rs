//! # PCR Register Model
//!
//! A PCR is never assigned. It starts at the platform reset value and each
//! extend replaces it with `Hash(value || measurement)`, so its value
//! depends on every measurement and on their order.
//!
//! [`Tpm::read_pcr`] reads the live register. [`PcrBank`] and [`replay`]
//! recompute expected values in software.

use crate::digest::DigestEngine;
use crate::format::SpacedHex;
use crate::Tpm;
use core::fmt;
use tcgboot_hal::{Digest, DriverResult, TpmDriver, PCR_COUNT};

impl<D: TpmDriver> Tpm<D> {
    /// Read the current value of a PCR
    ///
    /// The index range is checked by the driver.
    pub fn read_pcr(&mut self, index: u32) -> DriverResult<Digest> {
        let value = self.driver_mut().read_pcr(index)?;
        log::debug!("PCR[{}] = {:x}", index, value);
        Ok(value)
    }
}

/// Fold a sequence of measurements into a register value
pub fn replay<E, I>(engine: &E, initial: Digest, digests: I) -> Digest
where
    E: DigestEngine + ?Sized,
    I: IntoIterator<Item = Digest>,
{
    digests
        .into_iter()
        .fold(initial, |value, measurement| engine.extend(&value, &measurement))
}

// =============================================================================
// SOFTWARE PCR BANK
// =============================================================================

/// Software copy of a PCR bank
///
/// Starts with every register at zero and applies the same extend rule as the
/// TPM. Indices outside the bank are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcrBank {
    values: [Digest; PCR_COUNT as usize],
}

impl Default for PcrBank {
    fn default() -> Self {
        Self::new()
    }
}

impl PcrBank {
    /// Bank with every register at zero
    pub const fn new() -> Self {
        Self {
            values: [Digest::ZERO; PCR_COUNT as usize],
        }
    }

    /// Extend one register
    pub fn extend<E: DigestEngine + ?Sized>(&mut self, engine: &E, index: u32, measurement: &Digest) {
        if let Some(value) = self.values.get_mut(index as usize) {
            *value = engine.extend(value, measurement);
        }
    }

    /// Register value
    pub fn get(&self, index: u32) -> Option<Digest> {
        self.values.get(index as usize).copied()
    }

    /// Registers that differ from their reset value
    pub fn touched(&self) -> impl Iterator<Item = (u32, Digest)> + '_ {
        (0..PCR_COUNT)
            .zip(self.values.iter().copied())
            .filter(|(_, value)| !value.is_zero())
    }
}

// =============================================================================
// DISPLAY
// =============================================================================

/// `PCR[NN]=` followed by the register bytes in hex
#[derive(Debug, Clone, Copy)]
pub struct PcrDisplay {
    /// Register index
    pub index: u32,
    /// Register value
    pub value: Digest,
}

impl fmt::Display for PcrDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PCR[{:02}]={}", self.index, SpacedHex(self.value.as_bytes()))
    }
}
