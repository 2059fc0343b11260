//! # Firmware Interface Definitions
//!
//! Data owned by the platform firmware and the TCG PC Client
//! specifications: the MOR control bits, the TCG BIOS status codes and the
//! binary layout of a TPM 1.2 event log record.

use crate::{Digest, DriverError, DIGEST_SIZE};
use alloc::vec::Vec;
use bitflags::bitflags;
use static_assertions::const_assert_eq;

// =============================================================================
// MEMORY OVERWRITE REQUEST
// =============================================================================

bitflags! {
    /// MemoryOverwriteRequestControl bits
    ///
    /// TCG Platform Reset Attack Mitigation Specification, section 2.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MorFlags: u8 {
        /// Clear system memory on the next boot
        const CLEAR_MEMORY = 1 << 0;
        /// Do not rely on orderly-shutdown detection; always honor the request
        const DISABLE_AUTO_DETECT = 1 << 4;
    }
}

// =============================================================================
// TCG BIOS STATUS CODES
// =============================================================================

/// Return codes of the TCG PC Client BIOS interface (`int 1Ah`)
pub mod tcg_status {
    /// Success
    pub const TCG_PC_OK: u32 = 0x00;
    /// The TPM returned an error
    pub const TCG_PC_TPMERROR: u32 = 0x01;
    /// The event log area is full
    pub const TCG_PC_LOGOVERFLOW: u32 = 0x02;
    /// The function is not supported
    pub const TCG_PC_UNSUPPORTED: u32 = 0x03;
}

/// Human-readable name of a TCG BIOS status code
pub const fn status_name(code: u32) -> &'static str {
    match code {
        tcg_status::TCG_PC_OK => "ok",
        tcg_status::TCG_PC_TPMERROR => "TPM error",
        tcg_status::TCG_PC_LOGOVERFLOW => "log overflow",
        tcg_status::TCG_PC_UNSUPPORTED => "unsupported",
        _ => "unknown",
    }
}

impl DriverError {
    /// Map a TCG BIOS status code to a driver error
    ///
    /// Returns `None` for `TCG_PC_OK`.
    pub const fn from_tcg_status(code: u32) -> Option<Self> {
        match code {
            tcg_status::TCG_PC_OK => None,
            tcg_status::TCG_PC_LOGOVERFLOW => Some(DriverError::LogFull),
            tcg_status::TCG_PC_UNSUPPORTED => Some(DriverError::NotSupported),
            other => Some(DriverError::Firmware(other)),
        }
    }
}

// =============================================================================
// TCG_PCR_EVENT LAYOUT
// =============================================================================

/// Size of the fixed `TCG_PCR_EVENT` header
///
/// `pcrIndex: u32`, `eventType: u32`, `digest: [u8; 20]`, `eventDataSize: u32`,
/// all little-endian.
pub const EVENT_HEADER_SIZE: usize = 4 + 4 + DIGEST_SIZE + 4;

const_assert_eq!(EVENT_HEADER_SIZE, 32);
const_assert_eq!(DIGEST_SIZE, 20);

/// One `TCG_PCR_EVENT` record, borrowed from a log area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent<'a> {
    /// PCR the digest was extended into
    pub pcr_index: u32,
    /// TCG event type
    pub event_type: u32,
    /// Digest used for the extend
    pub digest: Digest,
    /// Event payload
    pub data: &'a [u8],
}

/// Why a record could not be read from a log area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    /// Fewer than [`EVENT_HEADER_SIZE`] bytes remain
    TruncatedHeader {
        /// Bytes available
        available: usize,
    },
    /// The header announces more event data than remains
    TruncatedData {
        /// Announced event data size
        expected: usize,
        /// Bytes available after the header
        available: usize,
    },
    /// The event data length does not fit the 32-bit `eventDataSize` field
    DataTooLarge {
        /// Event data length in bytes
        len: usize,
    },
}

impl<'a> RawEvent<'a> {
    /// Parse the record at the start of `bytes`
    ///
    /// Returns the record and the number of bytes it occupies.
    pub fn parse(bytes: &'a [u8]) -> Result<(Self, usize), RecordError> {
        if bytes.len() < EVENT_HEADER_SIZE {
            return Err(RecordError::TruncatedHeader { available: bytes.len() });
        }

        let pcr_index = read_u32_le(bytes, 0);
        let event_type = read_u32_le(bytes, 4);
        let mut digest = [0u8; DIGEST_SIZE];
        digest.copy_from_slice(&bytes[8..8 + DIGEST_SIZE]);
        let data_size = read_u32_le(bytes, 8 + DIGEST_SIZE) as usize;

        let body = &bytes[EVENT_HEADER_SIZE..];
        if body.len() < data_size {
            return Err(RecordError::TruncatedData {
                expected: data_size,
                available: body.len(),
            });
        }

        Ok((
            Self {
                pcr_index,
                event_type,
                digest: Digest::new(digest),
                data: &body[..data_size],
            },
            EVENT_HEADER_SIZE + data_size,
        ))
    }

    /// Encoded size of this record
    pub fn encoded_len(&self) -> usize {
        EVENT_HEADER_SIZE + self.data.len()
    }

    /// Encode this record in `TCG_PCR_EVENT` layout
    ///
    /// Fails if the event data is too long for the header's size field.
    pub fn to_bytes(&self) -> Result<Vec<u8>, RecordError> {
        let data_size = event_data_size(self.data.len())?;
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&self.pcr_index.to_le_bytes());
        out.extend_from_slice(&self.event_type.to_le_bytes());
        out.extend_from_slice(self.digest.as_bytes());
        out.extend_from_slice(&data_size.to_le_bytes());
        out.extend_from_slice(self.data);
        Ok(out)
    }
}

/// Value of the `eventDataSize` field for `len` bytes of event data
pub fn event_data_size(len: usize) -> Result<u32, RecordError> {
    u32::try_from(len).map_err(|_| RecordError::DataTooLarge { len })
}

/// Check for the zero fill that marks unused log-area space
///
/// A zeroed header ends the log. So does a zeroed tail too short to hold
/// a header.
pub fn is_log_terminator(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(EVENT_HEADER_SIZE)];
    !head.is_empty() && head.iter().all(|&b| b == 0)
}

fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
