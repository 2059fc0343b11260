//! Error types for the measured-boot commands

use crate::eventlog::LogDecodeError;
use crate::file::FileError;
use core::fmt;
use tcgboot_hal::DriverError;

/// Result of running a command
///
/// `Ok(())` is "no error", which may still follow a printed failure message.
pub type CommandResult = Result<(), CommandError>;

// =============================================================================
// COMMAND ERRORS
// =============================================================================

/// Failure status of a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Wrong argument count, or a value outside the accepted set
    BadArgument(&'static str),
    /// A measurement did not complete
    Measurement(MeasureError),
    /// The TPM rejected a read or a MOR write
    Driver(DriverError),
    /// The event log holds a record that cannot be decoded
    Log(LogDecodeError),
    /// The event log has fewer entries than requested
    EntryNotFound(u32),
}

impl CommandError {
    /// Check for a usage error
    pub const fn is_bad_argument(&self) -> bool {
        matches!(self, CommandError::BadArgument(_))
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::BadArgument(msg) => write!(f, "{}", msg),
            CommandError::Measurement(err) => write!(f, "measurement failed: {}", err),
            CommandError::Driver(err) => write!(f, "{}", err),
            CommandError::Log(err) => write!(f, "{}", err),
            CommandError::EntryNotFound(position) => write!(f, "no event log entry {}", position),
        }
    }
}

impl From<MeasureError> for CommandError {
    fn from(err: MeasureError) -> Self {
        CommandError::Measurement(err)
    }
}

impl From<DriverError> for CommandError {
    fn from(err: DriverError) -> Self {
        CommandError::Driver(err)
    }
}

impl From<LogDecodeError> for CommandError {
    fn from(err: LogDecodeError) -> Self {
        CommandError::Log(err)
    }
}

/// Argument messages shared by the commands
pub mod messages {
    /// `readpcr`, `tcglog` and `measure` without an index
    pub const INDEX_EXPECTED: &str = "index expected";
    /// `setmor` without a value
    pub const VALUE_EXPECTED: &str = "value expected";
    /// More arguments than the command takes
    pub const TOO_MANY_ARGUMENTS: &str = "too many arguments";
    /// `measure` with anything but a path and an index
    pub const WRONG_NUMBER_OF_ARGUMENTS: &str = "wrong number of arguments";
    /// `setmor` outside `{0, 1}`
    pub const VALUE_MUST_BE_0_OR_1: &str = "value must be 0 or 1";
}

// =============================================================================
// MEASUREMENT ERRORS
// =============================================================================

/// Why a file measurement failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeasureError {
    /// The file could not be read
    File(FileError),
    /// The file exceeds the configured measurement limit
    TooLarge {
        /// File size in bytes
        size: usize,
        /// Configured limit in bytes
        limit: usize,
    },
    /// The event path does not fit in a log record
    EventTooLarge(usize),
    /// The TPM rejected the extend or the log append
    Driver(DriverError),
}

impl fmt::Display for MeasureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasureError::File(err) => write!(f, "{}", err),
            MeasureError::TooLarge { size, limit } => {
                write!(f, "file is {} bytes, limit is {}", size, limit)
            }
            MeasureError::EventTooLarge(len) => write!(f, "event data of {} bytes", len),
            MeasureError::Driver(err) => write!(f, "{}", err),
        }
    }
}

impl From<FileError> for MeasureError {
    fn from(err: FileError) -> Self {
        MeasureError::File(err)
    }
}

impl From<DriverError> for MeasureError {
    fn from(err: DriverError) -> Self {
        MeasureError::Driver(err)
    }
}

// =============================================================================
// PARSE ERRORS
// =============================================================================

/// A numeric argument that could not be read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Empty argument
    Empty,
    /// A character other than a decimal digit
    InvalidDigit {
        /// Byte offset of the first bad character
        position: usize,
    },
    /// The value does not fit in 32 bits
    Overflow,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Empty => write!(f, "number expected"),
            ParseError::InvalidDigit { position } => {
                write!(f, "unrecognized number at offset {}", position)
            }
            ParseError::Overflow => write!(f, "number too large"),
        }
    }
}
