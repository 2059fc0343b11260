//! Configuration Parser
//!
//! Settings for the TPM commands, read from the boot loader's
//! configuration file in `key = value` form:
//!
//! ```text
//! [tpm]
//! measure_event_type = EV_IPL
//! max_measure_size = 67108864
//! show_event_data = yes
//! ```

use crate::eventlog::EventType;
use core::fmt;

/// Default measurement size limit (64 MiB)
pub const DEFAULT_MAX_MEASURE_SIZE: usize = 64 * 1024 * 1024;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// TPM command settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcgConfig {
    /// Event type recorded for file measurements
    pub measure_event_type: EventType,
    /// Largest file `measure` accepts, in bytes; `0` means no limit
    pub max_measure_size: usize,
    /// Print event payloads in `tcglog`
    pub show_event_data: bool,
}

impl Default for TcgConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TcgConfig {
    /// Create default configuration
    pub const fn new() -> Self {
        Self {
            measure_event_type: EventType::Ipl,
            max_measure_size: DEFAULT_MAX_MEASURE_SIZE,
            show_event_data: true,
        }
    }

    /// Parse from string
    ///
    /// Keys before the first section count as `[tpm]` keys. Other sections
    /// and unknown keys are ignored.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config = Self::new();
        let mut in_tpm_section = true;

        for (number, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if line.starts_with('[') {
                let section = line
                    .strip_prefix('[')
                    .and_then(|s| s.strip_suffix(']'))
                    .ok_or(ConfigError::InvalidSyntax { line: number + 1 })?;
                in_tpm_section = section.trim() == "tpm";
                continue;
            }

            let (key, value) =
                parse_key_value(line).ok_or(ConfigError::InvalidSyntax { line: number + 1 })?;
            if in_tpm_section {
                config
                    .apply_setting(key, value)
                    .map_err(|()| ConfigError::InvalidValue { line: number + 1 })?;
            }
        }

        Ok(config)
    }

    fn apply_setting(&mut self, key: &str, value: &str) -> Result<(), ()> {
        match key {
            "measure_event_type" | "measure-event-type" => {
                self.measure_event_type = parse_event_type(value).ok_or(())?;
            }
            "max_measure_size" | "max-measure-size" => {
                self.max_measure_size = value.parse().map_err(|_| ())?;
            }
            "show_event_data" | "show-event-data" => {
                self.show_event_data = parse_bool(value).ok_or(())?;
            }
            _ => log::debug!("config: ignoring unknown key {}", key),
        }
        Ok(())
    }

    /// Check a file size against the measurement limit
    pub fn allows_size(&self, size: usize) -> bool {
        self.max_measure_size == 0 || size <= self.max_measure_size
    }
}

/// Parse key-value pair
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim().trim_matches('"')))
}

/// Event type by TCG name, decimal or `0x` hex value
fn parse_event_type(s: &str) -> Option<EventType> {
    if let Some(ty) = EventType::from_name(s) {
        return Some(ty);
    }
    let raw = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => s.parse().ok()?,
    };
    Some(EventType::from_raw(raw))
}

/// Parse bool
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" | "enabled" => Some(true),
        "false" | "no" | "0" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Configuration error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A line is neither a section, a comment, nor `key = value`
    InvalidSyntax {
        /// 1-based line number
        line: usize,
    },
    /// A known key has a value of the wrong form
    InvalidValue {
        /// 1-based line number
        line: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidSyntax { line } => write!(f, "line {}: syntax error", line),
            ConfigError::InvalidValue { line } => write!(f, "line {}: invalid value", line),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CONFIG: &str = r#"
# Boot configuration
timeout = 5

[graphics]
show_event_data = maybe

[tpm]
; measured boot
measure_event_type = 0x0E
max_measure_size = 1024
show_event_data = no
unknown_key = whatever
"#;

    #[test]
    fn test_defaults() {
        let config = TcgConfig::default();
        assert_eq!(config.measure_event_type, EventType::Ipl);
        assert_eq!(config.max_measure_size, DEFAULT_MAX_MEASURE_SIZE);
        assert!(config.show_event_data);
        assert_eq!(TcgConfig::parse(""), Ok(config));
    }

    #[test]
    fn test_parse_sample() {
        let config = TcgConfig::parse(SAMPLE_CONFIG).unwrap();
        assert_eq!(config.measure_event_type, EventType::IplPartitionData);
        assert_eq!(config.max_measure_size, 1024);
        assert!(!config.show_event_data);
    }

    #[test]
    fn test_event_type_forms() {
        assert_eq!(parse_event_type("EV_IPL"), Some(EventType::Ipl));
        assert_eq!(parse_event_type("13"), Some(EventType::Ipl));
        assert_eq!(parse_event_type("0x80000001"), Some(EventType::Other(0x8000_0001)));
        assert_eq!(parse_event_type("EV_BOGUS"), None);
    }

    #[test]
    fn test_invalid_value() {
        assert_eq!(
            TcgConfig::parse("[tpm]\nmax_measure_size = lots\n"),
            Err(ConfigError::InvalidValue { line: 2 })
        );
        assert_eq!(
            TcgConfig::parse("show_event_data\n"),
            Err(ConfigError::InvalidSyntax { line: 1 })
        );
        assert_eq!(
            TcgConfig::parse("[tpm\n"),
            Err(ConfigError::InvalidSyntax { line: 1 })
        );
    }

    #[test]
    fn test_allows_size() {
        let mut config = TcgConfig::new();
        config.max_measure_size = 10;
        assert!(config.allows_size(10));
        assert!(!config.allows_size(11));

        config.max_measure_size = 0;
        assert!(config.allows_size(usize::MAX));
    }
}
