//! # Command Surface
//!
//! The four TPM commands, their descriptors, and the module lifecycle that
//! registers them with the boot loader's command framework.
//!
//! ```text
//! ┌──────────┬────────────────────┬─────────────────────────────────────┐
//! │ readpcr  │ pcrindex           │ print PCR value at index            │
//! │ tcglog   │ logindex (0 = all) │ print event-log entry/entries       │
//! │ measure  │ FILE pcrindex      │ measure file, extend PCR, log event │
//! │ setmor   │ disableAutoDetect  │ set MOR bit                         │
//! └──────────┴────────────────────┴─────────────────────────────────────┘
//! ```
//!
//! Every command probes for a TPM first. Without one it prints
//! [`TPM_NOT_AVAILABLE`] and succeeds, so boot scripts keep running on
//! platforms that have no TPM.

use crate::args;
use crate::config::TcgConfig;
use crate::digest::{DigestEngine, Sha1Engine};
use crate::error::{messages, CommandError, CommandResult, ParseError};
use crate::eventlog::EntryDisplay;
use crate::file::FileSource;
use crate::format::line;
use crate::mor::MorRequest;
use crate::pcr::PcrDisplay;
use crate::Tpm;
use core::fmt;
use tcgboot_hal::TpmDriver;

/// Printed by every command when no TPM answers the probe
pub const TPM_NOT_AVAILABLE: &str = "TPM not available";

// =============================================================================
// DESCRIPTORS
// =============================================================================

/// What a command does when the operation itself fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Print the failure message and return "no error"
    Report,
    /// Return the error as the command status
    Propagate,
}

/// Static description of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    /// Command name
    pub name: &'static str,
    /// Argument summary
    pub usage: &'static str,
    /// One-line help
    pub help: &'static str,
    /// Message printed on failure under [`FailurePolicy::Report`]
    pub failure_message: &'static str,
    /// Failure handling
    pub policy: FailurePolicy,
}

/// `readpcr pcrindex`
pub const READPCR: CommandDescriptor = CommandDescriptor {
    name: "readpcr",
    usage: "pcrindex",
    help: "Display current value of the PCR (Platform Configuration Register) within \
           TPM (Trusted Platform Module) at index, pcrindex.",
    failure_message: "PCR read failed",
    policy: FailurePolicy::Report,
};

/// `tcglog logindex`
pub const TCGLOG: CommandDescriptor = CommandDescriptor {
    name: "tcglog",
    usage: "logindex",
    help: "Displays TCG event log entry at position, logindex. Type in 0 for all entries.",
    failure_message: "Read tcglog failed",
    policy: FailurePolicy::Report,
};

/// `measure FILE pcrindex`
pub const MEASURE: CommandDescriptor = CommandDescriptor {
    name: "measure",
    usage: "FILE pcrindex",
    help: "Perform TCG measurement operation with the file FILE and with PCR( pcrindex ).",
    failure_message: "Measurement failed",
    policy: FailurePolicy::Propagate,
};

/// `setmor disableAutoDetect`
pub const SETMOR: CommandDescriptor = CommandDescriptor {
    name: "setmor",
    usage: "disableAutoDetect",
    help: "Sets Memory Overwrite Request Bit with auto detect enabled (0) or disabled (1)",
    failure_message: "Setting MOR bit failed",
    policy: FailurePolicy::Report,
};

/// All commands, in registration order
pub static COMMANDS: [CommandDescriptor; 4] = [READPCR, TCGLOG, MEASURE, SETMOR];

/// Look up a command by name
pub fn find(name: &str) -> Option<&'static CommandDescriptor> {
    COMMANDS.iter().find(|command| command.name == name)
}

// =============================================================================
// MODULE LIFECYCLE
// =============================================================================

/// The boot loader's command table
pub trait CommandRegistrar {
    /// Make a command callable
    fn register(&mut self, command: &'static CommandDescriptor);

    /// Remove a command by name
    fn unregister(&mut self, name: &str);
}

/// Registration state of the TPM commands
#[derive(Debug, Default)]
pub struct TcgModule {
    loaded: bool,
}

impl TcgModule {
    /// Create an unloaded module
    pub const fn new() -> Self {
        Self { loaded: false }
    }

    /// Register all four commands
    ///
    /// Loading twice registers nothing the second time.
    pub fn init<R: CommandRegistrar + ?Sized>(&mut self, registrar: &mut R) {
        if self.loaded {
            log::warn!("tcg module already loaded");
            return;
        }
        for command in &COMMANDS {
            registrar.register(command);
        }
        self.loaded = true;
        log::info!("tcg module loaded: {} commands", COMMANDS.len());
    }

    /// Unregister the commands registered by [`TcgModule::init`]
    pub fn fini<R: CommandRegistrar + ?Sized>(&mut self, registrar: &mut R) {
        if !self.loaded {
            return;
        }
        for command in &COMMANDS {
            registrar.unregister(command.name);
        }
        self.loaded = false;
        log::info!("tcg module unloaded");
    }

    /// Whether the commands are registered
    pub const fn is_loaded(&self) -> bool {
        self.loaded
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

fn tpm_present<D: TpmDriver>(tpm: &mut Tpm<D>, out: &mut dyn fmt::Write) -> bool {
    if tpm.is_available() {
        return true;
    }
    line(out, format_args!("{}", TPM_NOT_AVAILABLE));
    false
}

/// Print a parse error and finish with a clean status
fn parse_failed(command: &CommandDescriptor, err: ParseError, out: &mut dyn fmt::Write) -> CommandResult {
    log::debug!("{}: {}", command.name, err);
    line(out, format_args!("error: {}.", err));
    Ok(())
}

/// Apply the command's failure policy
fn failed(command: &CommandDescriptor, err: CommandError, out: &mut dyn fmt::Write) -> CommandResult {
    match command.policy {
        FailurePolicy::Report => {
            log::warn!("{}: {}", command.name, err);
            line(out, format_args!("{}", command.failure_message));
            Ok(())
        }
        FailurePolicy::Propagate => {
            log::error!("{}: {}", command.name, err);
            Err(err)
        }
    }
}

/// `readpcr pcrindex`
pub fn readpcr<D: TpmDriver>(tpm: &mut Tpm<D>, args: &[&str], out: &mut dyn fmt::Write) -> CommandResult {
    if !tpm_present(tpm, out) {
        return Ok(());
    }
    let arg = args::single(args, messages::INDEX_EXPECTED)?;
    let index = match args::parse_u32(arg) {
        Ok(index) => index,
        Err(err) => return parse_failed(&READPCR, err, out),
    };

    match tpm.read_pcr(index) {
        Ok(value) => {
            line(out, format_args!("{}", PcrDisplay { index, value }));
            Ok(())
        }
        Err(err) => failed(&READPCR, err.into(), out),
    }
}

/// `tcglog logindex`
///
/// `0` prints every entry; `n` prints the n-th entry, counting from 1.
pub fn tcglog<D: TpmDriver>(
    tpm: &mut Tpm<D>,
    config: &TcgConfig,
    args: &[&str],
    out: &mut dyn fmt::Write,
) -> CommandResult {
    if !tpm_present(tpm, out) {
        return Ok(());
    }
    let arg = args::single(args, messages::INDEX_EXPECTED)?;
    let index = match args::parse_u32(arg) {
        Ok(index) => index,
        Err(err) => return parse_failed(&TCGLOG, err, out),
    };

    let log = match tpm.event_log() {
        Ok(log) => log,
        Err(err) => return failed(&TCGLOG, err.into(), out),
    };

    if index == 0 {
        for (n, entry) in log.entries().enumerate() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => return failed(&TCGLOG, err.into(), out),
            };
            let shown = EntryDisplay {
                position: n + 1,
                entry: &entry,
                show_data: config.show_event_data,
            };
            line(out, format_args!("{}", shown));
        }
        return Ok(());
    }

    match log.entry(index as usize) {
        Ok(Some(entry)) => {
            let shown = EntryDisplay {
                position: index as usize,
                entry: &entry,
                show_data: config.show_event_data,
            };
            line(out, format_args!("{}", shown));
            Ok(())
        }
        Ok(None) => failed(&TCGLOG, CommandError::EntryNotFound(index), out),
        Err(err) => failed(&TCGLOG, err.into(), out),
    }
}

/// `measure FILE pcrindex`
///
/// Prints nothing on success.
pub fn measure<D, F, E>(
    tpm: &mut Tpm<D>,
    files: &mut F,
    engine: &E,
    config: &TcgConfig,
    args: &[&str],
    out: &mut dyn fmt::Write,
) -> CommandResult
where
    D: TpmDriver,
    F: FileSource + ?Sized,
    E: DigestEngine + ?Sized,
{
    if !tpm_present(tpm, out) {
        return Ok(());
    }
    let [path, index] = args::exactly::<2>(args)?;
    let pcr_index = match args::parse_u32(index) {
        Ok(index) => index,
        Err(err) => return parse_failed(&MEASURE, err, out),
    };

    match tpm.measure_file(files, engine, config, path, pcr_index) {
        Ok(_) => Ok(()),
        Err(err) => failed(&MEASURE, err.into(), out),
    }
}

/// `setmor disableAutoDetect`
pub fn setmor<D: TpmDriver>(tpm: &mut Tpm<D>, args: &[&str], out: &mut dyn fmt::Write) -> CommandResult {
    if !tpm_present(tpm, out) {
        return Ok(());
    }
    let arg = args::single(args, messages::VALUE_EXPECTED)?;
    let value = match args::parse_u32(arg) {
        Ok(value) => value,
        Err(err) => return parse_failed(&SETMOR, err, out),
    };
    let request = MorRequest::from_value(value)?;

    match tpm.set_mor(request) {
        Ok(()) => Ok(()),
        Err(err) => failed(&SETMOR, err.into(), out),
    }
}

// =============================================================================
// SHELL
// =============================================================================

/// Self-contained dispatcher for boot environments without one
///
/// Owns the TPM handle, the file source, the digest engine and the
/// settings the commands need.
#[derive(Debug)]
pub struct Shell<D, F, E = Sha1Engine> {
    tpm: Tpm<D>,
    files: F,
    engine: E,
    config: TcgConfig,
}

impl<D: TpmDriver, F: FileSource> Shell<D, F> {
    /// Create a shell using SHA-1 and default settings
    pub fn new(driver: D, files: F) -> Self {
        Self {
            tpm: Tpm::new(driver),
            files,
            engine: Sha1Engine,
            config: TcgConfig::default(),
        }
    }
}

impl<D: TpmDriver, F: FileSource, E: DigestEngine> Shell<D, F, E> {
    /// Replace the settings
    pub fn with_config(mut self, config: TcgConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the digest engine
    pub fn with_engine<E2: DigestEngine>(self, engine: E2) -> Shell<D, F, E2> {
        Shell {
            tpm: self.tpm,
            files: self.files,
            engine,
            config: self.config,
        }
    }

    /// Current settings
    pub fn config(&self) -> &TcgConfig {
        &self.config
    }

    /// The TPM handle
    pub fn tpm(&self) -> &Tpm<D> {
        &self.tpm
    }

    /// The TPM handle, mutably
    pub fn tpm_mut(&mut self) -> &mut Tpm<D> {
        &mut self.tpm
    }

    /// Take back the driver and the file source
    pub fn into_parts(self) -> (D, F) {
        (self.tpm.into_inner(), self.files)
    }

    /// Run a command by name
    ///
    /// Returns `None` for a name that is not a TPM command.
    pub fn run(&mut self, name: &str, args: &[&str], out: &mut dyn fmt::Write) -> Option<CommandResult> {
        let command = find(name)?;
        log::debug!("run {} {:?}", command.name, args);

        let result = match command.name {
            "readpcr" => readpcr(&mut self.tpm, args, out),
            "tcglog" => tcglog(&mut self.tpm, &self.config, args, out),
            "measure" => measure(
                &mut self.tpm,
                &mut self.files,
                &self.engine,
                &self.config,
                args,
                out,
            ),
            "setmor" => setmor(&mut self.tpm, args, out),
            other => {
                log::error!("no handler for command {}", other);
                return None;
            }
        };
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MeasureError;
    use crate::file::{FileError, MemoryFiles};
    use alloc::string::String;
    use alloc::vec::Vec;
    use tcgboot_hal::soft::SoftTpm;
    use tcgboot_hal::MorFlags;

    #[derive(Default)]
    struct Table {
        names: Vec<&'static str>,
    }

    impl CommandRegistrar for Table {
        fn register(&mut self, command: &'static CommandDescriptor) {
            self.names.push(command.name);
        }

        fn unregister(&mut self, name: &str) {
            self.names.retain(|n| *n != name);
        }
    }

    #[test]
    fn test_descriptors() {
        let names: Vec<_> = COMMANDS.iter().map(|c| c.name).collect();
        assert_eq!(names, ["readpcr", "tcglog", "measure", "setmor"]);
        assert_eq!(find("measure").map(|c| c.usage), Some("FILE pcrindex"));
        assert_eq!(find("setmor").map(|c| c.usage), Some("disableAutoDetect"));
        assert!(find("boot").is_none());
    }

    #[test]
    fn test_failure_policies() {
        assert_eq!(READPCR.policy, FailurePolicy::Report);
        assert_eq!(TCGLOG.policy, FailurePolicy::Report);
        assert_eq!(SETMOR.policy, FailurePolicy::Report);
        assert_eq!(MEASURE.policy, FailurePolicy::Propagate);
    }

    #[test]
    fn test_module_lifecycle() {
        let mut table = Table::default();
        let mut module = TcgModule::new();

        module.init(&mut table);
        module.init(&mut table);
        assert!(module.is_loaded());
        assert_eq!(table.names.len(), 4);

        module.fini(&mut table);
        assert!(!module.is_loaded());
        assert!(table.names.is_empty());
    }

    #[test]
    fn test_failed_report_prints_message() {
        let mut out = String::new();
        let result = failed(&SETMOR, CommandError::EntryNotFound(3), &mut out);
        assert_eq!(result, Ok(()));
        assert_eq!(out, "Setting MOR bit failed\n");
    }

    #[test]
    fn test_failed_propagate_prints_nothing() {
        let mut out = String::new();
        let err = CommandError::EntryNotFound(3);
        assert_eq!(failed(&MEASURE, err.clone(), &mut out), Err(err));
        assert!(out.is_empty());
    }

    #[test]
    fn test_run_handles_every_descriptor() {
        let mut shell = Shell::new(SoftTpm::new(), MemoryFiles::new());
        for command in &COMMANDS {
            let mut out = String::new();
            assert!(shell.run(command.name, &[], &mut out).is_some(), "{}", command.name);
        }
        assert!(shell.run("boot", &[], &mut String::new()).is_none());
    }

    #[test]
    fn test_run_routes_each_name_to_its_handler() {
        let mut shell = Shell::new(SoftTpm::new(), MemoryFiles::new());

        let mut out = String::new();
        assert_eq!(shell.run("readpcr", &["0"], &mut out), Some(Ok(())));
        assert!(out.starts_with("PCR[00]="));

        let mut out = String::new();
        assert_eq!(shell.run("tcglog", &["1"], &mut out), Some(Ok(())));
        assert_eq!(out, "Read tcglog failed\n");

        let mut out = String::new();
        assert_eq!(
            shell.run("measure", &["/boot/none", "4"], &mut out),
            Some(Err(CommandError::Measurement(MeasureError::File(FileError::NotFound))))
        );

        let mut out = String::new();
        assert_eq!(shell.run("setmor", &["1"], &mut out), Some(Ok(())));
        assert!(out.is_empty());

        let (soft, _) = shell.into_parts();
        assert_eq!(soft.mor(), Some(MorFlags::CLEAR_MEMORY | MorFlags::DISABLE_AUTO_DETECT));
        assert_eq!(soft.calls().mor_writes, 1);
    }
}
