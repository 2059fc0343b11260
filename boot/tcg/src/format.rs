//! Console formatting helpers

use core::fmt;

/// Bytes as uppercase hex pairs separated by spaces
#[derive(Debug, Clone, Copy)]
pub struct SpacedHex<'a>(pub &'a [u8]);

impl fmt::Display for SpacedHex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

/// Event data as text when printable, otherwise as hex
#[derive(Debug, Clone, Copy)]
pub struct EventData<'a>(pub &'a [u8]);

impl EventData<'_> {
    /// Check if the payload reads as text
    ///
    /// A single trailing NUL is tolerated, as firmware often stores C strings.
    pub fn is_text(&self) -> bool {
        let body = self.0.strip_suffix(&[0]).unwrap_or(self.0);
        !body.is_empty() && body.iter().all(|&b| b == b' ' || b.is_ascii_graphic())
    }
}

impl fmt::Display for EventData<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_text() {
            let body = self.0.strip_suffix(&[0]).unwrap_or(self.0);
            for &b in body {
                write!(f, "{}", b as char)?;
            }
            Ok(())
        } else {
            write!(f, "{}", SpacedHex(self.0))
        }
    }
}

/// Write one line to the console
///
/// The console has nowhere to report its own failures, so they are dropped.
pub(crate) fn line(out: &mut dyn fmt::Write, args: fmt::Arguments<'_>) {
    if out.write_fmt(args).and_then(|()| out.write_char('\n')).is_err() {
        log::debug!("console write failed");
    }
}
