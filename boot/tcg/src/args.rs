//! Command argument checks and number parsing

use crate::error::{messages, CommandError, ParseError};

/// Take the single argument of a one-argument command
///
/// `missing` is the message used when no argument was given.
pub fn single<'a>(args: &[&'a str], missing: &'static str) -> Result<&'a str, CommandError> {
    match args {
        [] => Err(CommandError::BadArgument(missing)),
        [arg] => Ok(*arg),
        _ => Err(CommandError::BadArgument(messages::TOO_MANY_ARGUMENTS)),
    }
}

/// Take exactly `N` arguments
pub fn exactly<'a, const N: usize>(args: &[&'a str]) -> Result<[&'a str; N], CommandError> {
    if args.len() != N {
        return Err(CommandError::BadArgument(messages::WRONG_NUMBER_OF_ARGUMENTS));
    }
    let mut out = [""; N];
    out.copy_from_slice(args);
    Ok(out)
}

/// Parse a non-negative decimal integer
///
/// Only ASCII digits are accepted: no sign, no radix prefix, no
/// surrounding whitespace.
pub fn parse_u32(text: &str) -> Result<u32, ParseError> {
    if text.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut value: u32 = 0;
    for (position, byte) in text.bytes().enumerate() {
        let digit = match byte {
            b'0'..=b'9' => u32::from(byte - b'0'),
            _ => return Err(ParseError::InvalidDigit { position }),
        };
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(digit))
            .ok_or(ParseError::Overflow)?;
    }
    Ok(value)
}
