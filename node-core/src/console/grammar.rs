//! `winnow` grammar for console lines.
//!
//! The keyword is matched first against [`COMMAND_SUMMARY`](super::COMMAND_SUMMARY);
//! the rest of the line is parsed by the argument grammar for that keyword.

use core::time::Duration;

use winnow::ModalResult;
use winnow::ascii::{Caseless, dec_uint, hex_digit1, space1};
use winnow::combinator::{alt, opt, preceded};
use winnow::error::ErrMode;
use winnow::prelude::*;
use winnow::token::take_while;

use super::{ConsoleCommand, FaultTarget, HexBytes, Keyword, ParseError};
use crate::codec::Command;
use crate::credential::CredentialId;

type Input<'a> = &'a str;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Unit {
    Millis,
    Seconds,
}

/// Parses one console line.
///
/// # Errors
///
/// Returns a [`ParseError`] naming what was wrong with the line.
pub fn parse(line: &str) -> Result<ConsoleCommand, ParseError<'_>> {
    let mut input = line.trim();
    if input.is_empty() {
        return Err(ParseError::Empty);
    }

    let keyword = match word.parse_next(&mut input) {
        Ok(name) => Keyword::find(name).ok_or(ParseError::UnknownCommand(name))?,
        Err(_) => return Err(ParseError::UnknownCommand(input)),
    };

    let command = match arguments(keyword, &mut input) {
        Ok(command) => command,
        Err(ErrMode::Backtrack(_) | ErrMode::Cut(_) | ErrMode::Incomplete(_)) => {
            return Err(ParseError::Usage(keyword.spec()));
        }
    };

    let rest = input.trim_start();
    if rest.is_empty() {
        Ok(command)
    } else {
        Err(ParseError::Trailing(rest))
    }
}

fn arguments(keyword: Keyword, input: &mut Input<'_>) -> ModalResult<ConsoleCommand> {
    match keyword {
        Keyword::Card => preceded(space1, credential)
            .map(ConsoleCommand::Card)
            .parse_next(input),
        Keyword::Remove => Ok(ConsoleCommand::Remove),
        Keyword::Send => (
            preceded(space1, radio_command),
            opt(preceded(space1, hex_bytes)),
        )
            .map(|(command, payload)| ConsoleCommand::Send {
                command,
                payload: payload.unwrap_or_default(),
            })
            .parse_next(input),
        Keyword::Raw => preceded(space1, hex_bytes)
            .map(ConsoleCommand::Raw)
            .parse_next(input),
        Keyword::Advance => preceded(space1, duration)
            .map(ConsoleCommand::Advance)
            .parse_next(input),
        Keyword::Fault => preceded(space1, fault_target)
            .map(ConsoleCommand::Fault)
            .parse_next(input),
        Keyword::Status => Ok(ConsoleCommand::Status),
        Keyword::Log => Ok(ConsoleCommand::Log),
        Keyword::Reset => Ok(ConsoleCommand::Reset),
        Keyword::Help => opt(preceded(space1, word.verify_map(Keyword::find)))
            .map(ConsoleCommand::Help)
            .parse_next(input),
    }
}

fn word<'a>(input: &mut Input<'a>) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '-').parse_next(input)
}

fn radio_command(input: &mut Input<'_>) -> ModalResult<Command> {
    word.verify_map(Command::from_label).parse_next(input)
}

fn credential(input: &mut Input<'_>) -> ModalResult<CredentialId> {
    hex_bytes
        .verify_map(|bytes| CredentialId::new(&bytes))
        .parse_next(input)
}

fn hex_bytes(input: &mut Input<'_>) -> ModalResult<HexBytes> {
    hex_digit1.verify_map(decode_hex).parse_next(input)
}

fn fault_target(input: &mut Input<'_>) -> ModalResult<FaultTarget> {
    alt((
        Caseless("reader").value(FaultTarget::Reader),
        Caseless("store").value(FaultTarget::Store),
    ))
    .parse_next(input)
}

fn duration(input: &mut Input<'_>) -> ModalResult<Duration> {
    (
        dec_uint::<_, u64, _>,
        opt(alt((
            Caseless("ms").value(Unit::Millis),
            Caseless("s").value(Unit::Seconds),
        ))),
    )
        .map(|(value, unit)| match unit {
            Some(Unit::Seconds) => Duration::from_secs(value),
            Some(Unit::Millis) | None => Duration::from_millis(value),
        })
        .parse_next(input)
}

/// Splits an even-length run of hex digits into bytes.
fn decode_hex(digits: &str) -> Option<HexBytes> {
    let pairs = digits.as_bytes().chunks_exact(2);
    if !pairs.remainder().is_empty() {
        return None;
    }

    let mut bytes = HexBytes::new();
    for pair in pairs {
        let text = core::str::from_utf8(pair).ok()?;
        let byte = u8::from_str_radix(text, 16).ok()?;
        bytes.push(byte).ok()?;
    }
    Some(bytes)
}
