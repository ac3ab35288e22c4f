//! Line-oriented debug console shared by the emulator and bench tooling.
//!
//! Each line maps to one [`ConsoleCommand`] that drives the simulated
//! collaborators around a node loop: present or remove a card, inject radio
//! frames, advance time, and inspect state. Parsing lives in [`grammar`].

pub mod grammar;

use core::fmt;
use core::time::Duration;

use heapless::Vec;

use crate::codec::{Command, MAX_FRAME_LEN};
use crate::credential::CredentialId;

pub use grammar::parse;

/// Raw bytes typed as hex on the console.
pub type HexBytes = Vec<u8, MAX_FRAME_LEN>;

/// Collaborator a `fault` command breaks.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FaultTarget {
    Reader,
    Store,
}

impl FaultTarget {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            FaultTarget::Reader => "reader",
            FaultTarget::Store => "store",
        }
    }
}

/// Console keywords, one per command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Keyword {
    Card,
    Remove,
    Send,
    Raw,
    Advance,
    Fault,
    Status,
    Log,
    Reset,
    Help,
}

/// Static description of one console command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CommandSpec {
    pub keyword: Keyword,
    pub name: &'static str,
    pub usage: &'static str,
    pub summary: &'static str,
}

/// Every console command with its usage line, in help order.
pub const COMMAND_SUMMARY: &[CommandSpec] = &[
    CommandSpec {
        keyword: Keyword::Card,
        name: "card",
        usage: "card <uid-hex>",
        summary: "hold a card in front of the reader",
    },
    CommandSpec {
        keyword: Keyword::Remove,
        name: "remove",
        usage: "remove",
        summary: "take the card away",
    },
    CommandSpec {
        keyword: Keyword::Send,
        name: "send",
        usage: "send <command> [payload-hex]",
        summary: "queue a server command frame",
    },
    CommandSpec {
        keyword: Keyword::Raw,
        name: "raw",
        usage: "raw <frame-hex>",
        summary: "queue raw frame bytes, malformed or not",
    },
    CommandSpec {
        keyword: Keyword::Advance,
        name: "advance",
        usage: "advance <n>[ms|s]",
        summary: "run the node loop for the given time",
    },
    CommandSpec {
        keyword: Keyword::Fault,
        name: "fault",
        usage: "fault <reader|store>",
        summary: "make a collaborator fail on its next use",
    },
    CommandSpec {
        keyword: Keyword::Status,
        name: "status",
        usage: "status",
        summary: "print state, mode and output levels",
    },
    CommandSpec {
        keyword: Keyword::Log,
        name: "log",
        usage: "log",
        summary: "print the access log",
    },
    CommandSpec {
        keyword: Keyword::Reset,
        name: "reset",
        usage: "reset",
        summary: "power-cycle the node",
    },
    CommandSpec {
        keyword: Keyword::Help,
        name: "help",
        usage: "help [command]",
        summary: "list commands",
    },
];

impl Keyword {
    /// Finds a keyword by name, ignoring ASCII case.
    #[must_use]
    pub fn find(name: &str) -> Option<Self> {
        COMMAND_SUMMARY
            .iter()
            .find(|spec| spec.name.eq_ignore_ascii_case(name))
            .map(|spec| spec.keyword)
    }

    /// Catalog entry for this keyword. [`COMMAND_SUMMARY`] is laid out in
    /// declaration order.
    #[must_use]
    pub const fn spec(self) -> &'static CommandSpec {
        &COMMAND_SUMMARY[self as usize]
    }
}

/// Structured commands produced by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    Card(CredentialId),
    Remove,
    Send { command: Command, payload: HexBytes },
    Raw(HexBytes),
    Advance(Duration),
    Fault(FaultTarget),
    Status,
    Log,
    Reset,
    Help(Option<Keyword>),
}

/// Console parse failures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    /// Line was blank.
    Empty,
    /// First word is not a console command.
    UnknownCommand(&'a str),
    /// Arguments did not match the command's usage line.
    Usage(&'static CommandSpec),
    /// Unparsed input after a complete command.
    Trailing(&'a str),
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Empty => f.write_str("empty command"),
            ParseError::UnknownCommand(word) => write!(f, "unknown command `{word}`"),
            ParseError::Usage(spec) => write!(f, "usage: {}", spec.usage),
            ParseError::Trailing(rest) => write!(f, "unexpected input `{rest}`"),
        }
    }
}
