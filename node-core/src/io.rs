//! Narrow interfaces to the hardware collaborators driven by the node loop.
//!
//! Firmware binds these traits to GPIO, the RC522 reader, and the nRF24 radio;
//! the emulator and tests bind them to in-memory doubles.

use crate::codec::Frame;
use crate::credential::CredentialId;

/// Logical level of a digital output.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Level {
    #[default]
    Low,
    High,
}

impl Level {
    #[must_use]
    pub const fn from_bool(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }

    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Level::Low => "low",
            Level::High => "high",
        }
    }
}

/// Named output lines owned by the node.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputLine {
    Relay,
    GreenLed,
    RedLed,
}

impl OutputLine {
    pub const ALL: [OutputLine; 3] = [OutputLine::Relay, OutputLine::GreenLed, OutputLine::RedLed];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            OutputLine::Relay => "relay",
            OutputLine::GreenLed => "green",
            OutputLine::RedLed => "red",
        }
    }
}

/// Abstraction over the digital outputs.
pub trait OutputDriver {
    /// Drives `line` to `level`.
    fn set_line(&mut self, line: OutputLine, level: Level);
}

/// Output driver that performs no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopOutputDriver;

impl NoopOutputDriver {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl OutputDriver for NoopOutputDriver {
    fn set_line(&mut self, _: OutputLine, _: Level) {}
}

/// Proximity credential reader.
pub trait CredentialReader {
    type Error;

    /// Returns the credential currently in range, or `None` when no card is
    /// present. Errors are treated as unrecoverable reader faults.
    fn poll(&mut self) -> Result<Option<CredentialId>, Self::Error>;
}

/// Frame transport to the server. Acknowledgement and retries happen below
/// this interface; every call returns promptly.
pub trait RadioTransport {
    type Error;

    /// Returns the next complete frame, if one is pending.
    fn try_receive(&mut self) -> Result<Option<Frame>, Self::Error>;

    /// Sends one complete frame.
    fn send(&mut self, frame: &[u8]) -> Result<(), Self::Error>;
}
