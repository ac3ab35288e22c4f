//! Fixed-size radio frame codec.
//!
//! Every frame exchanged with the server carries exactly one leading opcode
//! byte followed by reserved payload bytes. The frame length is fixed per
//! protocol generation; anything of the wrong length or with an opcode outside
//! the command set is malformed. The codec is pure and never blocks: the radio
//! transport hands over complete frames or nothing.

use core::fmt;

/// Largest frame any protocol generation uses.
pub const MAX_FRAME_LEN: usize = 12;

/// Frame length used by a given protocol generation.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ProtocolGeneration {
    /// First-generation nodes exchange 10-byte payloads.
    #[default]
    Legacy10,
    /// Later nodes exchange 12-byte payloads.
    Extended12,
}

impl ProtocolGeneration {
    #[must_use]
    pub const fn frame_len(self) -> usize {
        match self {
            ProtocolGeneration::Legacy10 => 10,
            ProtocolGeneration::Extended12 => 12,
        }
    }
}

/// Server commands carried in radio frames.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Command {
    Auto,
    Enable,
    Disable,
    DumpLogging,
    UpdateTable,
    MemoryCheck,
    MemoryClear,
    DoubleActivation,
    SingleActivation,
    Check,
    EraseLog,
}

impl Command {
    /// Every command, in opcode order.
    pub const ALL: [Command; 11] = [
        Command::Auto,
        Command::Enable,
        Command::Disable,
        Command::DumpLogging,
        Command::UpdateTable,
        Command::MemoryCheck,
        Command::MemoryClear,
        Command::DoubleActivation,
        Command::SingleActivation,
        Command::Check,
        Command::EraseLog,
    ];

    #[must_use]
    pub const fn opcode(self) -> u8 {
        match self {
            Command::Auto => 0xA0,
            Command::Enable => 0xA1,
            Command::Disable => 0xA2,
            Command::DumpLogging => 0xA3,
            Command::UpdateTable => 0xA4,
            Command::MemoryCheck => 0xA5,
            Command::MemoryClear => 0xA6,
            Command::DoubleActivation => 0xA7,
            Command::SingleActivation => 0xA8,
            Command::Check => 0xA9,
            Command::EraseLog => 0xB0,
        }
    }

    #[must_use]
    pub const fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode {
            0xA0 => Some(Command::Auto),
            0xA1 => Some(Command::Enable),
            0xA2 => Some(Command::Disable),
            0xA3 => Some(Command::DumpLogging),
            0xA4 => Some(Command::UpdateTable),
            0xA5 => Some(Command::MemoryCheck),
            0xA6 => Some(Command::MemoryClear),
            0xA7 => Some(Command::DoubleActivation),
            0xA8 => Some(Command::SingleActivation),
            0xA9 => Some(Command::Check),
            0xB0 => Some(Command::EraseLog),
            _ => None,
        }
    }

    /// Short lowercase name used by logs and the debug console.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Command::Auto => "auto",
            Command::Enable => "enable",
            Command::Disable => "disable",
            Command::DumpLogging => "dump-logging",
            Command::UpdateTable => "update-table",
            Command::MemoryCheck => "memory-check",
            Command::MemoryClear => "memory-clear",
            Command::DoubleActivation => "double-activation",
            Command::SingleActivation => "single-activation",
            Command::Check => "check",
            Command::EraseLog => "erase-log",
        }
    }

    /// Looks up a command by its [`label`](Self::label), ignoring ASCII case.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|command| command.label().eq_ignore_ascii_case(label))
    }

    /// Commands that delegate to the credential store before replying.
    #[must_use]
    pub const fn is_bookkeeping(self) -> bool {
        matches!(
            self,
            Command::DumpLogging
                | Command::UpdateTable
                | Command::MemoryCheck
                | Command::MemoryClear
                | Command::Check
                | Command::EraseLog
        )
    }

    /// Deterministic index into [`Command::ALL`].
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            Command::Auto => 0,
            Command::Enable => 1,
            Command::Disable => 2,
            Command::DumpLogging => 3,
            Command::UpdateTable => 4,
            Command::MemoryCheck => 5,
            Command::MemoryClear => 6,
            Command::DoubleActivation => 7,
            Command::SingleActivation => 8,
            Command::Check => 9,
            Command::EraseLog => 10,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl TryFrom<u8> for Command {
    type Error = DecodeError;

    fn try_from(opcode: u8) -> Result<Self, Self::Error> {
        Command::from_opcode(opcode).ok_or(DecodeError::UnknownOpcode(opcode))
    }
}

/// Replies sent back to the server.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Reply {
    Ok,
    Error,
}

impl Reply {
    #[must_use]
    pub const fn opcode(self) -> u8 {
        match self {
            Reply::Ok => 0xAF,
            Reply::Error => 0xA0,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Reply::Ok => "ok",
            Reply::Error => "error",
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Reasons a received frame is malformed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DecodeError {
    /// Frame length does not match the protocol generation.
    Length { expected: usize, found: usize },
    /// Leading byte is not a known command opcode.
    UnknownOpcode(u8),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Length { expected, found } => {
                write!(f, "frame length {found}, expected {expected}")
            }
            DecodeError::UnknownOpcode(opcode) => write!(f, "unknown opcode {opcode:#04X}"),
        }
    }
}

/// Fixed-capacity frame buffer exchanged with the radio transport.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Frame {
    bytes: [u8; MAX_FRAME_LEN],
    len: usize,
}

impl Frame {
    /// Zero-filled frame of `len` bytes, clamped to [`MAX_FRAME_LEN`].
    #[must_use]
    pub const fn zeroed(len: usize) -> Self {
        let len = if len > MAX_FRAME_LEN {
            MAX_FRAME_LEN
        } else {
            len
        };
        Self {
            bytes: [0; MAX_FRAME_LEN],
            len,
        }
    }

    /// Copies `bytes` into a frame.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Length`] when the slice exceeds [`MAX_FRAME_LEN`].
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() > MAX_FRAME_LEN {
            return Err(DecodeError::Length {
                expected: MAX_FRAME_LEN,
                found: bytes.len(),
            });
        }

        let mut frame = Self::zeroed(bytes.len());
        frame.bytes[..bytes.len()].copy_from_slice(bytes);
        Ok(frame)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Mutable access to the frame contents, used by transports filling a
    /// receive buffer in place.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes[..self.len]
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Leading opcode byte, if the frame is not empty.
    #[must_use]
    pub fn opcode(&self) -> Option<u8> {
        self.as_slice().first().copied()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Frame[")?;
        for (index, byte) in self.as_slice().iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02X}")?;
        }
        f.write_str("]")
    }
}

/// A decoded command together with the payload bytes that followed its opcode.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CommandFrame<'a> {
    pub command: Command,
    pub payload: &'a [u8],
}

/// Encoder/decoder bound to a single protocol generation.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RadioCodec {
    generation: ProtocolGeneration,
}

impl RadioCodec {
    #[must_use]
    pub const fn new(generation: ProtocolGeneration) -> Self {
        Self { generation }
    }

    #[must_use]
    pub const fn generation(self) -> ProtocolGeneration {
        self.generation
    }

    #[must_use]
    pub const fn frame_len(self) -> usize {
        self.generation.frame_len()
    }

    /// Decodes a frame into a command.
    ///
    /// # Errors
    ///
    /// See [`decode_frame`](Self::decode_frame).
    pub fn decode(self, frame: &[u8]) -> Result<Command, DecodeError> {
        self.decode_frame(frame).map(|decoded| decoded.command)
    }

    /// Decodes a frame, keeping the payload bytes that follow the opcode.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Length`] unless the frame is exactly
    /// [`frame_len`](Self::frame_len) bytes, and [`DecodeError::UnknownOpcode`]
    /// when the first byte names no command.
    pub fn decode_frame<'a>(self, frame: &'a [u8]) -> Result<CommandFrame<'a>, DecodeError> {
        let expected = self.frame_len();
        let length_error = DecodeError::Length {
            expected,
            found: frame.len(),
        };
        if frame.len() != expected {
            return Err(length_error);
        }

        let (&opcode, payload) = frame.split_first().ok_or(length_error)?;
        let command = Command::try_from(opcode)?;
        Ok(CommandFrame { command, payload })
    }

    /// Encodes a reply as a zero-padded frame.
    #[must_use]
    pub fn encode(self, reply: Reply) -> Frame {
        let mut frame = Frame::zeroed(self.frame_len());
        frame.bytes[0] = reply.opcode();
        frame
    }

    /// Encodes a command as a zero-padded frame carrying `payload` after the
    /// opcode. Payload bytes beyond the frame length are dropped.
    #[must_use]
    pub fn encode_command(self, command: Command, payload: &[u8]) -> Frame {
        let mut frame = Frame::zeroed(self.frame_len());
        frame.bytes[0] = command.opcode();
        let room = frame.len - 1;
        let copied = payload.len().min(room);
        frame.bytes[1..=copied].copy_from_slice(&payload[..copied]);
        frame
    }
}
