#![allow(dead_code)]

use std::collections::VecDeque;

use access_node_core::codec::{Command, Frame, ProtocolGeneration, RadioCodec};
use access_node_core::config::NodeConfig;
use access_node_core::credential::CredentialId;
use access_node_core::io::{CredentialReader, Level, OutputDriver, OutputLine, RadioTransport};
use access_node_core::node::{NodeLoop, TickReport};
use access_node_core::store::{
    AccessLogEntry, AccessStore, MemoryReport, MemoryStore, StoreError, TableUpdate,
};
use access_node_core::time::{Clock, ManualClock, Millis};

pub const ALICE: CredentialId = CredentialId::from_u32(0xA11C_E001);
pub const BOB: CredentialId = CredentialId::from_u32(0x0B0B_0002);
pub const MALLORY: CredentialId = CredentialId::from_u32(0xBAD0_0003);

#[derive(Debug, Eq, PartialEq)]
pub struct ReaderOffline;

/// Reader that reports whatever card the test placed in front of it.
#[derive(Debug, Default)]
pub struct ScriptedReader {
    pub card: Option<CredentialId>,
    pub fail: bool,
    pub polls: usize,
}

impl CredentialReader for ScriptedReader {
    type Error = ReaderOffline;

    fn poll(&mut self) -> Result<Option<CredentialId>, Self::Error> {
        self.polls += 1;
        if self.fail {
            return Err(ReaderOffline);
        }
        Ok(self.card)
    }
}

#[derive(Debug, Eq, PartialEq)]
pub struct LinkDown;

/// Radio backed by an inbox queue and a list of sent frames.
#[derive(Debug, Default)]
pub struct QueuedRadio {
    pub inbox: VecDeque<Frame>,
    pub sent: Vec<Frame>,
    pub fail_receive: bool,
    pub fail_send: bool,
    pub receives: usize,
}

impl RadioTransport for QueuedRadio {
    type Error = LinkDown;

    fn try_receive(&mut self) -> Result<Option<Frame>, Self::Error> {
        self.receives += 1;
        if self.fail_receive {
            return Err(LinkDown);
        }
        Ok(self.inbox.pop_front())
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        if self.fail_send {
            return Err(LinkDown);
        }
        self.sent.push(Frame::from_slice(frame).map_err(|_| LinkDown)?);
        Ok(())
    }
}

/// Output driver remembering the current level and every write.
#[derive(Debug, Default)]
pub struct RecordingOutputs {
    pub writes: Vec<(OutputLine, Level)>,
}

impl RecordingOutputs {
    pub fn level(&self, line: OutputLine) -> Level {
        self.writes
            .iter()
            .rev()
            .find(|(written, _)| *written == line)
            .map_or(Level::Low, |(_, level)| *level)
    }

    pub fn relay(&self) -> Level {
        self.level(OutputLine::Relay)
    }
}

impl OutputDriver for RecordingOutputs {
    fn set_line(&mut self, line: OutputLine, level: Level) {
        self.writes.push((line, level));
    }
}

/// Memory store that can be armed to fail its next operation.
pub struct FlakyStore {
    pub inner: MemoryStore<Millis>,
    pub fail_next: Option<StoreError>,
}

impl FlakyStore {
    pub fn with_credentials(credentials: &[CredentialId]) -> Self {
        Self {
            inner: MemoryStore::with_credentials(credentials).expect("test table fits"),
            fail_next: None,
        }
    }

    fn armed(&mut self) -> Result<(), StoreError> {
        match self.fail_next.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl AccessStore<Millis> for FlakyStore {
    fn is_authorized(&mut self, credential: &CredentialId) -> Result<bool, StoreError> {
        self.armed()?;
        self.inner.is_authorized(credential)
    }

    fn append(&mut self, entry: AccessLogEntry<Millis>) -> Result<(), StoreError> {
        self.armed()?;
        self.inner.append(entry)
    }

    fn dump_log(&mut self) -> Result<usize, StoreError> {
        self.armed()?;
        self.inner.dump_log()
    }

    fn update_table(&mut self, payload: &[u8]) -> Result<TableUpdate, StoreError> {
        self.armed()?;
        self.inner.update_table(payload)
    }

    fn memory_check(&mut self) -> Result<MemoryReport, StoreError> {
        self.armed()?;
        self.inner.memory_check()
    }

    fn clear_table(&mut self) -> Result<(), StoreError> {
        self.armed()?;
        self.inner.clear_table()
    }

    fn check(&mut self) -> Result<(), StoreError> {
        self.armed()?;
        self.inner.check()
    }

    fn erase_log(&mut self) -> Result<(), StoreError> {
        self.armed()?;
        self.inner.erase_log()
    }
}

pub type TestNode = NodeLoop<ManualClock, ScriptedReader, QueuedRadio, FlakyStore, RecordingOutputs>;

pub fn node(config: NodeConfig) -> TestNode {
    NodeLoop::new(
        config,
        ManualClock::new(),
        ScriptedReader::default(),
        QueuedRadio::default(),
        FlakyStore::with_credentials(&[ALICE, BOB]),
        RecordingOutputs::default(),
    )
    .expect("valid config")
}

/// Moves the clock to `ms` and runs one tick.
pub fn tick_at(node: &mut TestNode, ms: u64) -> TickReport {
    node.clock().set(Millis::from_millis(ms));
    node.tick()
}

/// Ticks once per millisecond after the current reading, up to and including
/// `until_ms`.
pub fn run_until(node: &mut TestNode, until_ms: u64) -> Option<TickReport> {
    let start = node.clock().now().as_millis();
    let mut last = None;
    for ms in start + 1..=until_ms {
        last = Some(tick_at(node, ms));
    }
    last
}

pub fn command_frame(generation: ProtocolGeneration, command: Command) -> Frame {
    RadioCodec::new(generation).encode_command(command, &[])
}

pub fn queue_command(node: &mut TestNode, command: Command) {
    let generation = node.config().protocol;
    node.radio_mut()
        .inbox
        .push_back(command_frame(generation, command));
}

pub fn present(node: &mut TestNode, card: Option<CredentialId>) {
    node.reader_mut().card = card;
}
