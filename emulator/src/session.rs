use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use access_node_core::codec::{Frame, RadioCodec};
use access_node_core::config::NodeConfig;
use access_node_core::console::{
    self, COMMAND_SUMMARY, CommandSpec, ConsoleCommand, FaultTarget, HexBytes, Keyword,
};
use access_node_core::credential::CredentialId;
use access_node_core::gate::ActivationMode;
use access_node_core::io::{CredentialReader, Level, OutputDriver, OutputLine, RadioTransport};
use access_node_core::node::{NodeLoop, NodeStatus, TickReport};
use access_node_core::store::{
    AccessLogEntry, AccessStore, MemoryReport, MemoryStore, StoreError, TableUpdate,
};
use access_node_core::telemetry::{EventId, TelemetryRecord};
use access_node_core::time::{Clock, ManualClock, Millis};

/// Cards enrolled when a session starts.
pub const ENROLLED_CARDS: [CredentialId; 2] = [
    CredentialId::from_u32(0xA11C_E001),
    CredentialId::from_u32(0x0B0B_0002),
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Single,
    Double,
    Fault,
}

impl TranscriptProfile {
    pub fn tag(self) -> &'static str {
        match self {
            TranscriptProfile::Single => "single",
            TranscriptProfile::Double => "double",
            TranscriptProfile::Fault => "fault",
        }
    }

    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Single => "transcripts/emulator-single.log",
            TranscriptProfile::Double => "transcripts/emulator-double.log",
            TranscriptProfile::Fault => "transcripts/emulator-fault.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Single => "Access node emulator single activation transcript",
            TranscriptProfile::Double => "Access node emulator double activation transcript",
            TranscriptProfile::Fault => "Access node emulator fault halt transcript",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("single") {
            Ok(Self::Single)
        } else if tag.eq_ignore_ascii_case("double") {
            Ok(Self::Double)
        } else if tag.eq_ignore_ascii_case("fault") {
            Ok(Self::Fault)
        } else {
            Err(format!("Unknown transcript profile `{tag}`"))
        }
    }

    /// Node configuration the profile boots with.
    pub fn config(self) -> NodeConfig {
        match self {
            TranscriptProfile::Double => {
                NodeConfig::default().with_initial_mode(ActivationMode::Double)
            }
            TranscriptProfile::Single | TranscriptProfile::Fault => NodeConfig::default(),
        }
    }
}

#[derive(Debug)]
pub struct ReaderFailure;

/// Reader holding whatever card the console placed in front of it.
#[derive(Debug, Default)]
pub struct SimReader {
    card: Option<CredentialId>,
    fail_next: bool,
}

impl CredentialReader for SimReader {
    type Error = ReaderFailure;

    fn poll(&mut self) -> Result<Option<CredentialId>, Self::Error> {
        if std::mem::take(&mut self.fail_next) {
            return Err(ReaderFailure);
        }
        Ok(self.card)
    }
}

#[derive(Debug)]
pub struct LinkFailure;

/// Loopback radio: frames typed on the console land in `inbox`, replies in `sent`.
#[derive(Debug, Default)]
pub struct SimRadio {
    inbox: VecDeque<Frame>,
    sent: Vec<Frame>,
}

impl RadioTransport for SimRadio {
    type Error = LinkFailure;

    fn try_receive(&mut self) -> Result<Option<Frame>, Self::Error> {
        Ok(self.inbox.pop_front())
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        let frame = Frame::from_slice(frame).map_err(|_| LinkFailure)?;
        self.sent.push(frame);
        Ok(())
    }
}

/// Output lines kept as plain levels for `status`.
#[derive(Debug, Default)]
pub struct SimOutputs {
    levels: [Level; OutputLine::ALL.len()],
    changes: Vec<(OutputLine, Level)>,
}

impl OutputDriver for SimOutputs {
    fn set_line(&mut self, line: OutputLine, level: Level) {
        let slot = &mut self.levels[line as usize];
        if *slot != level {
            *slot = level;
            self.changes.push((line, level));
        }
    }
}

/// Memory store that fails its next operation once armed.
pub struct FaultyStore {
    inner: MemoryStore<Millis>,
    fail_next: Option<StoreError>,
}

impl FaultyStore {
    fn armed(&mut self) -> Result<(), StoreError> {
        self.fail_next.take().map_or(Ok(()), Err)
    }
}

impl AccessStore<Millis> for FaultyStore {
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

type EmulatedNode = NodeLoop<ManualClock, SimReader, SimRadio, FaultyStore, SimOutputs>;

pub struct Session {
    profile: TranscriptProfile,
    node: EmulatedNode,
    codec: RadioCodec,
    transcript: TranscriptLogger,
    cursor: EventId,
}

impl Session {
    pub fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let transcript = TranscriptLogger::new(profile)?;
        let config = profile.config();

        let store = FaultyStore {
            inner: MemoryStore::with_credentials(&ENROLLED_CARDS)
                .map_err(|err| io::Error::other(err.to_string()))?,
            fail_next: None,
        };
        let node = NodeLoop::new(
            config,
            ManualClock::new(),
            SimReader::default(),
            SimRadio::default(),
            store,
            SimOutputs::default(),
        )
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;

        Ok(Self {
            profile,
            node,
            codec: RadioCodec::new(config.protocol),
            transcript,
            cursor: 0,
        })
    }

    /// Runs the interactive console until `exit`, `quit` or end of input.
    pub fn run(&mut self, input: impl BufRead, mut output: impl Write) -> io::Result<()> {
        for line in startup_lines(self.profile, &self.node.status()) {
            writeln!(output, "{line}")?;
        }

        let mut lines = input.lines();
        loop {
            write!(output, "> ")?;
            output.flush()?;

            let Some(line) = lines.next().transpose()? else {
                writeln!(output)?;
                return Ok(());
            };
            let trimmed = line.trim();
            if is_exit(trimmed) {
                writeln!(output, "Session closed.")?;
                return Ok(());
            }

            for response in self.handle_command(trimmed)? {
                writeln!(output, "{response}")?;
            }
        }
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.elapsed();
        self.transcript
            .append_line(elapsed, TranscriptRole::Host, trimmed)?;

        let lines = match console::parse(trimmed) {
            Ok(command) => self.execute(command),
            Err(err) => vec![format!("ERR syntax {err}")],
        };

        self.record_output(&lines)?;
        Ok(lines)
    }

    fn execute(&mut self, command: ConsoleCommand) -> Vec<String> {
        match command {
            ConsoleCommand::Card(card) => {
                self.node.reader_mut().card = Some(card);
                vec![format!("card {card} in range")]
            }
            ConsoleCommand::Remove => {
                self.node.reader_mut().card = None;
                vec!["card removed".to_string()]
            }
            ConsoleCommand::Send { command, payload } => {
                let frame = self.codec.encode_command(command, &payload);
                self.queue_frame(frame)
            }
            ConsoleCommand::Raw(bytes) => self.queue_raw(&bytes),
            ConsoleCommand::Advance(duration) => {
                let period = self.node.config().timing.tick_period;
                let ticks = ticks_for(duration, period);
                let mut lines = Vec::new();
                self.run_ticks(ticks, &mut lines);
                lines.push(format!("advanced {}", format_duration_short(duration)));
                lines
            }
            ConsoleCommand::Fault(target) => {
                match target {
                    FaultTarget::Reader => self.node.reader_mut().fail_next = true,
                    FaultTarget::Store => {
                        self.node.store_mut().fail_next = Some(StoreError::Unavailable);
                    }
                }
                vec![format!("{} armed to fail on next use", target.label())]
            }
            ConsoleCommand::Status => vec![self.node.status().to_string()],
            ConsoleCommand::Log => self.describe_log(),
            ConsoleCommand::Reset => {
                self.node.reset();
                let mut lines = vec!["node reset".to_string()];
                self.drain(&mut lines);
                lines
            }
            ConsoleCommand::Help(topic) => help_lines(topic),
        }
    }

    fn queue_raw(&mut self, bytes: &HexBytes) -> Vec<String> {
        match Frame::from_slice(bytes) {
            Ok(frame) => self.queue_frame(frame),
            Err(err) => vec![format!("ERR frame {err}")],
        }
    }

    fn queue_frame(&mut self, frame: Frame) -> Vec<String> {
        let mut lines = vec![format!("tx {frame:?}")];
        self.node.radio_mut().inbox.push_back(frame);
        self.run_ticks(1, &mut lines);
        lines
    }

    /// Advances the clock one tick period per iteration and reports what changed.
    fn run_ticks(&mut self, ticks: u64, lines: &mut Vec<String>) {
        let period = self.node.config().timing.tick_period;
        let mut last: Option<TickReport> = None;
        for _ in 0..ticks {
            self.node.clock().advance(period);
            last = Some(self.node.tick());
            self.drain(lines);
        }
        if last.is_some_and(|report| report.state.is_terminal()) {
            lines.push("node halted; `reset` to power-cycle".to_string());
        }
    }

    fn drain(&mut self, lines: &mut Vec<String>) {
        let records: Vec<TelemetryRecord<Millis>> =
            self.node.telemetry().since(self.cursor).copied().collect();
        for record in &records {
            lines.push(describe_record(record));
        }
        self.cursor = self.node.telemetry().next_event_id();

        for frame in self.node.radio_mut().sent.drain(..) {
            lines.push(format!("rx {frame:?}"));
        }
        for (line, level) in std::mem::take(&mut self.node.outputs_mut().changes) {
            lines.push(format!("{} -> {}", line.label(), level.label()));
        }
    }

    fn describe_log(&self) -> Vec<String> {
        let store = &self.node.store().inner;
        if store.log_len() == 0 {
            return vec!["access log empty".to_string()];
        }
        store
            .log()
            .map(|entry| {
                format!(
                    "[{}] {} {}",
                    entry.at, entry.credential, entry.decision
                )
            })
            .collect()
    }

    fn elapsed(&self) -> Duration {
        Duration::from_millis(self.node.clock().now().as_millis())
    }

    fn record_output(&mut self, lines: &[String]) -> io::Result<()> {
        let elapsed = self.elapsed();
        for line in lines {
            self.transcript
                .append_line(elapsed, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let path = Path::new(profile.log_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(profile)?;
        Ok(logger)
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(
            self.writer,
            "# Timestamps are simulated milliseconds since power-on"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

fn describe_record(record: &TelemetryRecord<Millis>) -> String {
    let marker = if record.event.is_alert() { "!" } else { "*" };
    let details = record.details.to_string();
    if details.is_empty() {
        format!("{marker} #{} {} {}", record.id, record.timestamp, record.event)
    } else {
        format!(
            "{marker} #{} {} {} {details}",
            record.id, record.timestamp, record.event
        )
    }
}

/// Lines printed before the first prompt.
fn startup_lines(profile: TranscriptProfile, status: &NodeStatus) -> Vec<String> {
    let enrolled: Vec<String> = ENROLLED_CARDS.iter().map(ToString::to_string).collect();
    vec![
        format!("Access node emulator, {} profile", profile.tag()),
        format!("transcript: {}", profile.log_path()),
        format!("enrolled: {}", enrolled.join(" ")),
        format!("status: {status}"),
        "Type `help` for commands or `exit` to quit.".to_string(),
    ]
}

fn is_exit(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn help_lines(topic: Option<Keyword>) -> Vec<String> {
    match topic {
        Some(keyword) => vec![describe_spec(keyword.spec())],
        None => COMMAND_SUMMARY.iter().map(describe_spec).collect(),
    }
}

fn describe_spec(spec: &CommandSpec) -> String {
    format!("{:<30} - {}", spec.usage, spec.summary)
}

/// Number of whole tick periods covering `duration`, at least one.
fn ticks_for(duration: Duration, period: Duration) -> u64 {
    let period = period.as_millis().max(1);
    let ticks = duration.as_millis().div_ceil(period);
    u64::try_from(ticks).unwrap_or(u64::MAX).max(1)
}

fn format_duration_short(duration: Duration) -> String {
    if duration.as_secs() > 0 && duration.subsec_nanos() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
