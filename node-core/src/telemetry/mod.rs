//! Telemetry event catalog and the ring buffer that retains recent records.
//!
//! Event kinds encode to compact numeric codes so they can be mirrored over a
//! debug probe or printed by the emulator without carrying strings around.
//! Payloads carry the extra metadata needed to reconstruct what the gate did
//! while staying `no_std` compatible.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::codec::{Command, DecodeError, Reply};
use crate::credential::CredentialId;
use crate::gate::{ActivationMode, FaultKind, StepOutcome, SystemState};
use crate::store::{AccessDecision, StoreError, StoreReport};
use crate::time::MonotonicInstant;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 128;

/// Monotonically increasing record identifier.
pub type EventId = u32;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    StateEntered(SystemState),
    Credential(AccessDecision),
    CommandApplied(Command),
    FrameRejected,
    ReplyDropped,
    RadioFault,
    ModeChanged(ActivationMode),
    Fault(FaultKind),
    Halted,
    Reset,
    Custom(u16),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::StateEntered(state) => write!(f, "state-entered {state}"),
            TelemetryEventKind::Credential(decision) => write!(f, "credential {decision}"),
            TelemetryEventKind::CommandApplied(command) => write!(f, "command {command}"),
            TelemetryEventKind::FrameRejected => f.write_str("frame-rejected"),
            TelemetryEventKind::ReplyDropped => f.write_str("reply-dropped"),
            TelemetryEventKind::RadioFault => f.write_str("radio-fault"),
            TelemetryEventKind::ModeChanged(mode) => write!(f, "mode-changed {mode}"),
            TelemetryEventKind::Fault(kind) => write!(f, "fault {kind}"),
            TelemetryEventKind::Halted => f.write_str("halted"),
            TelemetryEventKind::Reset => f.write_str("reset"),
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl TelemetryEventKind {
    const STATE_BASE: u16 = 0x0000;
    const CREDENTIAL_BASE: u16 = 0x0010;
    const COMMAND_BASE: u16 = 0x0020;
    const FRAME_REJECTED_CODE: u16 = 0x0030;
    const REPLY_DROPPED_CODE: u16 = 0x0031;
    const RADIO_FAULT_CODE: u16 = 0x0032;
    const MODE_BASE: u16 = 0x0040;
    const FAULT_BASE: u16 = 0x0050;
    const HALTED_CODE: u16 = 0x0060;
    const RESET_CODE: u16 = 0x0061;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::StateEntered(state) => Self::STATE_BASE + index(state.as_index()),
            TelemetryEventKind::Credential(decision) => {
                Self::CREDENTIAL_BASE + index(decision.as_index())
            }
            TelemetryEventKind::CommandApplied(command) => {
                Self::COMMAND_BASE + index(command.as_index())
            }
            TelemetryEventKind::FrameRejected => Self::FRAME_REJECTED_CODE,
            TelemetryEventKind::ReplyDropped => Self::REPLY_DROPPED_CODE,
            TelemetryEventKind::RadioFault => Self::RADIO_FAULT_CODE,
            TelemetryEventKind::ModeChanged(mode) => Self::MODE_BASE + mode_index(mode),
            TelemetryEventKind::Fault(kind) => Self::FAULT_BASE + fault_index(kind),
            TelemetryEventKind::Halted => Self::HALTED_CODE,
            TelemetryEventKind::Reset => Self::RESET_CODE,
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant into a telemetry event, falling back to [`Custom`].
    ///
    /// [`Custom`]: TelemetryEventKind::Custom
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        let custom = TelemetryEventKind::Custom(code);
        match code {
            Self::FRAME_REJECTED_CODE => TelemetryEventKind::FrameRejected,
            Self::REPLY_DROPPED_CODE => TelemetryEventKind::ReplyDropped,
            Self::RADIO_FAULT_CODE => TelemetryEventKind::RadioFault,
            Self::HALTED_CODE => TelemetryEventKind::Halted,
            Self::RESET_CODE => TelemetryEventKind::Reset,
            value if (Self::STATE_BASE..Self::CREDENTIAL_BASE).contains(&value) => {
                SystemState::ALL
                    .get(usize::from(value - Self::STATE_BASE))
                    .map_or(custom, |state| TelemetryEventKind::StateEntered(*state))
            }
            value if (Self::CREDENTIAL_BASE..Self::COMMAND_BASE).contains(&value) => {
                AccessDecision::ALL
                    .get(usize::from(value - Self::CREDENTIAL_BASE))
                    .map_or(custom, |decision| TelemetryEventKind::Credential(*decision))
            }
            value if (Self::COMMAND_BASE..Self::FRAME_REJECTED_CODE).contains(&value) => {
                Command::ALL
                    .get(usize::from(value - Self::COMMAND_BASE))
                    .map_or(custom, |command| TelemetryEventKind::CommandApplied(*command))
            }
            value if (Self::MODE_BASE..Self::FAULT_BASE).contains(&value) => {
                match value - Self::MODE_BASE {
                    0 => TelemetryEventKind::ModeChanged(ActivationMode::Single),
                    1 => TelemetryEventKind::ModeChanged(ActivationMode::Double),
                    _ => custom,
                }
            }
            value if (Self::FAULT_BASE..Self::HALTED_CODE).contains(&value) => {
                match value - Self::FAULT_BASE {
                    0 => TelemetryEventKind::Fault(FaultKind::Reader),
                    1 => TelemetryEventKind::Fault(FaultKind::Store),
                    2 => TelemetryEventKind::Fault(FaultKind::Memory),
                    _ => custom,
                }
            }
            _ => custom,
        }
    }

    /// Whether the event points at something an operator must look at.
    #[must_use]
    pub const fn is_alert(self) -> bool {
        matches!(
            self,
            TelemetryEventKind::Fault(_)
                | TelemetryEventKind::Halted
                | TelemetryEventKind::RadioFault
                | TelemetryEventKind::ReplyDropped
        )
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    /// No additional metadata accompanies the event.
    None,
    /// Details describing a state change.
    Transition(TransitionTelemetry),
    /// Credential behind an access decision.
    Credential(CredentialId),
    /// Why a received frame was rejected.
    Rejected(DecodeError),
    /// Result of a bookkeeping command.
    Store(StoreReport),
    /// Store failure that caused a fault.
    StoreFailure(StoreError),
    /// Reply that could not be delivered.
    Reply(Reply),
}

impl TelemetryPayload {
    /// Convenience constructor when no payload data is needed.
    #[must_use]
    pub const fn none() -> Self {
        TelemetryPayload::None
    }
}

impl fmt::Display for TelemetryPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryPayload::None => Ok(()),
            TelemetryPayload::Transition(transition) => match transition.elapsed_since_previous {
                Some(elapsed) => write!(f, "from={} after={}ms", transition.from, elapsed.as_millis()),
                None => write!(f, "from={}", transition.from),
            },
            TelemetryPayload::Credential(credential) => write!(f, "uid={credential}"),
            TelemetryPayload::Rejected(error) => write!(f, "{error}"),
            TelemetryPayload::Store(report) => write!(f, "{report}"),
            TelemetryPayload::StoreFailure(error) => write!(f, "{error}"),
            TelemetryPayload::Reply(reply) => write!(f, "reply={reply}"),
        }
    }
}

/// State change payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TransitionTelemetry {
    pub from: SystemState,
    pub elapsed_since_previous: Option<Duration>,
}

impl TransitionTelemetry {
    #[must_use]
    pub const fn new(from: SystemState, elapsed_since_previous: Option<Duration>) -> Self {
        Self {
            from,
            elapsed_since_previous,
        }
    }
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    last_transition_at: Option<TInstant>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: MonotonicInstant,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self::starting_at(0)
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Creates a recorder whose first record receives `first_id`.
    #[must_use]
    pub const fn starting_at(first_id: EventId) -> Self {
        Self {
            ring: HistoryBuf::new(),
            last_transition_at: None,
            next_event_id: first_id,
        }
    }

    /// Records issued at or after `cursor`, oldest first.
    ///
    /// Mirrors keep the value returned by [`next_event_id`](Self::next_event_id)
    /// and pass it back here to pick up only what is new. Ids are compared by
    /// their distance behind the next id, so the window survives wrap-around.
    pub fn since(&self, cursor: EventId) -> impl Iterator<Item = &TelemetryRecord<TInstant>> {
        let head = self.next_event_id;
        let behind = head.wrapping_sub(cursor);
        self.ring
            .oldest_ordered()
            .filter(move |record| head.wrapping_sub(record.id) <= behind)
    }

    /// Identifier the next record will receive.
    #[must_use]
    pub const fn next_event_id(&self) -> EventId {
        self.next_event_id
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }

    /// Records a state change and captures elapsed time since the previous one.
    pub fn record_transition(
        &mut self,
        from: SystemState,
        to: SystemState,
        timestamp: TInstant,
    ) -> EventId {
        let elapsed = self
            .last_transition_at
            .map(|previous| timestamp.saturating_duration_since(previous));
        self.last_transition_at = Some(timestamp);

        self.record(
            TelemetryEventKind::StateEntered(to),
            TelemetryPayload::Transition(TransitionTelemetry::new(from, elapsed)),
            timestamp,
        )
    }

    /// Records everything a gate step reported, in the order it happened.
    pub fn record_step(&mut self, outcome: &StepOutcome, timestamp: TInstant) {
        if let Some(error) = outcome.rejected {
            self.record(
                TelemetryEventKind::FrameRejected,
                TelemetryPayload::Rejected(error),
                timestamp,
            );
        }

        if let Some(command) = outcome.command {
            let payload = outcome
                .report
                .map_or(TelemetryPayload::None, TelemetryPayload::Store);
            self.record(TelemetryEventKind::CommandApplied(command), payload, timestamp);
        }

        if let Some(mode) = outcome.mode_changed {
            self.record(
                TelemetryEventKind::ModeChanged(mode),
                TelemetryPayload::None,
                timestamp,
            );
        }

        if let Some(credential) = outcome.credential {
            self.record(
                TelemetryEventKind::Credential(credential.decision),
                TelemetryPayload::Credential(credential.credential),
                timestamp,
            );
        }

        if let Some(kind) = outcome.fault {
            let payload = outcome
                .store_error
                .map_or(TelemetryPayload::None, TelemetryPayload::StoreFailure);
            self.record(TelemetryEventKind::Fault(kind), payload, timestamp);
        }

        if outcome.state_changed() {
            self.record_transition(outcome.previous, outcome.state, timestamp);
        }
    }

    /// Records a reply the radio failed to deliver.
    pub fn record_reply_dropped(&mut self, reply: Reply, timestamp: TInstant) -> EventId {
        self.record(
            TelemetryEventKind::ReplyDropped,
            TelemetryPayload::Reply(reply),
            timestamp,
        )
    }

    /// Records a receive failure reported by the radio.
    pub fn record_radio_fault(&mut self, timestamp: TInstant) -> EventId {
        self.record(TelemetryEventKind::RadioFault, TelemetryPayload::None, timestamp)
    }

    /// Records entry into the halt loop.
    pub fn record_halted(&mut self, timestamp: TInstant) -> EventId {
        self.record(TelemetryEventKind::Halted, TelemetryPayload::None, timestamp)
    }

    /// Records an external reset. Transition timing restarts from here.
    pub fn record_reset(&mut self, timestamp: TInstant) -> EventId {
        self.last_transition_at = None;
        self.record(TelemetryEventKind::Reset, TelemetryPayload::None, timestamp)
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: MonotonicInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn index(value: usize) -> u16 {
    value as u16
}

const fn mode_index(mode: ActivationMode) -> u16 {
    match mode {
        ActivationMode::Single => 0,
        ActivationMode::Double => 1,
    }
}

const fn fault_index(kind: FaultKind) -> u16 {
    match kind {
        FaultKind::Reader => 0,
        FaultKind::Store => 1,
        FaultKind::Memory => 2,
    }
}
