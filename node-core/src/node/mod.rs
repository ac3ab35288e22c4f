//! Cooperative node loop.
//!
//! One [`NodeLoop::tick`] runs to completion: it services at most one radio
//! frame, otherwise polls the reader once the read interval has elapsed, steps
//! the gate, records telemetry, and drives the output lines. Once the gate
//! faults the loop only renders the halt pattern until [`NodeLoop::reset`].

use core::fmt;

use crate::codec::{Frame, RadioCodec, Reply};
use crate::config::{ConfigError, NodeConfig};
use crate::credential::{CredentialEvent, CredentialId};
use crate::gate::{
    AccessGate, ActivationMode, FaultKind, GateInput, GateOutputs, StepOutcome, SystemState,
};
use crate::io::{CredentialReader, Level, OutputDriver, OutputLine, RadioTransport};
use crate::store::AccessStore;
use crate::telemetry::TelemetryRecorder;
use crate::time::Clock;

/// Suppresses repeated reads of a card left in front of the reader.
///
/// A credential is forwarded only when it differs from the previous read or
/// follows a read with no card present.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PresenceFilter {
    enabled: bool,
    last: Option<CredentialId>,
}

impl PresenceFilter {
    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self {
            enabled,
            last: None,
        }
    }

    /// Filters one reader result.
    pub fn filter(&mut self, read: Option<CredentialId>) -> Option<CredentialId> {
        let fresh = match read {
            Some(credential) if self.enabled && self.last == Some(credential) => None,
            other => other,
        };
        self.last = read;
        fresh
    }

    /// Forgets the card seen last.
    pub fn clear(&mut self) {
        self.last = None;
    }
}

/// What a tick spent its time on.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TickActivity {
    /// Only timers were evaluated.
    TimerOnly,
    /// A radio frame was decoded and answered.
    Command,
    /// The reader was polled and reported nothing new.
    ReaderPolled,
    /// The reader produced a credential for the gate.
    Credential,
    /// The reader failed.
    ReaderFault,
    /// The node is halted and only renders the halt pattern.
    Halted,
}

/// Summary returned by [`NodeLoop::tick`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TickReport {
    pub activity: TickActivity,
    pub state: SystemState,
    pub reply: Option<Reply>,
}

/// Point-in-time view of the node.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct NodeStatus {
    pub state: SystemState,
    pub mode: ActivationMode,
    pub relay: Level,
    pub green: Level,
    pub red: Level,
    pub fault: Option<FaultKind>,
    pub halted: bool,
    pub ticks: u64,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "state={} mode={} relay={} green={} red={} ticks={}",
            self.state,
            self.mode,
            self.relay.label(),
            self.green.label(),
            self.red.label(),
            self.ticks
        )?;
        if let Some(fault) = self.fault {
            write!(f, " fault={fault}")?;
        }
        if self.halted {
            f.write_str(" halted")?;
        }
        Ok(())
    }
}

/// Node loop owning the gate and every collaborator.
pub struct NodeLoop<K, R, T, S, O>
where
    K: Clock,
    R: CredentialReader,
    T: RadioTransport,
    S: AccessStore<K::Instant>,
    O: OutputDriver,
{
    clock: K,
    reader: R,
    radio: T,
    store: S,
    outputs: O,
    codec: RadioCodec,
    gate: AccessGate<K::Instant>,
    telemetry: TelemetryRecorder<K::Instant>,
    presence: PresenceFilter,
    next_read_at: K::Instant,
    applied: Option<GateOutputs>,
    halted: bool,
    ticks: u64,
}

impl<K, R, T, S, O> NodeLoop<K, R, T, S, O>
where
    K: Clock,
    R: CredentialReader,
    T: RadioTransport,
    S: AccessStore<K::Instant>,
    O: OutputDriver,
{
    /// Validates `config` and powers the node on.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] reported by [`NodeConfig::validate`].
    pub fn new(
        config: NodeConfig,
        clock: K,
        reader: R,
        radio: T,
        store: S,
        outputs: O,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let now = clock.now();
        Ok(Self {
            clock,
            reader,
            radio,
            store,
            outputs,
            codec: RadioCodec::new(config.protocol),
            gate: AccessGate::new(config, now),
            telemetry: TelemetryRecorder::new(),
            presence: PresenceFilter::new(config.hold_suppression),
            next_read_at: now,
            applied: None,
            halted: false,
            ticks: 0,
        })
    }

    /// Runs one loop iteration.
    pub fn tick(&mut self) -> TickReport {
        let now = self.clock.now();
        self.ticks = self.ticks.wrapping_add(1);

        if self.halted {
            let outputs = self.gate.outputs(now);
            self.apply(outputs);
            return TickReport {
                activity: TickActivity::Halted,
                state: self.gate.system_state(),
                reply: None,
            };
        }

        let received = match self.radio.try_receive() {
            Ok(frame) => frame,
            Err(_) => {
                self.telemetry.record_radio_fault(now);
                None
            }
        };

        let (activity, outcome) = match received {
            Some(frame) => (TickActivity::Command, self.handle_frame(&frame, now)),
            None => self.poll_reader(now),
        };

        self.apply(outcome.outputs);
        if outcome.state.is_terminal() {
            self.halted = true;
            self.telemetry.record_halted(now);
        }

        TickReport {
            activity,
            state: outcome.state,
            reply: outcome.reply,
        }
    }

    /// Re-initializes the gate as a power cycle would. The store is kept.
    pub fn reset(&mut self) {
        let now = self.clock.now();
        let previous = self.gate.system_state();
        let config = *self.gate.config();

        self.gate = AccessGate::new(config, now);
        self.presence.clear();
        self.next_read_at = now;
        self.halted = false;
        self.applied = None;

        self.telemetry.record_reset(now);
        let current = self.gate.system_state();
        if current != previous {
            self.telemetry.record_transition(previous, current, now);
        }

        let outputs = self.gate.outputs(now);
        self.apply(outputs);
    }

    #[must_use]
    pub fn status(&self) -> NodeStatus {
        let outputs = self.gate.outputs(self.clock.now());
        NodeStatus {
            state: self.gate.system_state(),
            mode: self.gate.mode(),
            relay: outputs.relay,
            green: outputs.green,
            red: outputs.red,
            fault: self.gate.state().fault(),
            halted: self.halted,
            ticks: self.ticks,
        }
    }

    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn config(&self) -> &NodeConfig {
        self.gate.config()
    }

    pub fn gate(&self) -> &AccessGate<K::Instant> {
        &self.gate
    }

    pub fn telemetry(&self) -> &TelemetryRecorder<K::Instant> {
        &self.telemetry
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn radio(&self) -> &T {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut T {
        &mut self.radio
    }

    pub fn outputs(&self) -> &O {
        &self.outputs
    }

    pub fn outputs_mut(&mut self) -> &mut O {
        &mut self.outputs
    }

    fn handle_frame(&mut self, frame: &Frame, now: K::Instant) -> StepOutcome {
        let decoded = self.codec.decode_frame(frame.as_slice());
        let input = GateInput::tick(now).with_command(decoded.into());
        let outcome = self.gate.step(&mut self.store, input);
        self.telemetry.record_step(&outcome, now);

        if let Some(reply) = outcome.reply {
            let encoded = self.codec.encode(reply);
            if self.radio.send(encoded.as_slice()).is_err() {
                self.telemetry.record_reply_dropped(reply, now);
            }
        }

        outcome
    }

    fn poll_reader(&mut self, now: K::Instant) -> (TickActivity, StepOutcome) {
        let mut input = GateInput::tick(now);
        let mut activity = TickActivity::TimerOnly;

        if now >= self.next_read_at {
            self.next_read_at = now + self.gate.config().timing.read_interval;
            match self.reader.poll() {
                Ok(read) => {
                    let event = self
                        .presence
                        .filter(read)
                        .map(|credential| CredentialEvent::new(credential, now));
                    activity = if event.is_some() {
                        TickActivity::Credential
                    } else {
                        TickActivity::ReaderPolled
                    };
                    input = input.with_credential(event);
                }
                Err(_) => {
                    activity = TickActivity::ReaderFault;
                    input = input.with_fault(FaultKind::Reader);
                }
            }
        }

        let outcome = self.gate.step(&mut self.store, input);
        self.telemetry.record_step(&outcome, now);
        (activity, outcome)
    }

    fn apply(&mut self, outputs: GateOutputs) {
        for line in OutputLine::ALL {
            let level = outputs.level(line);
            if self.applied.map(|applied| applied.level(line)) != Some(level) {
                self.outputs.set_line(line, level);
            }
        }
        self.applied = Some(outputs);
    }
}
