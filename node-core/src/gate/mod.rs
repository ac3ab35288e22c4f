//! Access gate state machine.
//!
//! The gate is the only mutator of the node's control state. Each call to
//! [`AccessGate::step`] consumes at most one stimulus (fault, command, or
//! credential, in that priority) after expiring any elapsed timers, and
//! returns the resulting outputs together with the reply owed to the server.

pub mod indicator;

use core::fmt;

use crate::codec::{Command, CommandFrame, DecodeError, Reply};
use crate::config::{NodeConfig, PowerOnState, SecondPresentationPolicy};
use crate::credential::{CredentialEvent, CredentialId};
use crate::io::{Level, OutputLine};
use crate::store::{AccessDecision, AccessLogEntry, AccessStore, StoreError, StoreReport};
use crate::time::{MonotonicInstant, has_elapsed};

pub use indicator::IndicatorState;

/// Plain discriminant of the gate state.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SystemState {
    Enabled,
    Disabled,
    Activated,
    Idle,
    TriggeredOnce,
    Error,
}

impl SystemState {
    pub const ALL: [SystemState; 6] = [
        SystemState::Enabled,
        SystemState::Disabled,
        SystemState::Activated,
        SystemState::Idle,
        SystemState::TriggeredOnce,
        SystemState::Error,
    ];

    /// Relay is energized exactly in `Enabled` and `Activated`.
    #[must_use]
    pub const fn relay_level(self) -> Level {
        match self {
            SystemState::Enabled | SystemState::Activated => Level::High,
            SystemState::Disabled
            | SystemState::Idle
            | SystemState::TriggeredOnce
            | SystemState::Error => Level::Low,
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, SystemState::Error)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            SystemState::Enabled => "enabled",
            SystemState::Disabled => "disabled",
            SystemState::Activated => "activated",
            SystemState::Idle => "idle",
            SystemState::TriggeredOnce => "triggered-once",
            SystemState::Error => "error",
        }
    }

    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            SystemState::Enabled => 0,
            SystemState::Disabled => 1,
            SystemState::Activated => 2,
            SystemState::Idle => 3,
            SystemState::TriggeredOnce => 4,
            SystemState::Error => 5,
        }
    }
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Number of credential presentations required to activate the relay.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum ActivationMode {
    #[default]
    Single,
    Double,
}

impl ActivationMode {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ActivationMode::Single => "single",
            ActivationMode::Double => "double",
        }
    }
}

impl fmt::Display for ActivationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Unrecoverable fault classes. Any of them parks the gate in `Error`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FaultKind {
    /// Credential reader stopped responding.
    Reader,
    /// Credential database or access log failed.
    Store,
    /// Memory integrity or capacity failure.
    Memory,
}

impl FaultKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            FaultKind::Reader => "reader",
            FaultKind::Store => "store",
            FaultKind::Memory => "memory",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// First accepted presentation while waiting for the second one.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PendingTrigger<TInstant> {
    pub accepted_at: TInstant,
    pub credential: CredentialId,
}

/// Gate state together with the timestamps its timed transitions depend on.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GateState<TInstant> {
    Enabled,
    Disabled,
    Activated { since: TInstant },
    Idle,
    TriggeredOnce(PendingTrigger<TInstant>),
    Error(FaultKind),
}

impl<TInstant> GateState<TInstant> {
    #[must_use]
    pub const fn kind(&self) -> SystemState {
        match self {
            GateState::Enabled => SystemState::Enabled,
            GateState::Disabled => SystemState::Disabled,
            GateState::Activated { .. } => SystemState::Activated,
            GateState::Idle => SystemState::Idle,
            GateState::TriggeredOnce(_) => SystemState::TriggeredOnce,
            GateState::Error(_) => SystemState::Error,
        }
    }

    /// Fault that parked the gate, if any.
    #[must_use]
    pub const fn fault(&self) -> Option<FaultKind> {
        match self {
            GateState::Error(kind) => Some(*kind),
            _ => None,
        }
    }
}

/// Command stimulus handed to the gate after decoding.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandInput<'a> {
    Frame(CommandFrame<'a>),
    Malformed(DecodeError),
}

impl<'a> From<Result<CommandFrame<'a>, DecodeError>> for CommandInput<'a> {
    fn from(decoded: Result<CommandFrame<'a>, DecodeError>) -> Self {
        match decoded {
            Ok(frame) => CommandInput::Frame(frame),
            Err(error) => CommandInput::Malformed(error),
        }
    }
}

/// Everything the gate observes on one tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct GateInput<'a, TInstant> {
    pub now: TInstant,
    pub command: Option<CommandInput<'a>>,
    pub credential: Option<CredentialEvent<TInstant>>,
    pub fault: Option<FaultKind>,
}

impl<'a, TInstant> GateInput<'a, TInstant> {
    /// Timer-only input.
    pub const fn tick(now: TInstant) -> Self {
        Self {
            now,
            command: None,
            credential: None,
            fault: None,
        }
    }

    #[must_use]
    pub const fn with_command(mut self, command: CommandInput<'a>) -> Self {
        self.command = Some(command);
        self
    }

    #[must_use]
    pub fn with_credential(mut self, credential: Option<CredentialEvent<TInstant>>) -> Self {
        self.credential = credential;
        self
    }

    #[must_use]
    pub const fn with_fault(mut self, fault: FaultKind) -> Self {
        self.fault = Some(fault);
        self
    }
}

/// Levels for the three output lines.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct GateOutputs {
    pub relay: Level,
    pub green: Level,
    pub red: Level,
}

impl GateOutputs {
    #[must_use]
    pub const fn level(self, line: OutputLine) -> Level {
        match line {
            OutputLine::Relay => self.relay,
            OutputLine::GreenLed => self.green,
            OutputLine::RedLed => self.red,
        }
    }
}

/// Decision taken for a presented credential.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CredentialOutcome {
    pub credential: CredentialId,
    pub decision: AccessDecision,
}

/// Everything that happened during one [`AccessGate::step`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StepOutcome {
    pub previous: SystemState,
    pub state: SystemState,
    pub outputs: GateOutputs,
    pub reply: Option<Reply>,
    pub command: Option<Command>,
    pub rejected: Option<DecodeError>,
    pub credential: Option<CredentialOutcome>,
    pub report: Option<StoreReport>,
    pub store_error: Option<StoreError>,
    pub fault: Option<FaultKind>,
    pub mode_changed: Option<ActivationMode>,
    /// A timed transition (door timeout or pair window) fired this step.
    pub expired: bool,
}

impl StepOutcome {
    const fn new(previous: SystemState) -> Self {
        Self {
            previous,
            state: previous,
            outputs: GateOutputs {
                relay: Level::Low,
                green: Level::Low,
                red: Level::Low,
            },
            reply: None,
            command: None,
            rejected: None,
            credential: None,
            report: None,
            store_error: None,
            fault: None,
            mode_changed: None,
            expired: false,
        }
    }

    #[must_use]
    pub fn state_changed(&self) -> bool {
        self.previous != self.state
    }
}

/// Finite-state controller deciding relay and LED levels.
#[derive(Clone, Debug)]
pub struct AccessGate<TInstant>
where
    TInstant: MonotonicInstant,
{
    config: NodeConfig,
    state: GateState<TInstant>,
    mode: ActivationMode,
    indicators: IndicatorState<TInstant>,
}

impl<TInstant> AccessGate<TInstant>
where
    TInstant: MonotonicInstant,
{
    /// Creates a gate in its configured power-on state.
    pub fn new(config: NodeConfig, now: TInstant) -> Self {
        let state = match config.power_on {
            PowerOnState::Idle => GateState::Idle,
            PowerOnState::Disabled => GateState::Disabled,
        };

        Self {
            config,
            state,
            mode: config.initial_mode,
            indicators: IndicatorState::new(now),
        }
    }

    #[must_use]
    pub const fn state(&self) -> &GateState<TInstant> {
        &self.state
    }

    #[must_use]
    pub const fn system_state(&self) -> SystemState {
        self.state.kind()
    }

    #[must_use]
    pub const fn mode(&self) -> ActivationMode {
        self.mode
    }

    #[must_use]
    pub const fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Output levels at `now` without advancing the state.
    pub fn outputs(&self, now: TInstant) -> GateOutputs {
        let state = self.state.kind();
        let indicators = &self.config.indicators;
        GateOutputs {
            relay: state.relay_level(),
            green: self.indicators.green(indicators, state, now),
            red: self.indicators.red(indicators, state, now),
        }
    }

    /// Advances the gate by one tick.
    pub fn step<S>(&mut self, store: &mut S, input: GateInput<'_, TInstant>) -> StepOutcome
    where
        S: AccessStore<TInstant> + ?Sized,
    {
        let now = input.now;
        let mut outcome = StepOutcome::new(self.state.kind());

        if let GateState::Error(_) = self.state {
            if input.command.is_some() {
                outcome.reply = Some(Reply::Error);
            }
            outcome.outputs = self.outputs(now);
            return outcome;
        }

        outcome.expired = self.expire(now);

        if let Some(kind) = input.fault {
            self.enter_error(kind, now, &mut outcome);
            if input.command.is_some() {
                outcome.reply = Some(Reply::Error);
            }
        } else if let Some(command) = input.command {
            self.apply_command(store, command, now, &mut outcome);
        } else if let Some(event) = input.credential {
            self.apply_credential(store, event, now, &mut outcome);
        }

        outcome.state = self.state.kind();
        outcome.outputs = self.outputs(now);
        outcome
    }

    fn expire(&mut self, now: TInstant) -> bool {
        let timing = &self.config.timing;
        let expired = match self.state {
            GateState::Activated { since } => has_elapsed(since, now, timing.door_enable),
            GateState::TriggeredOnce(pending) => now > pending.accepted_at + timing.double_window,
            _ => false,
        };

        if expired {
            self.state = GateState::Idle;
        }
        expired
    }

    fn enter_error(&mut self, kind: FaultKind, now: TInstant, outcome: &mut StepOutcome) {
        self.state = GateState::Error(kind);
        self.indicators.halt(now);
        outcome.fault = Some(kind);
    }

    fn apply_command<S>(
        &mut self,
        store: &mut S,
        command: CommandInput<'_>,
        now: TInstant,
        outcome: &mut StepOutcome,
    ) where
        S: AccessStore<TInstant> + ?Sized,
    {
        let frame = match command {
            CommandInput::Frame(frame) => frame,
            CommandInput::Malformed(error) => {
                outcome.rejected = Some(error);
                outcome.reply = Some(Reply::Error);
                self.indicators.flash_red(now);
                return;
            }
        };

        outcome.command = Some(frame.command);
        let result = match frame.command {
            Command::Auto => {
                self.state = GateState::Idle;
                Ok(None)
            }
            Command::Enable => {
                self.state = GateState::Enabled;
                Ok(None)
            }
            Command::Disable => {
                self.state = GateState::Disabled;
                Ok(None)
            }
            Command::SingleActivation => {
                self.change_mode(ActivationMode::Single, outcome);
                Ok(None)
            }
            Command::DoubleActivation => {
                self.change_mode(ActivationMode::Double, outcome);
                Ok(None)
            }
            Command::DumpLogging => store
                .dump_log()
                .map(|entries| Some(StoreReport::LogDumped { entries })),
            Command::UpdateTable => store
                .update_table(frame.payload)
                .map(|update| Some(StoreReport::Table(update))),
            Command::MemoryCheck => store
                .memory_check()
                .map(|report| Some(StoreReport::Memory(report))),
            Command::MemoryClear => store.clear_table().map(|()| Some(StoreReport::TableCleared)),
            Command::Check => store.check().map(|()| Some(StoreReport::Healthy)),
            Command::EraseLog => store.erase_log().map(|()| Some(StoreReport::LogErased)),
        };

        match result {
            Ok(report) => {
                outcome.report = report;
                outcome.reply = Some(Reply::Ok);
            }
            Err(error) => {
                outcome.store_error = Some(error);
                outcome.reply = Some(Reply::Error);
                self.enter_error(error.fault_kind(), now, outcome);
            }
        }
    }

    fn change_mode(&mut self, mode: ActivationMode, outcome: &mut StepOutcome) {
        if self.mode != mode {
            self.mode = mode;
            outcome.mode_changed = Some(mode);
        }

        // TriggeredOnce only exists under Double.
        if mode == ActivationMode::Single && matches!(self.state, GateState::TriggeredOnce(_)) {
            self.state = GateState::Idle;
        }
    }

    fn apply_credential<S>(
        &mut self,
        store: &mut S,
        event: CredentialEvent<TInstant>,
        now: TInstant,
        outcome: &mut StepOutcome,
    ) where
        S: AccessStore<TInstant> + ?Sized,
    {
        let decided = match self.state {
            GateState::Enabled | GateState::Disabled => {
                Ok((AccessDecision::Overridden, self.state))
            }
            _ => store
                .is_authorized(&event.credential)
                .map(|authorized| self.decide(authorized, &event)),
        };

        let result = decided.and_then(|(decision, next)| {
            store
                .append(AccessLogEntry::new(
                    event.detected_at,
                    event.credential,
                    decision,
                ))
                .map(|()| (decision, next))
        });

        match result {
            Ok((decision, next)) => {
                self.state = next;
                if decision == AccessDecision::Denied {
                    self.indicators.flash_red(now);
                }
                outcome.credential = Some(CredentialOutcome {
                    credential: event.credential,
                    decision,
                });
            }
            Err(error) => {
                outcome.store_error = Some(error);
                self.enter_error(error.fault_kind(), now, outcome);
            }
        }
    }

    fn decide(
        &self,
        authorized: bool,
        event: &CredentialEvent<TInstant>,
    ) -> (AccessDecision, GateState<TInstant>) {
        if !authorized {
            return match self.state {
                GateState::Enabled | GateState::Disabled => {
                    (AccessDecision::Overridden, self.state)
                }
                _ => (AccessDecision::Denied, self.state),
            };
        }

        match self.state {
            GateState::Idle => match self.mode {
                ActivationMode::Single => (
                    AccessDecision::Granted,
                    GateState::Activated {
                        since: event.detected_at,
                    },
                ),
                ActivationMode::Double => (
                    AccessDecision::FirstOfPair,
                    GateState::TriggeredOnce(PendingTrigger {
                        accepted_at: event.detected_at,
                        credential: event.credential,
                    }),
                ),
            },
            GateState::TriggeredOnce(pending) => {
                if self.completes_pair(&pending, event) {
                    (
                        AccessDecision::Granted,
                        GateState::Activated {
                            since: event.detected_at,
                        },
                    )
                } else {
                    (AccessDecision::Repeat, self.state)
                }
            }
            GateState::Activated { .. } => (AccessDecision::Closed, GateState::Idle),
            GateState::Enabled | GateState::Disabled | GateState::Error(_) => {
                (AccessDecision::Overridden, self.state)
            }
        }
    }

    fn completes_pair(
        &self,
        pending: &PendingTrigger<TInstant>,
        event: &CredentialEvent<TInstant>,
    ) -> bool {
        let within_window = event.detected_at > pending.accepted_at
            && event.detected_at <= pending.accepted_at + self.config.timing.double_window;
        let distinct_enough = match self.config.second_presentation {
            SecondPresentationPolicy::AnyValid => true,
            SecondPresentationPolicy::DistinctCredential => {
                event.credential != pending.credential
            }
        };
        within_window && distinct_enough
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use super::*;
    use crate::codec::{ProtocolGeneration, RadioCodec};
    use crate::store::MemoryStore;
    use crate::time::Millis;

    const ALICE: CredentialId = CredentialId::from_u32(0xA11C_E000);
    const BOB: CredentialId = CredentialId::from_u32(0x0000_0B0B);
    const MALLORY: CredentialId = CredentialId::from_u32(0xBAD0_BAD0);

    fn at(ms: u64) -> Millis {
        Millis::from_millis(ms)
    }

    fn store() -> MemoryStore<Millis> {
        MemoryStore::with_credentials(&[ALICE, BOB]).expect("fits")
    }

    fn present(credential: CredentialId, ms: u64) -> GateInput<'static, Millis> {
        GateInput::tick(at(ms)).with_credential(Some(CredentialEvent::new(credential, at(ms))))
    }

    fn command_frame(command: Command) -> [u8; 10] {
        let mut frame = [0; 10];
        frame[0] = command.opcode();
        frame
    }

    fn send(
        gate: &mut AccessGate<Millis>,
        store: &mut MemoryStore<Millis>,
        frame: &[u8],
        ms: u64,
    ) -> StepOutcome {
        let codec = RadioCodec::new(ProtocolGeneration::Legacy10);
        let input = GateInput::tick(at(ms)).with_command(codec.decode_frame(frame).into());
        gate.step(store, input)
    }

    #[test]
    fn relay_is_energized_only_while_open() {
        let energized: heapless::Vec<SystemState, 6> = SystemState::ALL
            .into_iter()
            .filter(|state| state.relay_level() == Level::High)
            .collect();
        assert_eq!(
            energized.as_slice(),
            &[SystemState::Enabled, SystemState::Activated]
        );
    }

    #[test]
    fn power_on_state_follows_configuration() {
        let idle = AccessGate::new(NodeConfig::new(), at(0));
        assert_eq!(idle.system_state(), SystemState::Idle);

        let disabled =
            AccessGate::new(NodeConfig::new().with_power_on(PowerOnState::Disabled), at(0));
        assert_eq!(disabled.system_state(), SystemState::Disabled);
        assert_eq!(disabled.outputs(at(0)).relay, Level::Low);
    }

    #[test]
    fn single_activation_holds_the_relay_until_door_enable_elapses() {
        let mut gate = AccessGate::new(NodeConfig::new(), at(0));
        let mut store = store();

        let outcome = gate.step(&mut store, present(ALICE, 100));
        assert_eq!(outcome.state, SystemState::Activated);
        assert_eq!(outcome.outputs.relay, Level::High);
        assert_eq!(
            outcome.credential.map(|c| c.decision),
            Some(AccessDecision::Granted)
        );

        let holding = gate.step(&mut store, GateInput::tick(at(8_099)));
        assert_eq!(holding.state, SystemState::Activated);

        let expired = gate.step(&mut store, GateInput::tick(at(8_100)));
        assert!(expired.expired);
        assert_eq!(expired.state, SystemState::Idle);
        assert_eq!(expired.outputs.relay, Level::Low);
    }

    #[test]
    fn valid_credential_toggles_an_open_gate_closed() {
        let mut gate = AccessGate::new(NodeConfig::new(), at(0));
        let mut store = store();

        gate.step(&mut store, present(ALICE, 0));
        let outcome = gate.step(&mut store, present(BOB, 2_000));
        assert_eq!(outcome.state, SystemState::Idle);
        assert_eq!(
            outcome.credential.map(|c| c.decision),
            Some(AccessDecision::Closed)
        );
    }

    #[test]
    fn unknown_credential_is_denied_and_flashes_red() {
        let mut gate = AccessGate::new(NodeConfig::new(), at(0));
        let mut store = store();

        let outcome = gate.step(&mut store, present(MALLORY, 10));
        assert_eq!(outcome.state, SystemState::Idle);
        assert_eq!(outcome.outputs.red, Level::High);
        assert_eq!(
            outcome.credential.map(|c| c.decision),
            Some(AccessDecision::Denied)
        );
        assert_eq!(store.log_len(), 1);
    }

    #[test]
    fn commands_win_over_credentials_on_the_same_tick() {
        let mut gate = AccessGate::new(NodeConfig::new(), at(0));
        let mut store = store();
        let codec = RadioCodec::default();
        let frame = command_frame(Command::Disable);

        let input = GateInput::tick(at(5))
            .with_command(codec.decode_frame(&frame).into())
            .with_credential(Some(CredentialEvent::new(ALICE, at(5))));
        let outcome = gate.step(&mut store, input);

        assert_eq!(outcome.state, SystemState::Disabled);
        assert_eq!(outcome.reply, Some(Reply::Ok));
        assert!(outcome.credential.is_none());
        assert_eq!(store.log_len(), 0);
    }

    #[test]
    fn overrides_ignore_credentials() {
        let mut gate = AccessGate::new(NodeConfig::new(), at(0));
        let mut store = store();

        send(&mut gate, &mut store, &command_frame(Command::Enable), 0);
        let outcome = gate.step(&mut store, present(ALICE, 20_000));
        assert_eq!(outcome.state, SystemState::Enabled);
        assert_eq!(outcome.outputs.relay, Level::High);
        assert_eq!(
            outcome.credential.map(|c| c.decision),
            Some(AccessDecision::Overridden)
        );
    }

    #[test]
    fn double_mode_requires_a_second_distinct_card() {
        let mut gate = AccessGate::new(NodeConfig::new(), at(0));
        let mut store = store();

        let switched = send(&mut gate, &mut store, &command_frame(Command::DoubleActivation), 0);
        assert_eq!(switched.mode_changed, Some(ActivationMode::Double));
        assert_eq!(switched.state, SystemState::Idle);

        let first = gate.step(&mut store, present(ALICE, 1_000));
        assert_eq!(first.state, SystemState::TriggeredOnce);
        assert_eq!(first.outputs.relay, Level::Low);

        let repeat = gate.step(&mut store, present(ALICE, 2_000));
        assert_eq!(repeat.state, SystemState::TriggeredOnce);
        assert_eq!(
            repeat.credential.map(|c| c.decision),
            Some(AccessDecision::Repeat)
        );

        let second = gate.step(&mut store, present(BOB, 3_000));
        assert_eq!(second.state, SystemState::Activated);
        assert_eq!(second.outputs.relay, Level::High);
    }

    #[test]
    fn same_card_inside_the_window_is_a_repeat_by_default() {
        let config = NodeConfig::new().with_initial_mode(ActivationMode::Double);
        let mut gate = AccessGate::new(config, at(0));
        let mut store = store();

        let first = gate.step(&mut store, present(ALICE, 0));
        assert_eq!(first.state, SystemState::TriggeredOnce);

        let again = gate.step(&mut store, present(ALICE, 100));
        assert_eq!(again.state, SystemState::TriggeredOnce);
        assert_eq!(again.outputs.relay, Level::Low);
        assert_eq!(
            again.credential.map(|c| c.decision),
            Some(AccessDecision::Repeat)
        );
    }

    #[test]
    fn any_valid_policy_accepts_the_same_card_twice() {
        let config = NodeConfig::new()
            .with_initial_mode(ActivationMode::Double)
            .with_second_presentation(SecondPresentationPolicy::AnyValid);
        let mut gate = AccessGate::new(config, at(0));
        let mut store = store();

        gate.step(&mut store, present(ALICE, 0));
        let second = gate.step(&mut store, present(ALICE, 500));
        assert_eq!(second.state, SystemState::Activated);
    }

    #[test]
    fn pair_window_is_inclusive_and_reverts_afterwards() {
        let config = NodeConfig::new().with_initial_mode(ActivationMode::Double);
        let mut gate = AccessGate::new(config, at(0));
        let mut store = store();

        gate.step(&mut store, present(ALICE, 1_000));
        let edge = gate.step(&mut store, GateInput::tick(at(6_000)));
        assert_eq!(edge.state, SystemState::TriggeredOnce);

        let late = gate.step(&mut store, GateInput::tick(at(6_001)));
        assert!(late.expired);
        assert_eq!(late.state, SystemState::Idle);
    }

    #[test]
    fn late_second_card_starts_a_new_pair() {
        let config = NodeConfig::new().with_initial_mode(ActivationMode::Double);
        let mut gate = AccessGate::new(config, at(0));
        let mut store = store();

        gate.step(&mut store, present(ALICE, 0));
        let outcome = gate.step(&mut store, present(BOB, 5_001));
        assert!(outcome.expired);
        assert_eq!(outcome.state, SystemState::TriggeredOnce);
        assert_eq!(
            outcome.credential.map(|c| c.decision),
            Some(AccessDecision::FirstOfPair)
        );
    }

    #[test]
    fn switching_to_single_abandons_a_pending_pair() {
        let config = NodeConfig::new().with_initial_mode(ActivationMode::Double);
        let mut gate = AccessGate::new(config, at(0));
        let mut store = store();

        gate.step(&mut store, present(ALICE, 0));
        let outcome = send(&mut gate, &mut store, &command_frame(Command::SingleActivation), 10);
        assert_eq!(outcome.state, SystemState::Idle);
        assert_eq!(gate.mode(), ActivationMode::Single);
    }

    #[test]
    fn malformed_frames_reply_error_without_changing_state() {
        let mut gate = AccessGate::new(NodeConfig::new(), at(0));
        let mut store = store();
        gate.step(&mut store, present(ALICE, 0));

        let mut frame = [0u8; 10];
        frame[0] = 0x42;
        let outcome = send(&mut gate, &mut store, &frame, 10);
        assert_eq!(outcome.reply, Some(Reply::Error));
        assert_eq!(outcome.rejected, Some(DecodeError::UnknownOpcode(0x42)));
        assert_eq!(outcome.state, SystemState::Activated);
        assert_eq!(outcome.outputs.red, Level::High);

        let short = send(&mut gate, &mut store, &frame[..4], 20);
        assert_eq!(short.reply, Some(Reply::Error));
        assert_eq!(short.state, SystemState::Activated);
    }

    #[test]
    fn bookkeeping_commands_reach_the_store() {
        let mut gate = AccessGate::new(NodeConfig::new(), at(0));
        let mut store = store();

        let mut frame = command_frame(Command::UpdateTable);
        frame[1..6].copy_from_slice(&[4, 0xBA, 0xD0, 0xBA, 0xD0]);
        let outcome = send(&mut gate, &mut store, &frame, 0);
        assert_eq!(outcome.reply, Some(Reply::Ok));
        assert!(store.contains(&MALLORY));

        let cleared = send(&mut gate, &mut store, &command_frame(Command::MemoryClear), 1);
        assert_eq!(cleared.report, Some(StoreReport::TableCleared));
        assert!(store.credentials().is_empty());
    }

    #[test]
    fn faults_are_terminal() {
        let mut gate = AccessGate::new(NodeConfig::new(), at(0));
        let mut store = store();
        gate.step(&mut store, present(ALICE, 0));

        let faulted = gate.step(&mut store, GateInput::tick(at(10)).with_fault(FaultKind::Reader));
        assert_eq!(faulted.state, SystemState::Error);
        assert_eq!(faulted.outputs.relay, Level::Low);
        assert_eq!(faulted.fault, Some(FaultKind::Reader));

        for command in Command::ALL {
            let outcome = send(&mut gate, &mut store, &command_frame(command), 100);
            assert_eq!(outcome.state, SystemState::Error);
            assert_eq!(outcome.reply, Some(Reply::Error));
        }

        let later = gate.step(&mut store, present(ALICE, 20_000));
        assert_eq!(later.state, SystemState::Error);
        assert!(later.credential.is_none());
        assert_eq!(gate.state().fault(), Some(FaultKind::Reader));
    }

    #[test]
    fn door_timing_uses_configured_duration() {
        let config = NodeConfig::new().with_timing(crate::config::TimingConfig {
            door_enable: Duration::from_millis(100),
            ..crate::config::TimingConfig::DEFAULT
        });
        let mut gate = AccessGate::new(config, at(0));
        let mut store = store();

        gate.step(&mut store, present(ALICE, 0));
        assert_eq!(
            gate.step(&mut store, GateInput::tick(at(100))).state,
            SystemState::Idle
        );
    }
}
