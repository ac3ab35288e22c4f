//! LED pattern rendering for the access gate.
//!
//! Patterns are a pure function of the gate state and the time elapsed since
//! the triggering event, so the node loop can sample them on any tick.

use core::time::Duration;

use crate::config::IndicatorConfig;
use crate::io::Level;
use crate::time::MonotonicInstant;

use super::SystemState;

/// Anchors for the LED patterns currently in progress.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IndicatorState<TInstant> {
    epoch: TInstant,
    red_flash: Option<TInstant>,
    halted_at: Option<TInstant>,
}

impl<TInstant> IndicatorState<TInstant>
where
    TInstant: MonotonicInstant,
{
    /// Starts the green heartbeat phase at `epoch`.
    pub const fn new(epoch: TInstant) -> Self {
        Self {
            epoch,
            red_flash: None,
            halted_at: None,
        }
    }

    /// Restarts the short red flash pattern at `now`.
    pub fn flash_red(&mut self, now: TInstant) {
        self.red_flash = Some(now);
    }

    /// Switches the red LED to the repeating halt pattern.
    pub fn halt(&mut self, now: TInstant) {
        self.red_flash = None;
        self.halted_at = Some(now);
    }

    #[must_use]
    pub fn is_flashing(&self, config: &IndicatorConfig, now: TInstant) -> bool {
        self.red_flash
            .is_some_and(|start| now.saturating_duration_since(start) < config.red_pattern_length())
    }

    /// Green LED level for `state` at `now`.
    pub fn green(&self, config: &IndicatorConfig, state: SystemState, now: TInstant) -> Level {
        let elapsed = now.saturating_duration_since(self.epoch);
        let period = config.green_blink_period;
        match state {
            SystemState::Idle | SystemState::Enabled | SystemState::Disabled => {
                Level::from_bool(in_first_half(elapsed, period))
            }
            SystemState::Activated => Level::High,
            SystemState::TriggeredOnce => Level::from_bool(in_first_half(elapsed, period / 2)),
            SystemState::Error => Level::Low,
        }
    }

    /// Red LED level for `state` at `now`.
    pub fn red(&self, config: &IndicatorConfig, state: SystemState, now: TInstant) -> Level {
        if state == SystemState::Error {
            let Some(halted_at) = self.halted_at else {
                return Level::High;
            };
            let cycle = config.red_pattern_length().saturating_add(config.halt_pause);
            let offset = phase(now.saturating_duration_since(halted_at), cycle);
            return Level::from_bool(pulse_on(config, offset));
        }

        match self.red_flash {
            Some(start) => {
                let offset = now.saturating_duration_since(start);
                Level::from_bool(pulse_on(config, offset))
            }
            None => Level::Low,
        }
    }
}

/// Whether a pulse train starting at zero is lit `offset` into the pattern.
fn pulse_on(config: &IndicatorConfig, offset: Duration) -> bool {
    if offset >= config.red_pattern_length() {
        return false;
    }
    let slot_ms = config.red_flash_duration.as_millis().max(1);
    (offset.as_millis() / slot_ms) & 1 == 0
}

fn in_first_half(elapsed: Duration, period: Duration) -> bool {
    if period.is_zero() {
        return true;
    }
    phase(elapsed, period) < period / 2
}

fn phase(elapsed: Duration, period: Duration) -> Duration {
    let period_ms = period.as_millis();
    if period_ms == 0 {
        return Duration::ZERO;
    }
    let offset = elapsed.as_millis() % period_ms;
    Duration::from_millis(u64::try_from(offset).unwrap_or(0))
}
