//! Immutable node configuration.
//!
//! Every timing constant, the radio link parameters, and the behavioural
//! options are collected into a single [`NodeConfig`] that is handed to the
//! node at construction and never mutated afterwards.

use core::fmt;
use core::time::Duration;

use crate::codec::ProtocolGeneration;
use crate::gate::ActivationMode;

/// Durations driving the timed transitions of the gate and the node loop.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimingConfig {
    /// How long the relay stays energized after an activation.
    pub door_enable: Duration,
    /// Window in which the second presentation must arrive in double mode.
    pub double_window: Duration,
    /// Minimum spacing between two reader polls.
    pub read_interval: Duration,
    /// Nominal node loop period.
    pub tick_period: Duration,
}

impl TimingConfig {
    pub const DEFAULT: Self = Self {
        door_enable: Duration::from_millis(8_000),
        double_window: Duration::from_millis(5_000),
        read_interval: Duration::from_millis(500),
        tick_period: Duration::from_millis(1),
    };
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Status LED patterns.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IndicatorConfig {
    /// Full on/off period of the green heartbeat.
    pub green_blink_period: Duration,
    /// Length of a single red pulse (and of the gap between pulses).
    pub red_flash_duration: Duration,
    /// Pulses in one red flash pattern.
    pub red_flash_count: u8,
    /// Dark gap between repetitions of the halt pattern.
    pub halt_pause: Duration,
}

impl IndicatorConfig {
    pub const DEFAULT: Self = Self {
        green_blink_period: Duration::from_millis(1_000),
        red_flash_duration: Duration::from_millis(500),
        red_flash_count: 2,
        halt_pause: Duration::from_millis(2_000),
    };

    /// Length of one red flash pattern: `count` pulses separated by equal gaps.
    #[must_use]
    pub fn red_pattern_length(&self) -> Duration {
        let slots = u32::from(self.red_flash_count).saturating_mul(2).saturating_sub(1);
        self.red_flash_duration.saturating_mul(slots)
    }
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Over-the-air data rate of the radio link.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum DataRate {
    R250Kbps,
    #[default]
    R1Mbps,
    R2Mbps,
}

/// Radio link parameters consumed by the firmware transport.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RadioLinkConfig {
    pub channel: u8,
    /// Writing pipe address followed by the reading pipe address.
    pub pipes: [u64; 2],
    /// Auto-retransmit delay in 250 µs steps.
    pub retry_delay: u8,
    pub retry_count: u8,
    pub data_rate: DataRate,
}

impl RadioLinkConfig {
    pub const DEFAULT: Self = Self {
        channel: 0x4C,
        pipes: [0xF0F0_F0F0_E1, 0xF0F0_F0F0_D2],
        retry_delay: 15,
        retry_count: 15,
        data_rate: DataRate::R1Mbps,
    };

    /// Five-byte little-endian address for `pipe`.
    #[must_use]
    pub const fn pipe_address(&self, pipe: usize) -> [u8; 5] {
        let bytes = self.pipes[pipe].to_le_bytes();
        [bytes[0], bytes[1], bytes[2], bytes[3], bytes[4]]
    }
}

impl Default for RadioLinkConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// State the gate enters at power-on.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum PowerOnState {
    #[default]
    Idle,
    Disabled,
}

/// Whether the second presentation in double mode may reuse the first credential.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SecondPresentationPolicy {
    /// The second presentation must come from a different credential.
    #[default]
    DistinctCredential,
    /// Any authorized credential completes the pair, including the first one.
    AnyValid,
}

/// Complete node configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct NodeConfig {
    pub timing: TimingConfig,
    pub indicators: IndicatorConfig,
    pub protocol: ProtocolGeneration,
    pub radio: RadioLinkConfig,
    pub power_on: PowerOnState,
    pub initial_mode: ActivationMode,
    pub second_presentation: SecondPresentationPolicy,
    /// Suppress repeated reads of a card left in range.
    pub hold_suppression: bool,
}

impl NodeConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timing: TimingConfig::DEFAULT,
            indicators: IndicatorConfig::DEFAULT,
            protocol: ProtocolGeneration::Legacy10,
            radio: RadioLinkConfig::DEFAULT,
            power_on: PowerOnState::Idle,
            initial_mode: ActivationMode::Single,
            second_presentation: SecondPresentationPolicy::DistinctCredential,
            hold_suppression: true,
        }
    }

    #[must_use]
    pub const fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    #[must_use]
    pub const fn with_indicators(mut self, indicators: IndicatorConfig) -> Self {
        self.indicators = indicators;
        self
    }

    #[must_use]
    pub const fn with_protocol(mut self, protocol: ProtocolGeneration) -> Self {
        self.protocol = protocol;
        self
    }

    #[must_use]
    pub const fn with_radio(mut self, radio: RadioLinkConfig) -> Self {
        self.radio = radio;
        self
    }

    #[must_use]
    pub const fn with_power_on(mut self, power_on: PowerOnState) -> Self {
        self.power_on = power_on;
        self
    }

    #[must_use]
    pub const fn with_initial_mode(mut self, mode: ActivationMode) -> Self {
        self.initial_mode = mode;
        self
    }

    #[must_use]
    pub const fn with_second_presentation(mut self, policy: SecondPresentationPolicy) -> Self {
        self.second_presentation = policy;
        self
    }

    #[must_use]
    pub const fn with_hold_suppression(mut self, enabled: bool) -> Self {
        self.hold_suppression = enabled;
        self
    }

    /// Checks the configuration for values the node cannot run with.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timing = &self.timing;
        let indicators = &self.indicators;

        let durations = [
            ("door-enable", timing.door_enable),
            ("double-window", timing.double_window),
            ("read-interval", timing.read_interval),
            ("tick-period", timing.tick_period),
            ("green-blink-period", indicators.green_blink_period),
            ("red-flash-duration", indicators.red_flash_duration),
            ("halt-pause", indicators.halt_pause),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, value)| value.is_zero()) {
            return Err(ConfigError::ZeroDuration(name));
        }

        if indicators.red_flash_count == 0 {
            return Err(ConfigError::ZeroFlashCount);
        }

        if timing.read_interval < timing.tick_period {
            return Err(ConfigError::ReadIntervalBelowTick {
                read_interval: timing.read_interval,
                tick_period: timing.tick_period,
            });
        }

        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Reasons a [`NodeConfig`] is rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    ZeroDuration(&'static str),
    ZeroFlashCount,
    ReadIntervalBelowTick {
        read_interval: Duration,
        tick_period: Duration,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroDuration(name) => write!(f, "{name} must be non-zero"),
            ConfigError::ZeroFlashCount => f.write_str("red flash count must be non-zero"),
            ConfigError::ReadIntervalBelowTick {
                read_interval,
                tick_period,
            } => write!(
                f,
                "read interval {read_interval:?} is shorter than tick period {tick_period:?}"
            ),
        }
    }
}
