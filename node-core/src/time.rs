//! Monotonic timing primitives shared by the gate, node loop, and telemetry.
//!
//! Every timed transition compares instants handed out by a [`Clock`]. Targets
//! plug in their own instant type (Embassy ticks on the MCU, a manually
//! advanced counter in the emulator and tests) as long as it satisfies
//! [`MonotonicInstant`].

use core::cell::Cell;
use core::fmt;
use core::ops::Add;
use core::time::Duration;

/// Monotonic timestamp usable by every timed component of the node.
pub trait MonotonicInstant: Copy + Ord + Add<Duration, Output = Self> {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Source of monotonic time. Reads must be side-effect free.
pub trait Clock {
    type Instant: MonotonicInstant;

    /// Returns the current reading.
    fn now(&self) -> Self::Instant;
}

/// Millisecond-resolution instant counted from an arbitrary epoch.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Millis(u64);

impl Millis {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }
}

impl Add<Duration> for Millis {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let delta = u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(delta))
    }
}

impl MonotonicInstant for Millis {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Returns `true` once `period` has fully elapsed since `since`.
pub fn has_elapsed<I>(since: I, now: I, period: Duration) -> bool
where
    I: MonotonicInstant,
{
    now >= since + period
}

/// Clock advanced explicitly by its owner.
///
/// The emulator and the integration tests drive the node loop with this clock
/// so every tick lands on a known millisecond.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Millis>,
}

impl ManualClock {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: Cell::new(Millis::ZERO),
        }
    }

    #[must_use]
    pub const fn starting_at(start: Millis) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        self.now.set(self.now.get() + delta);
    }

    /// Jumps to `instant`. Earlier instants are ignored to keep reads monotonic.
    pub fn set(&self, instant: Millis) {
        if instant > self.now.get() {
            self.now.set(instant);
        }
    }
}

impl Clock for ManualClock {
    type Instant = Millis;

    fn now(&self) -> Self::Instant {
        self.now.get()
    }
}
