//! Embassy time source for the node loop.

use core::ops::Add;
use core::time::Duration;

use access_node_core::time::MonotonicInstant;
use embassy_time::Instant;

/// Embassy tick instant wrapped so the shared gate logic can use it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    #[must_use]
    pub const fn as_micros(self) -> u64 {
        self.0.as_micros()
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl Add<Duration> for FirmwareInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        let delta = embassy_time::Duration::from_micros(micros);
        Self(self.0.checked_add(delta).unwrap_or(Instant::MAX))
    }
}

impl MonotonicInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_duration_since(earlier.0).as_micros())
    }
}

/// Reads the Embassy time driver.
#[cfg(target_os = "none")]
#[derive(Copy, Clone, Debug, Default)]
pub struct EmbassyClock;

#[cfg(target_os = "none")]
impl access_node_core::time::Clock for EmbassyClock {
    type Instant = FirmwareInstant;

    fn now(&self) -> FirmwareInstant {
        FirmwareInstant::from(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn millis(value: u64) -> FirmwareInstant {
        FirmwareInstant::from(Instant::from_millis(value))
    }

    #[test]
    fn adds_core_durations() {
        let later = millis(100) + Duration::from_millis(8_000);
        assert_eq!(later, millis(8_100));
    }

    #[test]
    fn addition_saturates_at_the_end_of_time() {
        let end = FirmwareInstant::from(Instant::MAX);
        assert_eq!(end + Duration::from_secs(1), end);
    }

    #[test]
    fn duration_since_saturates_at_zero() {
        assert_eq!(
            millis(1_500).saturating_duration_since(millis(500)),
            Duration::from_millis(1_000)
        );
        assert_eq!(
            millis(500).saturating_duration_since(millis(1_500)),
            Duration::ZERO
        );
    }
}
