use embassy_time::{Duration, Timer};

use super::BoardNode;
use crate::telemetry::TelemetryMirror;

#[embassy_executor::task]
pub async fn run(node: &'static mut BoardNode) -> ! {
    let period = node.config().timing.tick_period;
    let delay = Duration::from_micros(u64::try_from(period.as_micros()).unwrap_or(u64::MAX));
    let mut mirror = TelemetryMirror::new();

    defmt::info!("node up, {}", defmt::Display2Format(&node.status()));

    loop {
        node.tick();
        mirror.mirror(node.telemetry());
        Timer::after(delay).await;
    }
}
