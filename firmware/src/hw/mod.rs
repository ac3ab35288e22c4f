//! Board adapters implementing the node's collaborator traits.
//!
//! Output lines drive the door relay and the two indicator LEDs through push-pull
//! GPIOs. The card reader and radio live in their own modules.

#![cfg(target_os = "none")]

pub mod radio;
pub mod reader;

use access_node_core::io::{Level, OutputDriver, OutputLine};
use embassy_stm32::gpio::Output;

/// Relay and indicator GPIOs.
pub struct BoardOutputs<'d> {
    relay: Output<'d>,
    green: Output<'d>,
    red: Output<'d>,
}

impl<'d> BoardOutputs<'d> {
    pub fn new(relay: Output<'d>, green: Output<'d>, red: Output<'d>) -> Self {
        Self { relay, green, red }
    }

    fn output_mut(&mut self, line: OutputLine) -> &mut Output<'d> {
        match line {
            OutputLine::Relay => &mut self.relay,
            OutputLine::GreenLed => &mut self.green,
            OutputLine::RedLed => &mut self.red,
        }
    }
}

impl OutputDriver for BoardOutputs<'_> {
    fn set_line(&mut self, line: OutputLine, level: Level) {
        let output = self.output_mut(line);
        match level {
            Level::High => output.set_high(),
            Level::Low => output.set_low(),
        }
    }
}
