#![no_std]

// Shared logic for the access node.
//
// Everything here stays free of the Rust standard library so the same gate,
// codec, and node loop run unchanged on the MCU firmware and in the host
// emulator. Hardware is reached only through the traits in `io` and `store`.

pub mod codec;
pub mod config;
pub mod console;
pub mod credential;
pub mod gate;
pub mod io;
pub mod node;
pub mod store;
pub mod telemetry;
pub mod time;
