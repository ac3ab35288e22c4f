//! Mirrors the node's telemetry ring to the debug probe.
//!
//! The node loop owns the ring; this module only remembers how far it has
//! read and emits every newer record through defmt on target (stdout on host
//! builds) so bench sessions see state changes, access decisions and faults as
//! they happen.

use access_node_core::telemetry::{
    EventId, TelemetryEventKind, TelemetryRecord, TelemetryRecorder,
};

use crate::clock::FirmwareInstant;

/// Cursor into a [`TelemetryRecorder`] owned elsewhere.
#[derive(Debug, Default)]
pub struct TelemetryMirror {
    cursor: EventId,
}

impl TelemetryMirror {
    pub const fn new() -> Self {
        Self { cursor: 0 }
    }

    /// Emits every record newer than the last call and returns how many were emitted.
    pub fn mirror(&mut self, recorder: &TelemetryRecorder<FirmwareInstant>) -> usize {
        let mut emitted = 0;
        for record in recorder.since(self.cursor) {
            emit_record(record);
            emitted += 1;
        }
        self.cursor = recorder.next_event_id();
        emitted
    }

    pub const fn cursor(&self) -> EventId {
        self.cursor
    }
}

/// defmt level a record is emitted at.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    const fn of(event: TelemetryEventKind) -> Self {
        match event {
            TelemetryEventKind::Fault(_) | TelemetryEventKind::Halted => Severity::Error,
            _ if event.is_alert() => Severity::Warn,
            _ => Severity::Info,
        }
    }

    #[cfg(not(target_os = "none"))]
    const fn label(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

#[cfg(target_os = "none")]
fn emit_record(record: &TelemetryRecord<FirmwareInstant>) {
    use defmt::Display2Format;

    let event = Display2Format(&record.event);
    let details = Display2Format(&record.details);
    let timestamp_us = record.timestamp.as_micros();
    match Severity::of(record.event) {
        Severity::Error => defmt::error!(
            "telemetry:node #{} {} {} t={}us",
            record.id,
            event,
            details,
            timestamp_us
        ),
        Severity::Warn => defmt::warn!(
            "telemetry:node #{} {} {} t={}us",
            record.id,
            event,
            details,
            timestamp_us
        ),
        Severity::Info => defmt::info!(
            "telemetry:node #{} {} {} t={}us",
            record.id,
            event,
            details,
            timestamp_us
        ),
    }
}

#[cfg(not(target_os = "none"))]
fn emit_record(record: &TelemetryRecord<FirmwareInstant>) {
    println!(
        "{} telemetry:node #{} {} {} t={}us",
        Severity::of(record.event).label(),
        record.id,
        record.event,
        record.details,
        record.timestamp.as_micros()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use access_node_core::gate::{FaultKind, SystemState};
    use access_node_core::telemetry::TelemetryPayload;
    use embassy_time::Instant;

    fn micros(value: u64) -> FirmwareInstant {
        FirmwareInstant::from(Instant::from_micros(value))
    }

    #[test]
    fn mirrors_only_new_records() {
        let mut recorder = TelemetryRecorder::<FirmwareInstant>::new();
        let mut mirror = TelemetryMirror::new();

        recorder.record_transition(SystemState::Idle, SystemState::Activated, micros(100));
        recorder.record(TelemetryEventKind::RadioFault, TelemetryPayload::none(), micros(200));
        assert_eq!(mirror.mirror(&recorder), 2);
        assert_eq!(mirror.cursor(), 2);

        assert_eq!(mirror.mirror(&recorder), 0);

        recorder.record_halted(micros(300));
        assert_eq!(mirror.mirror(&recorder), 1);
        assert_eq!(mirror.cursor(), 3);
    }

    #[test]
    fn faults_and_halts_are_errors() {
        assert_eq!(
            Severity::of(TelemetryEventKind::Fault(FaultKind::Reader)),
            Severity::Error
        );
        assert_eq!(Severity::of(TelemetryEventKind::Halted), Severity::Error);
        assert_eq!(Severity::of(TelemetryEventKind::RadioFault), Severity::Warn);
        assert_eq!(Severity::of(TelemetryEventKind::ReplyDropped), Severity::Warn);
        assert_eq!(
            Severity::of(TelemetryEventKind::StateEntered(SystemState::Idle)),
            Severity::Info
        );
    }
}
