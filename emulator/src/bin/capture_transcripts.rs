use std::io;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::{Session, TranscriptProfile};

fn main() -> io::Result<()> {
    record_profile(TranscriptProfile::Single)?;
    record_profile(TranscriptProfile::Double)?;
    record_profile(TranscriptProfile::Fault)?;
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let mut session = Session::new(profile)?;
    let script: &[&str] = match profile {
        TranscriptProfile::Single => &SINGLE,
        TranscriptProfile::Double => &DOUBLE,
        TranscriptProfile::Fault => &FAULT,
    };
    for line in script {
        let _ = session.handle_command(line)?;
    }
    Ok(())
}

const SINGLE: [&str; 14] = [
    "help",
    "status",
    "card A11CE001",
    "advance 1s",
    "remove",
    "advance 8s",
    "card BAD00003",
    "advance 1s",
    "remove",
    "send enable",
    "send auto",
    "raw 4200",
    "status",
    "log",
];

const DOUBLE: [&str; 11] = [
    "card A11CE001",
    "advance 600ms",
    "remove",
    "advance 1s",
    "card 0B0B0002",
    "advance 600ms",
    "remove",
    "advance 9s",
    "send single-activation",
    "status",
    "log",
];

const FAULT: [&str; 11] = [
    "card A11CE001",
    "advance 1s",
    "remove",
    "fault store",
    "send memory-check",
    "advance 3s",
    "status",
    "reset",
    "card A11CE001",
    "advance 1s",
    "status",
];
