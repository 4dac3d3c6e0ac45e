use std::error::Error;
use std::path::Path;

#[allow(dead_code)]
#[path = "../config.rs"]
mod config;
#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use config::Roster;
use session::{Session, TranscriptLogger};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum TranscriptProfile {
    Fast,
    Manual,
    Race,
}

impl TranscriptProfile {
    const ALL: [TranscriptProfile; 3] = [
        TranscriptProfile::Fast,
        TranscriptProfile::Manual,
        TranscriptProfile::Race,
    ];

    fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Fast => "transcripts/emulator-fast.log",
            TranscriptProfile::Manual => "transcripts/emulator-manual.log",
            TranscriptProfile::Race => "transcripts/emulator-race.log",
        }
    }

    fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Fast => "Gate emulator fast and slow dial transcript",
            TranscriptProfile::Manual => "Gate emulator manual dial transcript",
            TranscriptProfile::Race => "Gate emulator race and cancellation transcript",
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let roster = Roster::builtin()?;
    for profile in TranscriptProfile::ALL {
        record_profile(&roster, profile)?;
    }
    Ok(())
}

fn record_profile(roster: &Roster, profile: TranscriptProfile) -> Result<(), Box<dyn Error>> {
    let transcript = TranscriptLogger::create(Path::new(profile.log_path()), profile.header())?;
    let mut session = Session::new(roster, roster.network.frame())?.with_transcript(transcript);
    match profile {
        TranscriptProfile::Fast => record_fast(&mut session)?,
        TranscriptProfile::Manual => record_manual(&mut session)?,
        TranscriptProfile::Race => record_race(&mut session)?,
    }
    Ok(())
}

fn complete(session: &mut Session, buffer: &str) -> Result<(), Box<dyn Error>> {
    session.handle_completion(buffer, buffer.len())?;
    Ok(())
}

fn run(session: &mut Session, lines: &[&str]) -> Result<(), Box<dyn Error>> {
    for line in lines {
        session.handle_command(line)?;
    }
    Ok(())
}

fn record_fast(session: &mut Session) -> Result<(), Box<dyn Error>> {
    complete(session, "d")?;
    complete(session, "dial e")?;
    complete(session, "dial earth ")?;
    complete(session, "dial earth f")?;

    run(
        session,
        &[
            "dial earth fast 26-6-14-31-11-29-0",
            "advance 3s",
            "status",
            "advance 5s",
            "send earth 7",
            "send abydos 8",
            "close earth",
            "dial chulak slow 28-26-5-36-11-29-0",
            "advance 40s",
            "status chulak",
            "reset chulak",
            "dial abydos instant 8-1-22-14-36-19-0",
            "advance 1s",
            "status",
        ],
    )
}

fn record_manual(session: &mut Session) -> Result<(), Box<dyn Error>> {
    complete(session, "enc")?;
    complete(session, "lock ")?;
    complete(session, "help l")?;

    run(
        session,
        &[
            "help",
            "encode earth 26",
            "encode earth 6",
            "advance 5s",
            "encode earth 6",
            "encode earth 14",
            "advance 5s",
            "encode earth 31",
            "advance 5s",
            "encode earth 11",
            "advance 5s",
            "encode earth 29",
            "advance 5s",
            "lock earth 0",
            "advance 5s",
            "status earth",
            "close earth",
        ],
    )
}

fn record_race(session: &mut Session) -> Result<(), Box<dyn Error>> {
    run(
        session,
        &[
            "dial earth 26-6-14-31-11-29-0",
            "dial abydos 28-26-5-36-11-29-0",
            "advance 8s",
            "status",
            "reset earth",
            "dial chulak 28-26-5-36-11-29-0",
            "advance 2s",
            "stop chulak",
            "stop chulak",
            "advance 1s",
            "dial earth 1-2-3-4-5-6-7",
            "advance 10s",
            "status earth",
        ],
    )
}
