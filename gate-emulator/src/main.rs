mod config;
mod session;

use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use config::Roster;
use session::{CompletionResponse, Session, TranscriptLogger};

/// Interactive gate network on a virtual clock.
#[derive(Parser, Debug)]
#[command(name = "gate-emulator")]
#[command(about = "Drive a simulated gate network from a REPL")]
struct Args {
    /// TOML gate roster; the built-in earth/abydos/chulak roster when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write a session transcript to this file
    #[arg(long)]
    transcript: Option<PathBuf>,

    /// Tick length in milliseconds used by `advance`; overrides the roster
    #[arg(long)]
    frame_ms: Option<u64>,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,gate_core=info,gate_emulator=info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let roster = match &args.config {
        Some(path) => Roster::load(path)?,
        None => Roster::builtin()?,
    };
    let frame = args
        .frame_ms
        .map_or(roster.network.frame(), Duration::from_millis)
        .max(Duration::from_millis(1));

    let mut session = Session::new(&roster, frame)?;
    if let Some(path) = &args.transcript {
        session = session.with_transcript(TranscriptLogger::create(
            path,
            "Gate emulator interactive transcript",
        )?);
    }

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut line = String::new();

    writeln!(
        writer,
        "Gate emulator ready with {} gates ({}). Type `help` for commands, end a line with TAB to complete it, or `exit` to quit.",
        roster.gates.len(),
        roster.names().join(", ")
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        if let Some((buffer, _)) = line.split_once('\t') {
            let response = session.handle_completion(buffer, buffer.len())?;
            writeln!(writer, "{}", render_completion(buffer, &response))?;
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        for response in session.handle_command(trimmed)? {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn render_completion(buffer: &str, response: &CompletionResponse) -> String {
    match response {
        CompletionResponse::NoMatches => "(no completions)".to_string(),
        CompletionResponse::Applied {
            start,
            end,
            value,
            append_space,
        } => {
            let head = buffer.get(..*start).unwrap_or_default();
            let tail = buffer.get(*end..).unwrap_or_default();
            let space = if *append_space { " " } else { "" };
            format!("=> {head}{value}{space}{tail}")
        }
        CompletionResponse::Suggestions { options } => options.join("  "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_rendering_splices_the_buffer() {
        let applied = CompletionResponse::Applied {
            start: 5,
            end: 7,
            value: "abydos".to_string(),
            append_space: true,
        };
        assert_eq!(render_completion("dial ab", &applied), "=> dial abydos ");
        assert_eq!(
            render_completion(
                "s",
                &CompletionResponse::Suggestions {
                    options: vec!["stop".to_string(), "send".to_string()],
                }
            ),
            "stop  send"
        );
        assert_eq!(
            render_completion("warp ", &CompletionResponse::NoMatches),
            "(no completions)"
        );
    }
}
