use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use gate_core::effects::{Effect, EffectLog};
use gate_core::gate::GateId;
use gate_core::network::GateNetwork;
use gate_core::repl::commands::{CommandError, CommandExecutor, CommandOutcome};
use gate_core::repl::completion::CompletionEngine;

use crate::config::{ConfigError, Roster};

#[derive(Debug, PartialEq, Eq)]
pub enum CompletionResponse {
    NoMatches,
    Applied {
        start: usize,
        end: usize,
        value: String,
        append_space: bool,
    },
    Suggestions {
        options: Vec<String>,
    },
}

pub struct Session {
    executor: CommandExecutor<GateNetwork<EffectLog>>,
    names: Vec<String>,
    transcript: Option<TranscriptLogger>,
}

impl Session {
    pub fn new(roster: &Roster, frame: Duration) -> Result<Self, ConfigError> {
        let network = roster.build_network(EffectLog::new())?;
        let names = roster.gates.iter().map(|gate| gate.name.clone()).collect();
        Ok(Self {
            executor: CommandExecutor::new(network).with_frame(frame),
            names,
            transcript: None,
        })
    }

    #[must_use]
    pub fn with_transcript(mut self, transcript: TranscriptLogger) -> Self {
        self.transcript = Some(transcript);
        self
    }

    #[cfg(test)]
    pub fn network(&self) -> &GateNetwork<EffectLog> {
        self.executor.control()
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.elapsed();
        self.record(elapsed, TranscriptRole::Host, trimmed)?;

        let mut lines = match self.executor.execute(trimmed) {
            Ok(outcome) => {
                if matches!(outcome, CommandOutcome::Status(_) | CommandOutcome::Help(_)) {
                    outcome.to_string().lines().map(str::to_string).collect()
                } else {
                    vec![format!("OK {outcome}")]
                }
            }
            Err(error) => vec![format!("ERR {} {error}", error_kind(&error))],
        };
        let effects = self.executor.control_mut().effects_mut().drain();
        lines.extend(effects.iter().filter_map(|effect| self.narrate(effect)));

        for line in &lines {
            self.record(elapsed, TranscriptRole::Emulator, line)?;
        }
        Ok(lines)
    }

    pub fn handle_completion(&mut self, buffer: &str, cursor: usize) -> io::Result<CompletionResponse> {
        let cursor = cursor.min(buffer.len());
        let (prefix, suffix) = buffer.split_at(cursor);
        let elapsed = self.elapsed();
        self.record(
            elapsed,
            TranscriptRole::Host,
            &format!("[TAB] prefix={prefix:?} suffix={suffix:?} cursor={cursor}"),
        )?;

        let response = {
            let names: Vec<&str> = self.names.iter().map(String::as_str).collect();
            let result = CompletionEngine::new(&names).complete(buffer, cursor);
            match (result.replacement, result.options.as_slice()) {
                (_, []) => CompletionResponse::NoMatches,
                (Some(replacement), _) => CompletionResponse::Applied {
                    start: replacement.start,
                    end: replacement.end,
                    value: replacement.value.to_string(),
                    append_space: replacement.append_space,
                },
                (None, options) => CompletionResponse::Suggestions {
                    options: options.iter().map(|option| (*option).to_string()).collect(),
                },
            }
        };

        match &response {
            CompletionResponse::NoMatches => {
                self.record(elapsed, TranscriptRole::Emulator, "completion: no matches")?;
            }
            CompletionResponse::Applied {
                start, end, value, ..
            } => {
                let message = format!("completion applied: {value} (range={start}..{end})");
                self.record(elapsed, TranscriptRole::Emulator, &message)?;
            }
            CompletionResponse::Suggestions { options } => {
                let summary = format!("completion options ({})", options.len());
                self.record(elapsed, TranscriptRole::Emulator, &summary)?;
                for option in options {
                    self.record(elapsed, TranscriptRole::Emulator, &format!("  {option}"))?;
                }
            }
        }
        Ok(response)
    }

    fn elapsed(&self) -> Duration {
        Duration::from_micros(self.executor.control().now().as_micros())
    }

    fn record(&mut self, elapsed: Duration, role: TranscriptRole, line: &str) -> io::Result<()> {
        match self.transcript.as_mut() {
            Some(transcript) => transcript.append_line(elapsed, role, line),
            None => Ok(()),
        }
    }

    fn gate_name(&self, gate: GateId) -> &str {
        self.names
            .get(gate.index())
            .map_or("?", String::as_str)
    }

    fn narrate(&self, effect: &Effect) -> Option<String> {
        match *effect {
            Effect::Sound { gate, cue, delay } if delay.is_zero() => {
                Some(format!("  {} sound {cue}", self.gate_name(gate)))
            }
            Effect::Sound { gate, cue, delay } => Some(format!(
                "  {} sound {cue} after {}",
                self.gate_name(gate),
                format_duration_short(delay)
            )),
            Effect::Light {
                gate, index, lit, ..
            } => Some(format!(
                "  {} chevron {index} {}",
                self.gate_name(gate),
                if lit { "on" } else { "off" }
            )),
            Effect::Transfer { object, owner } => Some(format!("  {object} owned by {owner}")),
            Effect::Drop { object } => Some(format!("  {object} released")),
            Effect::Rotate { .. } => None,
        }
    }
}

fn error_kind(error: &CommandError<'_>) -> &'static str {
    match error {
        CommandError::Parse(_) => "syntax",
        CommandError::UnknownGate(_) | CommandError::UnknownTopic(_) => "lookup",
        CommandError::Dial(_) => "dial",
        CommandError::Manual(_) => "manual",
        CommandError::Network(_) => "network",
        CommandError::Transit(_) => "transit",
    }
}

fn format_duration_short(duration: Duration) -> String {
    if duration.as_secs() == 0 {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{:.3}s", duration.as_secs_f64())
    }
}

pub struct TranscriptLogger {
    writer: BufWriter<fs::File>,
}

impl TranscriptLogger {
    pub fn create(path: &Path, header: &str) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        logger.write_header(header)?;
        Ok(logger)
    }

    fn write_header(&mut self, header: &str) -> io::Result<()> {
        writeln!(self.writer, "# {header}")?;
        writeln!(
            self.writer,
            "# Timestamps are milliseconds of simulated time"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(&mut self, elapsed: Duration, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

#[derive(Clone, Copy)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
