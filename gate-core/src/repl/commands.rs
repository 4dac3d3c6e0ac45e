//! REPL command dispatcher.
//!
//! Parsed commands resolve gate names and then call into a [`GateControl`],
//! implemented by [`GateNetwork`]. The executor owns the frame length used
//! when `advance` drives the clock forward.

use alloc::vec::Vec;
use core::fmt;
use core::time::Duration;

use thiserror::Error;

use crate::address::{Address, Symbol};
use crate::clock::Instant;
use crate::dialing::{
    DialError, DialToken, DialType, ManualAck, ManualStepError, StopOutcome,
};
use crate::effects::{GateEffects, ObjectId};
use crate::gate::{GateId, GateState};
use crate::link::LinkId;
use crate::network::{GateNetwork, NetworkError};
use crate::transit::{TransitError, TransitReceipt};

use super::catalog::{self, CommandSpec};
use super::grammar::{self, Command, ParseError};
use super::status::{GateStatus, StatusFormatter};

/// Frame length `advance` ticks with unless configured otherwise.
pub const DEFAULT_FRAME: Duration = Duration::from_millis(16);

/// Operations the REPL drives.
pub trait GateControl {
    fn resolve(&self, name: &str) -> Option<GateId>;

    fn now(&self) -> Instant;

    fn begin_dial(
        &mut self,
        gate: GateId,
        kind: DialType,
        address: Address,
    ) -> Result<DialToken, DialError>;

    fn stop_dial(&mut self, gate: GateId) -> Result<StopOutcome, NetworkError>;

    fn encode_step(&mut self, gate: GateId, symbol: Symbol) -> Result<ManualAck, ManualStepError>;

    fn lock_step(&mut self, gate: GateId, symbol: Symbol) -> Result<ManualAck, ManualStepError>;

    fn reset_to_idle(&mut self, gate: GateId) -> Result<GateState, NetworkError>;

    fn close_link(&mut self, gate: GateId) -> Result<LinkId, NetworkError>;

    fn transit(&mut self, gate: GateId, object: ObjectId) -> Result<TransitReceipt, TransitError>;

    /// Ticks every `frame` until `until`, returning the number of tasks fired.
    fn run_until(&mut self, until: Instant, frame: Duration) -> usize;

    fn status(&self, gate: GateId) -> Option<GateStatus>;

    fn statuses(&self) -> Vec<GateStatus>;
}

impl<E: GateEffects> GateControl for GateNetwork<E> {
    fn resolve(&self, name: &str) -> Option<GateId> {
        self.find_by_name(name)
    }

    fn now(&self) -> Instant {
        GateNetwork::now(self)
    }

    fn begin_dial(
        &mut self,
        gate: GateId,
        kind: DialType,
        address: Address,
    ) -> Result<DialToken, DialError> {
        GateNetwork::begin_dial(self, gate, kind, address)
    }

    fn stop_dial(&mut self, gate: GateId) -> Result<StopOutcome, NetworkError> {
        GateNetwork::stop_dial(self, gate)
    }

    fn encode_step(&mut self, gate: GateId, symbol: Symbol) -> Result<ManualAck, ManualStepError> {
        GateNetwork::encode_step(self, gate, symbol)
    }

    fn lock_step(&mut self, gate: GateId, symbol: Symbol) -> Result<ManualAck, ManualStepError> {
        GateNetwork::lock_step(self, gate, symbol)
    }

    fn reset_to_idle(&mut self, gate: GateId) -> Result<GateState, NetworkError> {
        GateNetwork::reset_to_idle(self, gate)
    }

    fn close_link(&mut self, gate: GateId) -> Result<LinkId, NetworkError> {
        GateNetwork::close_link(self, gate)
    }

    fn transit(&mut self, gate: GateId, object: ObjectId) -> Result<TransitReceipt, TransitError> {
        GateNetwork::transit(self, gate, object, None)
    }

    fn run_until(&mut self, until: Instant, frame: Duration) -> usize {
        GateNetwork::run_until(self, until, frame)
    }

    fn status(&self, gate: GateId) -> Option<GateStatus> {
        self.gate(gate)
            .map(|current| GateStatus::capture(current, self.gates()))
    }

    fn statuses(&self) -> Vec<GateStatus> {
        self.gates()
            .iter()
            .map(|gate| GateStatus::capture(gate, self.gates()))
            .collect()
    }
}

/// Result of a successfully executed command.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandOutcome {
    DialStarted {
        gate: GateId,
        kind: DialType,
        token: DialToken,
    },
    Stop {
        gate: GateId,
        outcome: StopOutcome,
    },
    Step {
        gate: GateId,
        ack: ManualAck,
    },
    Reset {
        gate: GateId,
        previous: GateState,
    },
    Closed {
        gate: GateId,
        link: LinkId,
    },
    Transited(TransitReceipt),
    Advanced {
        now: Instant,
        fired: usize,
    },
    Status(Vec<GateStatus>),
    Help(Option<&'static CommandSpec>),
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutcome::DialStarted { gate, kind, token } => {
                write!(f, "{gate} {} dial started ({token})", kind.label())
            }
            CommandOutcome::Stop { gate, outcome } => write!(f, "{gate} {}", outcome.label()),
            CommandOutcome::Step { gate, ack } => {
                let verb = if ack.locks { "locking" } else { "encoding" };
                write!(f, "{gate} {verb} symbol {} at chevron {}", ack.symbol, ack.index)
            }
            CommandOutcome::Reset { gate, previous } => {
                write!(f, "{gate} reset to idle (was {previous})")
            }
            CommandOutcome::Closed { gate, link } => write!(f, "{gate} closed {link}"),
            CommandOutcome::Transited(receipt) => write!(
                f,
                "{} passed {} -> {} over {}",
                receipt.object, receipt.origin, receipt.destination, receipt.link
            ),
            CommandOutcome::Advanced { now, fired } => write!(f, "now {now}, {fired} steps fired"),
            CommandOutcome::Status(statuses) => {
                for (position, status) in statuses.iter().enumerate() {
                    if position > 0 {
                        f.write_str("\n")?;
                    }
                    let formatter = StatusFormatter::new(status);
                    formatter.write_summary_line(f)?;
                    f.write_str("\n  ")?;
                    formatter.write_ring_line(f)?;
                }
                Ok(())
            }
            CommandOutcome::Help(Some(spec)) => write!(f, "{} - {}", spec.usage, spec.summary),
            CommandOutcome::Help(None) => {
                for (position, spec) in catalog::commands().iter().enumerate() {
                    if position > 0 {
                        f.write_str("\n")?;
                    }
                    write!(f, "{:<44}{}", spec.usage, spec.summary)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CommandError<'a> {
    #[error("{0}")]
    Parse(ParseError<'a>),
    #[error("no gate named `{0}`")]
    UnknownGate(&'a str),
    #[error("no help for `{0}`")]
    UnknownTopic(&'a str),
    #[error(transparent)]
    Dial(#[from] DialError),
    #[error(transparent)]
    Manual(#[from] ManualStepError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Transit(#[from] TransitError),
}

impl<'a> From<ParseError<'a>> for CommandError<'a> {
    fn from(error: ParseError<'a>) -> Self {
        Self::Parse(error)
    }
}

/// Dispatches REPL commands into a [`GateControl`].
pub struct CommandExecutor<C> {
    control: C,
    frame: Duration,
}

impl<C> CommandExecutor<C> {
    pub const fn new(control: C) -> Self {
        Self {
            control,
            frame: DEFAULT_FRAME,
        }
    }

    /// Sets the tick length used by `advance`.
    #[must_use]
    pub fn with_frame(mut self, frame: Duration) -> Self {
        self.frame = frame;
        self
    }

    pub const fn frame(&self) -> Duration {
        self.frame
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut C {
        &mut self.control
    }

    pub fn into_inner(self) -> C {
        self.control
    }
}

impl<C: GateControl> CommandExecutor<C> {
    /// Parses and executes a REPL command.
    pub fn execute<'a>(&mut self, line: &'a str) -> Result<CommandOutcome, CommandError<'a>> {
        let command = grammar::parse(line)?;
        log_command(&command);
        self.dispatch(command)
    }

    fn dispatch<'a>(&mut self, command: Command<'a>) -> Result<CommandOutcome, CommandError<'a>> {
        let outcome = match command {
            Command::Dial {
                gate,
                mode,
                address,
            } => {
                let id = self.resolve(gate)?;
                let token = self.control.begin_dial(id, mode, address)?;
                CommandOutcome::DialStarted {
                    gate: id,
                    kind: mode,
                    token,
                }
            }
            Command::Encode { gate, symbol } => {
                let id = self.resolve(gate)?;
                let ack = self.control.encode_step(id, symbol)?;
                CommandOutcome::Step { gate: id, ack }
            }
            Command::Lock { gate, symbol } => {
                let id = self.resolve(gate)?;
                let ack = self.control.lock_step(id, symbol)?;
                CommandOutcome::Step { gate: id, ack }
            }
            Command::Stop { gate } => {
                let id = self.resolve(gate)?;
                let outcome = self.control.stop_dial(id)?;
                CommandOutcome::Stop { gate: id, outcome }
            }
            Command::Reset { gate } => {
                let id = self.resolve(gate)?;
                let previous = self.control.reset_to_idle(id)?;
                CommandOutcome::Reset { gate: id, previous }
            }
            Command::Close { gate } => {
                let id = self.resolve(gate)?;
                let link = self.control.close_link(id)?;
                CommandOutcome::Closed { gate: id, link }
            }
            Command::Send { gate, object } => {
                let id = self.resolve(gate)?;
                CommandOutcome::Transited(self.control.transit(id, object)?)
            }
            Command::Advance(by) => {
                let until = self.control.now() + by;
                let fired = self.control.run_until(until, self.frame);
                CommandOutcome::Advanced {
                    now: self.control.now(),
                    fired,
                }
            }
            Command::Status { gate: Some(gate) } => {
                let id = self.resolve(gate)?;
                let status = self
                    .control
                    .status(id)
                    .ok_or(CommandError::UnknownGate(gate))?;
                CommandOutcome::Status(alloc::vec![status])
            }
            Command::Status { gate: None } => CommandOutcome::Status(self.control.statuses()),
            Command::Help { topic: Some(topic) } => {
                let spec = catalog::find(topic).ok_or(CommandError::UnknownTopic(topic))?;
                CommandOutcome::Help(Some(spec))
            }
            Command::Help { topic: None } => CommandOutcome::Help(None),
        };
        Ok(outcome)
    }

    fn resolve<'a>(&self, name: &'a str) -> Result<GateId, CommandError<'a>> {
        self.control
            .resolve(name)
            .ok_or(CommandError::UnknownGate(name))
    }
}

fn log_command(command: &Command<'_>) {
    tracing::debug!(?command, "repl command");
}
