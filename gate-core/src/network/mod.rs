//! Gate network: the request surface and the frame tick.
//!
//! [`GateNetwork`] owns every gate together with the scheduler, the link
//! registry, the effects sink and the telemetry ring. Requests made between
//! ticks act at the time of the last tick. Each [`tick`](GateNetwork::tick)
//! first advances the rings, then fires every task that was due when the tick
//! opened; tasks queued while firing wait for a later tick.

use alloc::string::String;
use alloc::vec::Vec;
use core::time::Duration;

use thiserror::Error;

use crate::address::{Address, AddressError, Symbol};
use crate::clock::Instant;
use crate::dialing::context::{self, Readiness, assess_destination};
use crate::dialing::{
    DialContext, DialError, DialProfile, DialStep, DialToken, DialType, GateScheduler, GateTask,
    GateTelemetry, Lane, ManualAck, ManualStepError, ProfileRegistry, ProfileRegistryError,
    StepError, StopOutcome, TaskCategory, TokenSource, strategy_for,
};
use crate::effects::{GateEffects, NoopEffects, ObjectId, OwnerId};
use crate::gate::{Gate, GateConfig, GateId, GateState};
use crate::link::{self, LinkError, LinkId, LinkRegistry};
use crate::telemetry::FailureReason;
use crate::transit::{self, TransitError, TransitReceipt};

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum NetworkError {
    #[error("unknown gate {0}")]
    UnknownGate(GateId),
    #[error("a gate named `{0}` already exists")]
    DuplicateName(String),
    #[error("address {0} is already assigned")]
    DuplicateAddress(Address),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error("network cannot hold more gates")]
    Full,
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Step(#[from] StepError),
}

/// Every gate of one simulation, driven by a single clock.
pub struct GateNetwork<E: GateEffects = NoopEffects> {
    gates: Vec<Gate>,
    scheduler: GateScheduler,
    links: LinkRegistry,
    profiles: ProfileRegistry,
    effects: E,
    telemetry: GateTelemetry,
    tokens: TokenSource,
    now: Instant,
}

impl<E: GateEffects> GateNetwork<E> {
    #[must_use]
    pub fn new(effects: E) -> Self {
        Self::with_profiles(effects, ProfileRegistry::new())
    }

    #[must_use]
    pub fn with_profiles(effects: E, profiles: ProfileRegistry) -> Self {
        Self {
            gates: Vec::new(),
            scheduler: GateScheduler::new(),
            links: LinkRegistry::new(),
            profiles,
            effects,
            telemetry: GateTelemetry::new(),
            tokens: TokenSource::new(),
            now: Instant::ZERO,
        }
    }

    /// Registers a gate; its own address must be valid and unique.
    pub fn add_gate(&mut self, config: GateConfig) -> Result<GateId, NetworkError> {
        config
            .address
            .validate(config.size, config.ring.glyph_count)?;
        if self.find_by_name(&config.name).is_some() {
            return Err(NetworkError::DuplicateName(config.name));
        }
        if self.find_destination(&config.address).is_some() {
            return Err(NetworkError::DuplicateAddress(config.address));
        }
        let id = u16::try_from(self.gates.len())
            .map(GateId)
            .map_err(|_| NetworkError::Full)?;
        log_gate_added(id, &config);
        self.gates.push(Gate::new(id, config));
        Ok(id)
    }

    /// Overrides the pacing of one strategy.
    pub fn register_profile(&mut self, profile: DialProfile) -> Result<(), ProfileRegistryError> {
        self.profiles.register(profile)
    }

    #[must_use]
    pub fn gate(&self, id: GateId) -> Option<&Gate> {
        self.gates.get(id.index())
    }

    #[must_use]
    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    /// Gate called `name`, ignoring ASCII case.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<GateId> {
        self.gates
            .iter()
            .find(|gate| gate.name().eq_ignore_ascii_case(name))
            .map(Gate::id)
    }

    #[must_use]
    pub fn find_destination(&self, address: &Address) -> Option<GateId> {
        context::find_destination(&self.gates, address)
    }

    /// Readiness `initiator` would see for `address` with strategy `kind` right now.
    #[must_use]
    pub fn readiness(&self, initiator: GateId, address: &Address, kind: DialType) -> Readiness {
        assess_destination(
            &self.gates,
            initiator,
            address,
            strategy_for(kind).requires_matching_glyphs(),
        )
    }

    #[must_use]
    pub const fn now(&self) -> Instant {
        self.now
    }

    /// Tasks queued for `gate` across every lane.
    #[must_use]
    pub fn pending_tasks(&self, gate: GateId) -> usize {
        self.scheduler
            .pending_where(|category| category.gate == gate)
    }

    #[must_use]
    pub fn pending_in(&self, gate: GateId, lane: Lane) -> usize {
        self.scheduler.pending_in(TaskCategory::new(gate, lane))
    }

    /// Fire time of the earliest queued task.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_fire_at()
    }

    #[must_use]
    pub const fn links(&self) -> &LinkRegistry {
        &self.links
    }

    #[must_use]
    pub const fn telemetry(&self) -> &GateTelemetry {
        &self.telemetry
    }

    #[must_use]
    pub const fn effects(&self) -> &E {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut E {
        &mut self.effects
    }

    #[must_use]
    pub const fn profiles(&self) -> &ProfileRegistry {
        &self.profiles
    }

    /// Starts a dial; manual dials take an empty address.
    pub fn begin_dial(
        &mut self,
        gate: GateId,
        kind: DialType,
        address: Address,
    ) -> Result<DialToken, DialError> {
        context::begin_dial(&mut self.context(), gate, kind, address)
    }

    pub fn stop_dial(&mut self, gate: GateId) -> Result<StopOutcome, NetworkError> {
        if self.gate(gate).is_none() {
            return Err(NetworkError::UnknownGate(gate));
        }
        Ok(context::request_stop(&mut self.context(), gate)?)
    }

    /// Encodes one intermediate symbol of a manual dial.
    pub fn encode_step(&mut self, gate: GateId, symbol: Symbol) -> Result<ManualAck, ManualStepError> {
        context::manual_step(&mut self.context(), gate, symbol, false)
    }

    /// Supplies the final symbol of a manual dial; the commit follows on its own.
    pub fn lock_step(&mut self, gate: GateId, symbol: Symbol) -> Result<ManualAck, ManualStepError> {
        context::manual_step(&mut self.context(), gate, symbol, true)
    }

    /// Forces `gate` back to idle without a failure cue, closing its link if any.
    ///
    /// Returns the state the gate was in.
    pub fn reset_to_idle(&mut self, gate: GateId) -> Result<GateState, NetworkError> {
        let current = self.gate(gate).ok_or(NetworkError::UnknownGate(gate))?;
        let state = current.state();
        let chevrons = current.active_chevron_count();
        let mut ctx = self.context();
        if state == GateState::Dialing {
            ctx.telemetry
                .record_failure(gate, FailureReason::Cancelled, chevrons, ctx.now);
        }
        context::return_to_idle(&mut ctx, gate);
        Ok(state)
    }

    /// Closes the open link `gate` takes part in.
    pub fn close_link(&mut self, gate: GateId) -> Result<LinkId, NetworkError> {
        if self.gate(gate).is_none() {
            return Err(NetworkError::UnknownGate(gate));
        }
        Ok(link::teardown(&mut self.context(), gate)?)
    }

    /// Sends `object` through the open link of `gate`.
    pub fn transit(
        &mut self,
        gate: GateId,
        object: ObjectId,
        prior_owner: Option<OwnerId>,
    ) -> Result<TransitReceipt, TransitError> {
        transit::send(&mut self.context(), gate, object, prior_owner)
    }

    /// Advances the network to `now`, returning the number of tasks fired.
    pub fn tick(&mut self, now: Instant) -> usize {
        let now = now.max(self.now);
        let blend = now.saturating_duration_since(self.now);
        self.now = now;

        for gate in &mut self.gates {
            let moving = gate.ring.is_busy();
            if let Some(event) = gate.ring.update(now)
                && let Some(attempt) = gate.attempt.as_ref()
                && let Some(index) = attempt.awaiting_ring
            {
                self.scheduler.schedule(
                    now,
                    TaskCategory::new(gate.id(), Lane::Dialing),
                    GateTask::Dial {
                        token: attempt.token,
                        step: DialStep::RingArrived {
                            index,
                            reached: event.reached(),
                        },
                    },
                );
            }
            if moving {
                self.effects
                    .rotate_mechanism(gate.id(), gate.ring.angle(), blend);
            }
        }

        let cursor = self.scheduler.begin_tick(now);
        let mut fired = 0;
        while let Some((category, task)) = self.scheduler.pop_due(&cursor) {
            fired += 1;
            let mut ctx = self.context();
            if let Err(error) = context::dispatch(&mut ctx, category, task) {
                log_step_fault(category.gate, &error);
                context::cancel_attempt(&mut ctx, category.gate, FailureReason::Fault, true);
            }
        }
        fired
    }

    /// Ticks every `frame` until `until`, returning the number of tasks fired.
    pub fn run_until(&mut self, until: Instant, frame: Duration) -> usize {
        let frame = frame.max(Duration::from_millis(1));
        let mut fired = 0;
        while self.now < until {
            let next = (self.now + frame).min(until);
            fired += self.tick(next);
        }
        fired
    }

    fn context(&mut self) -> DialContext<'_> {
        DialContext {
            now: self.now,
            gates: self.gates.as_mut_slice(),
            scheduler: &mut self.scheduler,
            links: &mut self.links,
            effects: &mut self.effects,
            telemetry: &mut self.telemetry,
            profiles: &self.profiles,
            tokens: &mut self.tokens,
        }
    }
}

impl Default for GateNetwork<NoopEffects> {
    fn default() -> Self {
        Self::new(NoopEffects)
    }
}

fn log_gate_added(id: GateId, config: &GateConfig) {
    tracing::info!(gate = %id, name = %config.name, address = %config.address, "gate registered");
}

fn log_step_fault(gate: GateId, error: &StepError) {
    tracing::error!(%gate, %error, "dial step failed; forcing gate idle");
}
