//! Borrowed view of a gate network handed to every dial step.
//!
//! Strategies never own state of their own. They read and write the gates,
//! queue continuations and emit effects through a [`DialContext`], and they
//! leave through the shared helpers here: [`commit`] for the final readiness
//! decision, [`cancel_attempt`] for failures and [`return_to_idle`] for the
//! single reset path.

use core::time::Duration;

use crate::address::{Address, AddressError, Symbol, check_symbol};
use crate::chevron::ChevronVariant;
use crate::clock::Instant;
use crate::effects::{GateEffects, SoundCue};
use crate::gate::{DialAttempt, DialRole, Gate, GateId, GateState, PendingSymbol};
use crate::link::{self, LinkRegistry, LinkStatus};
use crate::ring::RotationError;
use crate::telemetry::FailureReason;

use super::{
    DialError, DialProfile, DialStep, DialToken, DialType, GateScheduler, GateTask,
    GateTelemetry, Lane, LinkTask, ManualAck, ManualStepError, NotReadyReason, ProfileRegistry,
    StepError, StopOutcome, TaskCategory, TokenSource, inbound, strategy_for,
};

/// Mutable borrow of everything a step may touch.
pub struct DialContext<'a> {
    pub now: Instant,
    pub gates: &'a mut [Gate],
    pub scheduler: &'a mut GateScheduler,
    pub links: &'a mut LinkRegistry,
    pub effects: &'a mut dyn GateEffects,
    pub telemetry: &'a mut GateTelemetry,
    pub profiles: &'a ProfileRegistry,
    pub tokens: &'a mut TokenSource,
}

impl DialContext<'_> {
    fn slot(&self, id: GateId) -> Result<usize, StepError> {
        let index = id.index();
        if index < self.gates.len() {
            Ok(index)
        } else {
            Err(StepError::UnknownGate(id))
        }
    }

    pub fn gate(&self, id: GateId) -> Result<&Gate, StepError> {
        let index = self.slot(id)?;
        Ok(&self.gates[index])
    }

    pub fn gate_mut(&mut self, id: GateId) -> Result<&mut Gate, StepError> {
        let index = self.slot(id)?;
        Ok(&mut self.gates[index])
    }

    pub fn attempt_mut(&mut self, id: GateId) -> Result<&mut DialAttempt, StepError> {
        self.gate_mut(id)?
            .attempt
            .as_mut()
            .ok_or(StepError::NoAttempt(id))
    }

    /// Pacing for `kind`, registered or built-in.
    #[must_use]
    pub fn profile(&self, kind: DialType) -> DialProfile {
        self.profiles.resolve(kind)
    }

    /// Queues `step` for the attempt `token` on the gate's dialing lane.
    pub fn schedule_step(&mut self, gate: GateId, token: DialToken, step: DialStep, delay: Duration) {
        self.schedule_at(gate, Lane::Dialing, self.now + delay, GateTask::Dial { token, step });
    }

    pub fn schedule_at(&mut self, gate: GateId, lane: Lane, at: Instant, task: GateTask) {
        self.scheduler.schedule(at, TaskCategory::new(gate, lane), task);
    }

    /// Gate whose own address equals `address`.
    #[must_use]
    pub fn find_destination(&self, address: &Address) -> Option<GateId> {
        find_destination(&*self.gates, address)
    }

    /// Activates chevron `index` now with the cue of `variant` and lights it.
    pub fn light(
        &mut self,
        gate: GateId,
        index: usize,
        variant: ChevronVariant,
    ) -> Result<(), StepError> {
        let slot = self.slot(gate)?;
        self.gates[slot]
            .chevrons
            .activate(&mut *self.effects, index, Duration::ZERO, true, variant)?;
        Ok(())
    }

    /// Replaces the give-up deadline of the gate's attempt.
    pub fn arm_give_up(&mut self, gate: GateId, after: Option<Duration>) -> Result<(), StepError> {
        let (token, previous) = {
            let attempt = self.attempt_mut(gate)?;
            (attempt.token, attempt.give_up.take())
        };
        if let Some(handle) = previous {
            self.scheduler.cancel(handle);
        }
        if let Some(after) = after {
            let handle = self.scheduler.schedule(
                self.now + after,
                TaskCategory::new(gate, Lane::Dialing),
                GateTask::Dial {
                    token,
                    step: DialStep::GiveUp,
                },
            );
            self.attempt_mut(gate)?.give_up = Some(handle);
        }
        Ok(())
    }
}

/// Gate whose own address equals `address`.
#[must_use]
pub fn find_destination(gates: &[Gate], address: &Address) -> Option<GateId> {
    gates
        .iter()
        .find(|gate| gate.address() == address)
        .map(Gate::id)
}

/// Outcome of the readiness predicate.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Readiness {
    /// Destination is idle.
    Ready(GateId),
    /// Destination is dialing the initiator; the first commit wins.
    Race(GateId),
    /// Destination already mirrors an inbound dial from the initiator.
    Mirroring(GateId),
    NotReady(NotReadyReason),
}

impl Readiness {
    #[must_use]
    pub const fn destination(self) -> Option<GateId> {
        match self {
            Readiness::Ready(gate) | Readiness::Race(gate) | Readiness::Mirroring(gate) => {
                Some(gate)
            }
            Readiness::NotReady(_) => None,
        }
    }
}

/// Decides whether `initiator` may link to the gate at `address` right now.
#[must_use]
pub fn assess_destination(
    gates: &[Gate],
    initiator: GateId,
    address: &Address,
    match_glyphs: bool,
) -> Readiness {
    let Some(destination) = find_destination(gates, address) else {
        return Readiness::NotReady(NotReadyReason::NoMatch);
    };
    if destination == initiator {
        return Readiness::NotReady(NotReadyReason::SelfTarget);
    }
    let (Some(origin), Some(target)) = (gates.get(initiator.index()), gates.get(destination.index()))
    else {
        return Readiness::NotReady(NotReadyReason::NoMatch);
    };
    if match_glyphs && origin.glyph_count() != target.glyph_count() {
        return Readiness::NotReady(NotReadyReason::GlyphMismatch);
    }

    match target.state() {
        GateState::Idle => Readiness::Ready(destination),
        GateState::Active => Readiness::NotReady(NotReadyReason::DestinationActive),
        GateState::Dialing => match target.attempt() {
            Some(attempt) if attempt.is_inbound_from(initiator) => {
                Readiness::Mirroring(destination)
            }
            Some(attempt)
                if !attempt.stop_requested
                    && !attempt.deferred_stop
                    && !attempt.is_locked_invalid
                    && attempt.heads_to(origin.address()) =>
            {
                Readiness::Race(destination)
            }
            _ => Readiness::NotReady(NotReadyReason::DestinationBusy),
        },
    }
}

/// Starts a dial of `kind` on an idle gate.
///
/// The address is validated before the gate leaves idle; manual dials take
/// an empty address and receive their symbols through [`manual_step`].
pub(crate) fn begin_dial(
    ctx: &mut DialContext<'_>,
    gate: GateId,
    kind: DialType,
    address: Address,
) -> Result<DialToken, DialError> {
    let current = ctx.gate(gate).map_err(|_| DialError::UnknownGate(gate))?;
    if !current.is_idle() {
        return Err(DialError::NotIdle {
            gate,
            state: current.state(),
        });
    }
    let target = if kind == DialType::Manual {
        if !address.is_empty() {
            return Err(DialError::ManualAddress);
        }
        None
    } else {
        address.validate(current.size(), current.glyph_count())?;
        Some(address)
    };

    let token = ctx.tokens.issue();
    let now = ctx.now;
    {
        let entry = ctx.gate_mut(gate)?;
        entry.state = GateState::Dialing;
        entry.chevron_count = 0;
        entry.linked = None;
        entry.attempt = Some(DialAttempt::outgoing(token, kind, target, now));
    }
    ctx.telemetry.record_dial_started(gate, kind, now);
    log_dial_started(gate, kind, token);

    strategy_for(kind).begin(ctx, gate)?;
    Ok(token)
}

/// Appends one symbol to a manual dial, starting one on an idle gate.
pub(crate) fn manual_step(
    ctx: &mut DialContext<'_>,
    gate: GateId,
    symbol: Symbol,
    locks: bool,
) -> Result<ManualAck, ManualStepError> {
    let current = ctx.gate(gate).map_err(|_| DialError::UnknownGate(gate))?;
    if current.is_idle() {
        check_symbol(symbol, current.glyph_count())?;
        let size = current.size().symbols();
        if locks && size > 1 {
            return Err(ManualStepError::TooFewSymbols {
                expected: size - 1,
                found: 0,
            });
        }
        begin_dial(ctx, gate, DialType::Manual, Address::empty())?;
    }

    let current = ctx.gate(gate).map_err(DialError::from)?;
    let attempt = current
        .attempt()
        .filter(|attempt| attempt.role == DialRole::Outgoing(DialType::Manual))
        .ok_or(ManualStepError::NotManual { gate })?;
    if attempt.stop_requested || attempt.deferred_stop || attempt.is_locked_invalid {
        return Err(ManualStepError::Stopping);
    }
    if attempt.busy || attempt.pending.is_some() || attempt.awaiting_ring.is_some() {
        return Err(ManualStepError::StepInFlight);
    }
    if current.ring().is_busy() {
        return Err(ManualStepError::RingBusy);
    }
    check_symbol(symbol, current.glyph_count())?;
    if attempt.dialed.contains(symbol) {
        return Err(AddressError::DuplicateSymbol(symbol).into());
    }

    let index = attempt.dialed.len();
    let size = current.size().symbols();
    if locks && index + 1 != size {
        return Err(ManualStepError::TooFewSymbols {
            expected: size - 1,
            found: index,
        });
    }
    if !locks && index + 1 >= size {
        return Err(ManualStepError::TooManySymbols { max: size - 1 });
    }

    let now = ctx.now;
    let glyphs = current.glyph_count();
    ctx.gate_mut(gate)
        .map_err(DialError::from)?
        .ring
        .rotate_to_symbol(symbol, 0.0, now)
        .map_err(|error| match error {
            RotationError::UnknownSymbol(symbol) => {
                ManualStepError::Address(AddressError::UnknownSymbol {
                    symbol,
                    glyphs,
                })
            }
            RotationError::InFlight | RotationError::NotStopped => ManualStepError::RingBusy,
        })?;
    {
        let attempt = ctx.attempt_mut(gate).map_err(DialError::from)?;
        attempt.pending = Some(PendingSymbol {
            index,
            symbol,
            locks,
        });
        attempt.awaiting_ring = Some(index);
    }
    ctx.effects.play_sound(gate, SoundCue::RingSpin, Duration::ZERO);
    let give_up = ctx.profile(DialType::Manual).give_up_after;
    ctx.arm_give_up(gate, give_up).map_err(DialError::from)?;
    log_manual_step(gate, index, symbol, locks);

    Ok(ManualAck {
        index,
        symbol,
        locks,
    })
}

/// Requests a cooperative stop of the gate's outgoing attempt.
pub(crate) fn request_stop(ctx: &mut DialContext<'_>, gate: GateId) -> Result<StopOutcome, StepError> {
    let now = ctx.now;
    let slot = ctx.slot(gate)?;
    let entry = &mut ctx.gates[slot];
    match entry.state {
        GateState::Idle => return Ok(StopOutcome::AlreadyIdle),
        GateState::Active => return Ok(StopOutcome::NotDialing),
        GateState::Dialing => {}
    }
    let Some(attempt) = entry.attempt.as_mut() else {
        return Ok(StopOutcome::AlreadyIdle);
    };
    if !attempt.is_outgoing() {
        return Ok(StopOutcome::Ignored);
    }
    if attempt.stop_requested || attempt.deferred_stop {
        return Ok(StopOutcome::AlreadyStopping);
    }
    if attempt.busy {
        attempt.deferred_stop = true;
        ctx.telemetry.record_stop_deferred(gate, now);
        log_stop_deferred(gate);
        return Ok(StopOutcome::Deferred);
    }

    attempt.stop_requested = true;
    let token = attempt.token;
    entry.ring.cancel();
    ctx.schedule_step(gate, token, DialStep::Unwind, Duration::ZERO);
    Ok(StopOutcome::Stopping)
}

/// Routes one fired task to its handler.
pub(crate) fn dispatch(
    ctx: &mut DialContext<'_>,
    category: TaskCategory,
    task: GateTask,
) -> Result<(), StepError> {
    match task {
        GateTask::Dial { token, step } => run_dial_step(ctx, category.gate, token, step),
        GateTask::Inbound { token, step } => inbound::advance(ctx, category.gate, token, step),
        GateTask::Link(LinkTask::AutoClose { link }) => {
            link::auto_close(ctx, category.gate, link)
        }
    }
}

fn run_dial_step(
    ctx: &mut DialContext<'_>,
    gate: GateId,
    token: DialToken,
    step: DialStep,
) -> Result<(), StepError> {
    let Some(attempt) = ctx.gate(gate)?.attempt().filter(|attempt| attempt.token == token) else {
        log_stale_step(gate, token, step);
        return Ok(());
    };
    let kind = attempt.dial_type();
    let stopping = attempt.stop_requested;
    let holding = attempt.is_locked_invalid;

    match step {
        DialStep::Unwind => {
            unwind(ctx, gate);
            Ok(())
        }
        DialStep::FailHoldElapsed => {
            if holding && ctx.gate(gate)?.state() == GateState::Dialing {
                return_to_idle(ctx, gate);
            }
            Ok(())
        }
        DialStep::GiveUp => give_up(ctx, gate),
        _ if stopping => {
            unwind(ctx, gate);
            Ok(())
        }
        _ => strategy_for(kind).advance(ctx, gate, step),
    }
}

fn unwind(ctx: &mut DialContext<'_>, gate: GateId) {
    let holding = ctx.gate(gate).is_ok_and(Gate::is_locked_invalid);
    if holding {
        return_to_idle(ctx, gate);
    } else {
        cancel_attempt(ctx, gate, FailureReason::Cancelled, true);
    }
}

fn give_up(ctx: &mut DialContext<'_>, gate: GateId) -> Result<(), StepError> {
    let now = ctx.now;
    let slot = ctx.slot(gate)?;
    let attempt = ctx.gates[slot]
        .attempt
        .as_mut()
        .ok_or(StepError::NoAttempt(gate))?;
    attempt.give_up = None;
    if attempt.busy {
        if !attempt.deferred_stop {
            attempt.deferred_stop = true;
            ctx.telemetry.record_stop_deferred(gate, now);
            log_stop_deferred(gate);
        }
        return Ok(());
    }
    cancel_attempt(ctx, gate, FailureReason::GaveUp, true);
    Ok(())
}

/// Ends the gate's attempt without a link and resets it to idle.
pub(crate) fn cancel_attempt(
    ctx: &mut DialContext<'_>,
    gate: GateId,
    reason: FailureReason,
    play_cue: bool,
) {
    let Ok(entry) = ctx.gate(gate) else {
        return;
    };
    let chevrons = entry.active_chevron_count();
    if play_cue {
        ctx.effects.play_sound(gate, SoundCue::DialFail, Duration::ZERO);
    }
    ctx.telemetry.record_failure(gate, reason, chevrons, ctx.now);
    log_dial_failed(gate, reason);
    return_to_idle(ctx, gate);
}

/// Final readiness check and commit of an outgoing attempt.
pub(crate) fn commit(
    ctx: &mut DialContext<'_>,
    gate: GateId,
    match_glyphs: bool,
) -> Result<(), StepError> {
    let address = {
        let attempt = ctx.attempt_mut(gate)?;
        attempt.busy = true;
        attempt.dialed.clone()
    };

    match assess_destination(&*ctx.gates, gate, &address, match_glyphs) {
        Readiness::NotReady(reason) => fail_commit(ctx, gate, reason),
        Readiness::Ready(destination)
        | Readiness::Race(destination)
        | Readiness::Mirroring(destination) => {
            link::establish(ctx, gate, destination)?;
            let deferred = {
                let attempt = ctx.attempt_mut(gate)?;
                attempt.busy = false;
                attempt.deferred_stop
            };
            if deferred {
                log_deferred_stop_applied(gate);
                link::teardown(ctx, gate)?;
            }
            Ok(())
        }
    }
}

fn fail_commit(
    ctx: &mut DialContext<'_>,
    gate: GateId,
    reason: NotReadyReason,
) -> Result<(), StepError> {
    let now = ctx.now;
    let (token, kind, deferred) = {
        let attempt = ctx.attempt_mut(gate)?;
        attempt.is_locked = true;
        attempt.is_locked_invalid = true;
        attempt.busy = false;
        attempt.awaiting_ring = None;
        attempt.pending = None;
        attempt.give_up = None;
        (attempt.token, attempt.dial_type(), attempt.deferred_stop)
    };
    let chevrons = ctx.gate(gate)?.active_chevron_count();

    ctx.effects.play_sound(gate, SoundCue::DialFail, Duration::ZERO);
    ctx.telemetry
        .record_failure(gate, FailureReason::NotReady(reason), chevrons, now);
    log_commit_failed(gate, reason);
    release_link(ctx, gate);
    ctx.scheduler
        .cancel_category(TaskCategory::new(gate, Lane::Dialing));

    if deferred {
        return_to_idle(ctx, gate);
    } else {
        let hold = ctx.profile(kind).fail_hold;
        ctx.schedule_step(gate, token, DialStep::FailHoldElapsed, hold);
    }
    Ok(())
}

/// Turns a racing `loser` into the inbound side of `winner`'s link.
pub(crate) fn supersede(
    ctx: &mut DialContext<'_>,
    loser: GateId,
    winner: GateId,
) -> Result<(), StepError> {
    let now = ctx.now;
    let kind = ctx
        .gate(winner)?
        .dial_type()
        .ok_or(StepError::NoAttempt(winner))?;
    ctx.scheduler
        .cancel_where(|category| category.gate == loser && category.lane != Lane::Link);
    release_link(ctx, loser);

    let token = ctx.tokens.issue();
    let entry = ctx.gate_mut(loser)?;
    entry.ring.reset();
    entry.attempt = Some(DialAttempt::inbound(token, winner, kind, now));
    ctx.telemetry.record_superseded(loser, winner, now);
    log_superseded(loser, winner);
    Ok(())
}

/// Releases the gate's link record and resets its partner where needed.
pub(crate) fn release_link(ctx: &mut DialContext<'_>, gate: GateId) {
    let Some(record) = ctx.links.release(gate) else {
        return;
    };
    let partner = record.partner_of(gate);
    match record.status {
        LinkStatus::Open => {
            ctx.effects.play_sound(record.origin, SoundCue::LinkClose, Duration::ZERO);
            ctx.effects
                .play_sound(record.destination, SoundCue::LinkClose, Duration::ZERO);
            ctx.telemetry.record_link_closed(
                record.origin,
                record.destination,
                record.opened_at,
                ctx.now,
            );
            log_link_closed(record.origin, record.destination);
            reset_gate(ctx, partner);
        }
        LinkStatus::Pending => {
            let mirroring = ctx
                .gate(partner)
                .ok()
                .and_then(Gate::attempt)
                .is_some_and(|attempt| attempt.is_inbound_from(gate));
            if mirroring {
                reset_gate(ctx, partner);
            }
        }
    }
}

/// The single path back to idle: releases the link, then resets the gate.
pub(crate) fn return_to_idle(ctx: &mut DialContext<'_>, gate: GateId) {
    release_link(ctx, gate);
    reset_gate(ctx, gate);
}

fn reset_gate(ctx: &mut DialContext<'_>, gate: GateId) {
    ctx.scheduler.cancel_where(|category| category.gate == gate);
    let Ok(slot) = ctx.slot(gate) else {
        return;
    };
    let entry = &mut ctx.gates[slot];
    entry.ring.reset();
    entry
        .chevrons
        .unlock_all(&mut *ctx.effects, Duration::ZERO, true);
    entry.attempt = None;
    entry.state = GateState::Idle;
    entry.chevron_count = 0;
    entry.linked = None;
    log_gate_idle(gate);
}

fn log_dial_started(gate: GateId, kind: DialType, token: DialToken) {
    tracing::info!(%gate, %kind, %token, "dial started");
}

fn log_manual_step(gate: GateId, index: usize, symbol: Symbol, locks: bool) {
    tracing::debug!(%gate, index, %symbol, locks, "manual symbol accepted");
}

fn log_stale_step(gate: GateId, token: DialToken, step: DialStep) {
    tracing::trace!(%gate, %token, step = step.label(), "dropping stale step");
}

fn log_stop_deferred(gate: GateId) {
    tracing::warn!(%gate, "stop requested inside busy window; deferring");
}

fn log_deferred_stop_applied(gate: GateId) {
    tracing::info!(%gate, "applying deferred stop to new link");
}

fn log_dial_failed(gate: GateId, reason: FailureReason) {
    tracing::warn!(%gate, %reason, "dial ended without a link");
}

fn log_commit_failed(gate: GateId, reason: NotReadyReason) {
    tracing::warn!(%gate, %reason, "destination not ready at commit");
}

fn log_superseded(loser: GateId, winner: GateId) {
    tracing::info!(%loser, %winner, "racing dial superseded");
}

fn log_link_closed(origin: GateId, destination: GateId) {
    tracing::info!(%origin, %destination, "link closed");
}

fn log_gate_idle(gate: GateId) {
    tracing::debug!(%gate, "gate returned to idle");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::GateSize;
    use crate::gate::GateConfig;

    fn gates() -> [Gate; 3] {
        let config = |name: &str, indices: &[u8]| {
            GateConfig::new(
                name,
                Address::from_indices(indices).expect("address should build"),
                GateSize::Seven,
            )
        };
        [
            Gate::new(GateId(0), config("earth", &[26, 6, 14, 31, 11, 29, 0])),
            Gate::new(GateId(1), config("abydos", &[27, 7, 15, 32, 12, 30, 1])),
            Gate::new(GateId(2), config("chulak", &[8, 1, 22, 14, 36, 19, 2])),
        ]
    }

    #[test]
    fn idle_destinations_are_ready() {
        let gates = gates();
        let abydos = gates[1].address().clone();
        assert_eq!(
            assess_destination(&gates, GateId(0), &abydos, true),
            Readiness::Ready(GateId(1))
        );
    }

    #[test]
    fn unknown_and_self_addresses_are_not_ready() {
        let gates = gates();
        let earth = gates[0].address().clone();
        let nowhere = Address::from_indices(&[1, 2, 3, 4, 5, 6, 7]).expect("address should build");
        assert_eq!(
            assess_destination(&gates, GateId(0), &earth, true),
            Readiness::NotReady(NotReadyReason::SelfTarget)
        );
        assert_eq!(
            assess_destination(&gates, GateId(0), &nowhere, true),
            Readiness::NotReady(NotReadyReason::NoMatch)
        );
    }

    #[test]
    fn dialing_destinations_race_or_are_busy() {
        let mut gates = gates();
        let earth = gates[0].address().clone();
        let chulak = gates[2].address().clone();
        let abydos = gates[1].address().clone();

        gates[1].state = GateState::Dialing;
        gates[1].attempt = Some(DialAttempt::outgoing(
            DialToken(9),
            DialType::Slow,
            Some(earth),
            Instant::ZERO,
        ));
        assert_eq!(
            assess_destination(&gates, GateId(0), &abydos, true),
            Readiness::Race(GateId(1))
        );
        assert_eq!(
            assess_destination(&gates, GateId(2), &abydos, true),
            Readiness::NotReady(NotReadyReason::DestinationBusy)
        );

        gates[2].state = GateState::Dialing;
        gates[2].attempt = Some(DialAttempt::inbound(
            DialToken(10),
            GateId(0),
            DialType::Fast,
            Instant::ZERO,
        ));
        assert_eq!(
            assess_destination(&gates, GateId(0), &chulak, true),
            Readiness::Mirroring(GateId(2))
        );
    }

    #[test]
    fn glyph_sets_must_match_when_required() {
        let mut gates = gates();
        let ring = crate::ring::RingProfile {
            glyph_count: 36,
            ..crate::ring::DEFAULT_RING_PROFILE
        };
        let config = gates[1].config().clone().with_ring(ring);
        gates[1] = Gate::new(GateId(1), config);
        let abydos = gates[1].address().clone();

        assert_eq!(
            assess_destination(&gates, GateId(0), &abydos, true),
            Readiness::NotReady(NotReadyReason::GlyphMismatch)
        );
        assert_eq!(
            assess_destination(&gates, GateId(0), &abydos, false),
            Readiness::Ready(GateId(1))
        );
    }
}
