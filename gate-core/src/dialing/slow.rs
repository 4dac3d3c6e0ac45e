//! Ring-driven dial, one symbol per completed rotation.

use core::time::Duration;

use crate::chevron::ChevronVariant;
use crate::effects::SoundCue;
use crate::gate::GateId;
use crate::telemetry::FailureReason;

use super::context;
use super::{DialContext, DialError, DialStep, DialStrategy, DialType, StepError};

#[derive(Copy, Clone, Debug, Default)]
pub struct SlowDial;

impl SlowDial {
    fn rotate(ctx: &mut DialContext<'_>, gate: GateId, index: usize) -> Result<(), StepError> {
        let now = ctx.now;
        let symbol = ctx
            .gate(gate)?
            .attempt()
            .ok_or(StepError::NoAttempt(gate))?
            .symbol_at(index)
            .ok_or(StepError::MissingSymbol { index })?;
        ctx.gate_mut(gate)?.ring.rotate_to_symbol(symbol, 0.0, now)?;
        ctx.attempt_mut(gate)?.awaiting_ring = Some(index);
        ctx.effects.play_sound(gate, SoundCue::RingSpin, Duration::ZERO);
        tracing::debug!(%gate, index, %symbol, "rotating to symbol");
        Ok(())
    }

    fn engage(ctx: &mut DialContext<'_>, gate: GateId, index: usize) -> Result<(), StepError> {
        let locks = engage_chevron(ctx, gate, index)?;
        if locks {
            return context::commit(ctx, gate, true);
        }
        ctx.gate_mut(gate)?.ring.flip_direction()?;
        let token = ctx.gate(gate)?.token().ok_or(StepError::NoAttempt(gate))?;
        let pause = ctx.profile(DialType::Slow).symbol_pause;
        ctx.schedule_step(gate, token, DialStep::RotateToSymbol { index: index + 1 }, pause);
        Ok(())
    }
}

/// Continuation of a ring pass toward symbol `index`.
///
/// Appends the symbol, enters the busy window on the final one and queues the
/// chevron engage. A ring that coasted to a stop ends the attempt.
pub(crate) fn ring_arrived(
    ctx: &mut DialContext<'_>,
    gate: GateId,
    index: usize,
    reached: bool,
) -> Result<(), StepError> {
    if !reached {
        context::cancel_attempt(ctx, gate, FailureReason::Cancelled, true);
        return Ok(());
    }

    let size = ctx.gate(gate)?.size().symbols();
    let (token, kind, partial) = {
        let attempt = ctx.attempt_mut(gate)?;
        let symbol = attempt
            .symbol_at(index)
            .ok_or(StepError::MissingSymbol { index })?;
        attempt.awaiting_ring = None;
        attempt.dialed.push(symbol)?;
        if index + 1 == size {
            attempt.busy = true;
        }
        (attempt.token, attempt.dial_type(), attempt.dialed.clone())
    };

    let candidates = ctx
        .gates
        .iter()
        .filter(|other| other.id() != gate && partial.is_prefix_of(other.address()))
        .count();
    tracing::debug!(%gate, index, address = %partial, candidates, "symbol aligned");

    let engage = ctx.profile(kind).chevron_engage;
    ctx.schedule_step(gate, token, DialStep::EngageChevron { index }, engage);
    Ok(())
}

/// Lights chevron `index` for an aligned symbol; returns `true` when it locks.
pub(crate) fn engage_chevron(
    ctx: &mut DialContext<'_>,
    gate: GateId,
    index: usize,
) -> Result<bool, StepError> {
    let now = ctx.now;
    let locks = index + 1 == ctx.gate(gate)?.size().symbols();
    let symbol = {
        let attempt = ctx.attempt_mut(gate)?;
        attempt.pending = None;
        attempt
            .dialed
            .get(index)
            .ok_or(StepError::MissingSymbol { index })?
    };
    let variant = if locks {
        ChevronVariant::Lock
    } else {
        ChevronVariant::Encode
    };
    ctx.light(gate, index, variant)?;
    ctx.gate_mut(gate)?.chevron_count = index + 1;
    ctx.telemetry.record_symbol(gate, index, symbol, locks, now);
    Ok(locks)
}

impl DialStrategy for SlowDial {
    fn dial_type(&self) -> DialType {
        DialType::Slow
    }

    fn begin(&self, ctx: &mut DialContext<'_>, gate: GateId) -> Result<(), DialError> {
        let token = ctx.gate(gate)?.token().ok_or(StepError::NoAttempt(gate))?;
        ctx.schedule_step(gate, token, DialStep::RotateToSymbol { index: 0 }, Duration::ZERO);
        let give_up = ctx.profile(DialType::Slow).give_up_after;
        ctx.arm_give_up(gate, give_up)?;
        Ok(())
    }

    fn advance(
        &self,
        ctx: &mut DialContext<'_>,
        gate: GateId,
        step: DialStep,
    ) -> Result<(), StepError> {
        match step {
            DialStep::RotateToSymbol { index } => Self::rotate(ctx, gate, index),
            DialStep::RingArrived { index, reached } => ring_arrived(ctx, gate, index, reached),
            DialStep::EngageChevron { index } => Self::engage(ctx, gate, index),
            other => Err(StepError::UnexpectedStep {
                step: other,
                kind: DialType::Slow,
            }),
        }
    }
}
