//! Passive mirror run on the receiving gate.
//!
//! The inbound side makes no decision of its own: it follows the pacing of
//! the dialing gate and ends only when the origin commits, fails or the link
//! closes.

use core::ops::Range;
use core::time::Duration;

use crate::chevron::ChevronVariant;
use crate::clock::Instant;
use crate::gate::{DialAttempt, GateId, GateState};

use super::{DialContext, DialToken, DialType, GateTask, InboundStep, Lane, StepError, TaskCategory};

/// Puts an idle `gate` into the dialing state as a mirror of `origin`.
pub(crate) fn begin_mirror(
    ctx: &mut DialContext<'_>,
    gate: GateId,
    origin: GateId,
    kind: DialType,
) -> Result<DialToken, StepError> {
    let token = ctx.tokens.issue();
    let now = ctx.now;
    let entry = ctx.gate_mut(gate)?;
    entry.state = GateState::Dialing;
    entry.chevron_count = 0;
    entry.attempt = Some(DialAttempt::inbound(token, origin, kind, now));
    ctx.telemetry.record_inbound(gate, origin, now);
    tracing::info!(%gate, %origin, %kind, "inbound dial started");
    Ok(token)
}

/// Queues mirrored chevrons `indices`, the first at `first_at`.
pub(crate) fn schedule_chevrons(
    ctx: &mut DialContext<'_>,
    gate: GateId,
    indices: Range<usize>,
    first_at: Instant,
    interval: Duration,
) -> Result<usize, StepError> {
    let token = ctx.gate(gate)?.token().ok_or(StepError::NoAttempt(gate))?;
    let mut at = first_at;
    let mut queued = 0;
    for index in indices {
        ctx.scheduler.schedule(
            at,
            TaskCategory::new(gate, Lane::Inbound),
            GateTask::Inbound {
                token,
                step: InboundStep::Chevron { index },
            },
        );
        at = at + interval;
        queued += 1;
    }
    Ok(queued)
}

/// Replaces any queued mirror chevrons with the ones still dark.
pub(crate) fn mirror_remaining(
    ctx: &mut DialContext<'_>,
    gate: GateId,
    first_at: Instant,
    interval: Duration,
) -> Result<(), StepError> {
    ctx.scheduler
        .cancel_category(TaskCategory::new(gate, Lane::Inbound));
    let chevrons = ctx.gate(gate)?.chevrons();
    if let Some(start) = chevrons.first_unlit() {
        let end = chevrons.len();
        schedule_chevrons(ctx, gate, start..end, first_at, interval)?;
    }
    Ok(())
}

pub(crate) fn advance(
    ctx: &mut DialContext<'_>,
    gate: GateId,
    token: DialToken,
    step: InboundStep,
) -> Result<(), StepError> {
    let entry = ctx.gate(gate)?;
    if entry.token() != Some(token) {
        tracing::trace!(%gate, %token, "dropping stale inbound chevron");
        return Ok(());
    }

    let InboundStep::Chevron { index } = step;
    let variant = if index + 1 == entry.chevrons().len() {
        ChevronVariant::Lock
    } else {
        ChevronVariant::Inbound
    };
    ctx.light(gate, index, variant)?;

    let entry = ctx.gate_mut(gate)?;
    if entry.state == GateState::Dialing {
        entry.chevron_count = entry.chevron_count.max(index + 1);
    }
    Ok(())
}
