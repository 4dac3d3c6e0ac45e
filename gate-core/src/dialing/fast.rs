//! Evenly paced dial of a fully known address.
//!
//! Every step is queued up front: an early notify that starts the
//! destination's mirror, one encode per intermediate symbol, the lock that
//! opens the busy window and the commit `n` intervals after the start.

use core::time::Duration;

use crate::address::Address;
use crate::chevron::ChevronVariant;
use crate::effects::SoundCue;
use crate::gate::GateId;
use crate::telemetry::FailureReason;

use super::context::{self, Readiness, assess_destination};
use super::{
    DialContext, DialError, DialStep, DialStrategy, DialType, NotReadyReason, StepError, inbound,
};

#[derive(Copy, Clone, Debug, Default)]
pub struct FastDial;

impl FastDial {
    fn target(ctx: &DialContext<'_>, gate: GateId) -> Result<Address, StepError> {
        ctx.gate(gate)?
            .attempt()
            .and_then(|attempt| attempt.target.clone())
            .ok_or(StepError::NoAttempt(gate))
    }

    fn notify(ctx: &mut DialContext<'_>, gate: GateId) -> Result<(), StepError> {
        let target = Self::target(ctx, gate)?;
        let profile = ctx.profile(DialType::Fast);
        let started_at = ctx
            .gate(gate)?
            .attempt()
            .ok_or(StepError::NoAttempt(gate))?
            .started_at;
        let symbols = target.len();

        match assess_destination(&*ctx.gates, gate, &target, true) {
            Readiness::Ready(destination) => {
                ctx.links
                    .reserve(gate, destination, DialType::Fast, ctx.now)?;
                inbound::begin_mirror(ctx, destination, gate, DialType::Fast)?;
                inbound::schedule_chevrons(
                    ctx,
                    destination,
                    0..symbols.saturating_sub(1),
                    started_at + profile.nth_symbol(1),
                    profile.symbol_interval,
                )?;
            }
            readiness => {
                tracing::debug!(%gate, ?readiness, "destination not notified; rechecked at commit");
            }
        }

        // Cosmetic spin toward the final symbol while the chevrons encode.
        if let Some(last) = target.get(symbols.saturating_sub(1)) {
            let now = ctx.now;
            if ctx.gate_mut(gate)?.ring.rotate_to_symbol(last, 0.0, now).is_ok() {
                ctx.effects.play_sound(gate, SoundCue::RingSpin, Duration::ZERO);
            }
        }
        Ok(())
    }

    fn encode(
        ctx: &mut DialContext<'_>,
        gate: GateId,
        index: usize,
        locks: bool,
    ) -> Result<(), StepError> {
        let now = ctx.now;
        let symbol = {
            let attempt = ctx.attempt_mut(gate)?;
            let symbol = attempt
                .symbol_at(index)
                .ok_or(StepError::MissingSymbol { index })?;
            attempt.dialed.push(symbol)?;
            if locks {
                attempt.busy = true;
            }
            symbol
        };
        let variant = if locks {
            ChevronVariant::Lock
        } else {
            ChevronVariant::Encode
        };
        ctx.light(gate, index, variant)?;
        ctx.gate_mut(gate)?.chevron_count = index + 1;
        ctx.telemetry.record_symbol(gate, index, symbol, locks, now);
        tracing::debug!(%gate, index, %symbol, locks, "fast symbol encoded");
        Ok(())
    }
}

impl DialStrategy for FastDial {
    fn dial_type(&self) -> DialType {
        DialType::Fast
    }

    fn begin(&self, ctx: &mut DialContext<'_>, gate: GateId) -> Result<(), DialError> {
        let target = Self::target(ctx, gate)?;
        if ctx.find_destination(&target) == Some(gate) {
            context::cancel_attempt(
                ctx,
                gate,
                FailureReason::NotReady(NotReadyReason::SelfTarget),
                true,
            );
            return Err(DialError::SelfTarget);
        }

        let profile = ctx.profile(DialType::Fast);
        let token = ctx.gate(gate)?.token().ok_or(StepError::NoAttempt(gate))?;
        let symbols = target.len();

        ctx.schedule_step(gate, token, DialStep::FastNotify, Duration::ZERO);
        for index in 0..symbols.saturating_sub(1) {
            ctx.schedule_step(
                gate,
                token,
                DialStep::FastEncode { index },
                profile.nth_symbol(index + 1),
            );
        }
        // The lock never overtakes the last encode, whatever the lead.
        let commit_at = profile.nth_symbol(symbols);
        let lock_at = commit_at
            .saturating_sub(profile.lock_lead)
            .max(profile.nth_symbol(symbols.saturating_sub(1)));
        ctx.schedule_step(gate, token, DialStep::FastLock, lock_at);
        ctx.schedule_step(gate, token, DialStep::FastCommit, commit_at);
        Ok(())
    }

    fn advance(
        &self,
        ctx: &mut DialContext<'_>,
        gate: GateId,
        step: DialStep,
    ) -> Result<(), StepError> {
        match step {
            DialStep::FastNotify => Self::notify(ctx, gate),
            DialStep::FastEncode { index } => Self::encode(ctx, gate, index, false),
            DialStep::FastLock => {
                let last = ctx.gate(gate)?.size().symbols() - 1;
                Self::encode(ctx, gate, last, true)
            }
            DialStep::FastCommit => context::commit(ctx, gate, self.requires_matching_glyphs()),
            other => Err(StepError::UnexpectedStep {
                step: other,
                kind: DialType::Fast,
            }),
        }
    }
}
