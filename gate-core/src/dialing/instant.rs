//! Dial decided synchronously at start; the chevrons that follow are playback.

use crate::chevron::ChevronVariant;
use crate::gate::GateId;
use crate::link;
use crate::telemetry::FailureReason;

use super::context::{self, Readiness, assess_destination};
use super::{
    DialContext, DialError, DialStep, DialStrategy, DialType, GateTask, Lane, NotReadyReason,
    StepError,
};

#[derive(Copy, Clone, Debug, Default)]
pub struct InstantDial;

impl DialStrategy for InstantDial {
    fn dial_type(&self) -> DialType {
        DialType::Instant
    }

    fn requires_matching_glyphs(&self) -> bool {
        false
    }

    fn begin(&self, ctx: &mut DialContext<'_>, gate: GateId) -> Result<(), DialError> {
        let (token, target) = {
            let attempt = ctx.attempt_mut(gate)?;
            let target = attempt.target.clone().ok_or(StepError::NoAttempt(gate))?;
            attempt.busy = true;
            (attempt.token, target)
        };

        let readiness =
            assess_destination(&*ctx.gates, gate, &target, self.requires_matching_glyphs());
        let destination = match readiness {
            Readiness::Ready(destination)
            | Readiness::Race(destination)
            | Readiness::Mirroring(destination) => destination,
            Readiness::NotReady(reason) => {
                context::cancel_attempt(ctx, gate, FailureReason::NotReady(reason), true);
                return Err(if reason == NotReadyReason::SelfTarget {
                    DialError::SelfTarget
                } else {
                    DialError::DestinationUnavailable(reason)
                });
            }
        };

        ctx.attempt_mut(gate)?.dialed = target.clone();
        link::establish(ctx, gate, destination)?;
        ctx.attempt_mut(gate)?.busy = false;

        let interval = ctx.profile(DialType::Instant).symbol_interval;
        let mut at = ctx.now;
        for index in 0..target.len() {
            at = at + interval;
            ctx.schedule_at(
                gate,
                Lane::Presentation,
                at,
                GateTask::Dial {
                    token,
                    step: DialStep::InstantChevron { index },
                },
            );
        }
        Ok(())
    }

    fn advance(
        &self,
        ctx: &mut DialContext<'_>,
        gate: GateId,
        step: DialStep,
    ) -> Result<(), StepError> {
        let DialStep::InstantChevron { index } = step else {
            return Err(StepError::UnexpectedStep {
                step,
                kind: DialType::Instant,
            });
        };
        let variant = if index + 1 == ctx.gate(gate)?.chevrons().len() {
            ChevronVariant::Lock
        } else {
            ChevronVariant::Encode
        };
        ctx.light(gate, index, variant)?;
        Ok(())
    }
}
