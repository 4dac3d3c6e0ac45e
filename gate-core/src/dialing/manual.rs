//! Dial-home-device dialing: one symbol per external call.
//!
//! Symbols arrive through [`GateNetwork::encode_step`] and
//! [`GateNetwork::lock_step`](crate::network::GateNetwork::lock_step). Each
//! runs the same rotate, align and engage sequence as a slow dial; the
//! locking symbol commits without waiting for another call.
//!
//! [`GateNetwork::encode_step`]: crate::network::GateNetwork::encode_step

use crate::gate::GateId;

use super::context;
use super::slow::{engage_chevron, ring_arrived};
use super::{DialContext, DialError, DialStep, DialStrategy, DialType, StepError};

#[derive(Copy, Clone, Debug, Default)]
pub struct ManualDial;

impl DialStrategy for ManualDial {
    fn dial_type(&self) -> DialType {
        DialType::Manual
    }

    fn begin(&self, ctx: &mut DialContext<'_>, gate: GateId) -> Result<(), DialError> {
        let give_up = ctx.profile(DialType::Manual).give_up_after;
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
            DialStep::RingArrived { index, reached } => ring_arrived(ctx, gate, index, reached),
            DialStep::EngageChevron { index } => {
                if engage_chevron(ctx, gate, index)? {
                    return context::commit(ctx, gate, self.requires_matching_glyphs());
                }
                ctx.gate_mut(gate)?.ring.flip_direction()?;
                let give_up = ctx.profile(DialType::Manual).give_up_after;
                ctx.arm_give_up(gate, give_up)
            }
            other => Err(StepError::UnexpectedStep {
                step: other,
                kind: DialType::Manual,
            }),
        }
    }
}
