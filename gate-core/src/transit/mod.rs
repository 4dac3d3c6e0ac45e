//! Object traversal over an open link.
//!
//! Objects enter at the origin side only. Authority is taken by the
//! destination's host for the hand-off and then returned to the object's
//! previous owner, or dropped when it had none. Each link-use carries a given
//! object at most once.

use core::time::Duration;

use thiserror::Error;

use crate::dialing::DialContext;
use crate::effects::{ObjectId, OwnerId, SoundCue};
use crate::gate::{GateId, GateState};
use crate::link::LinkId;

/// Outcome of a completed traversal.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TransitReceipt {
    pub link: LinkId,
    pub origin: GateId,
    pub destination: GateId,
    pub object: ObjectId,
    /// Owner authority was handed back to, if any.
    pub restored_to: Option<OwnerId>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum TransitError {
    #[error("unknown gate {0}")]
    UnknownGate(GateId),
    #[error("{0} has no open link")]
    NotActive(GateId),
    /// Objects only enter at the dialing side.
    #[error("{gate} is the receiving end of a link from {origin}")]
    WrongDirection { gate: GateId, origin: GateId },
    #[error("{object} already passed through {link}")]
    AlreadyTransited { object: ObjectId, link: LinkId },
}

/// Moves `object` from `gate` through its open link.
pub(crate) fn send(
    ctx: &mut DialContext<'_>,
    gate: GateId,
    object: ObjectId,
    prior_owner: Option<OwnerId>,
) -> Result<TransitReceipt, TransitError> {
    let state = ctx
        .gate(gate)
        .map_err(|_| TransitError::UnknownGate(gate))?
        .state();
    if state != GateState::Active {
        return Err(TransitError::NotActive(gate));
    }

    let record = ctx
        .links
        .link_for_mut(gate)
        .filter(|record| record.is_open())
        .ok_or(TransitError::NotActive(gate))?;
    if record.origin != gate {
        return Err(TransitError::WrongDirection {
            gate,
            origin: record.origin,
        });
    }
    if !record.mark_transited(object) {
        return Err(TransitError::AlreadyTransited {
            object,
            link: record.id,
        });
    }
    let (link, destination) = (record.id, record.destination);

    ctx.effects
        .transfer_ownership(object, OwnerId::Gate(destination));
    match prior_owner {
        Some(owner) => ctx.effects.transfer_ownership(object, owner),
        None => ctx.effects.drop_ownership(object),
    }
    ctx.effects.play_sound(gate, SoundCue::Transit, Duration::ZERO);
    ctx.effects
        .play_sound(destination, SoundCue::Transit, Duration::ZERO);
    ctx.telemetry
        .record_transit(gate, destination, object, ctx.now);
    log_transit(gate, destination, object);

    Ok(TransitReceipt {
        link,
        origin: gate,
        destination,
        object,
        restored_to: prior_owner,
    })
}

fn log_transit(origin: GateId, destination: GateId, object: ObjectId) {
    tracing::debug!(%origin, %destination, %object, "object transited");
}
