//! Link registry and link establishment.
//!
//! Every link, pending or open, lives in one [`LinkRegistry`] entry keyed by
//! its `(origin, destination)` pair, and a gate appears in at most one entry.
//! Both endpoints are flipped to `Active` inside [`establish`] and back to
//! idle through [`teardown`]; neither gate writes the other's state anywhere
//! else.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use core::fmt;

use thiserror::Error;

use crate::clock::Instant;
use crate::dialing::context::{self, DialContext};
use crate::dialing::{DialType, GateTask, Lane, LinkTask, StepError, TaskCategory, inbound};
use crate::effects::{ObjectId, SoundCue};
use crate::gate::{DialAttempt, GateId, GateState};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct LinkId(pub u32);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LinkStatus {
    /// Reserved by an early notify; the destination is mirroring.
    Pending,
    Open,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LinkRecord {
    pub id: LinkId,
    pub origin: GateId,
    pub destination: GateId,
    pub kind: DialType,
    pub status: LinkStatus,
    pub reserved_at: Instant,
    pub opened_at: Option<Instant>,
    transited: BTreeSet<ObjectId>,
}

impl LinkRecord {
    #[must_use]
    pub fn involves(&self, gate: GateId) -> bool {
        self.origin == gate || self.destination == gate
    }

    /// The other endpoint of the link.
    #[must_use]
    pub fn partner_of(&self, gate: GateId) -> GateId {
        if self.origin == gate {
            self.destination
        } else {
            self.origin
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == LinkStatus::Open
    }

    #[must_use]
    pub fn has_transited(&self, object: ObjectId) -> bool {
        self.transited.contains(&object)
    }

    /// Marks `object` as carried; `false` when it already was.
    pub fn mark_transited(&mut self, object: ObjectId) -> bool {
        self.transited.insert(object)
    }

    #[must_use]
    pub fn transit_count(&self) -> usize {
        self.transited.len()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum LinkError {
    #[error("{0} is already part of a link")]
    Engaged(GateId),
    #[error("{0} is already active")]
    AlreadyActive(GateId),
    #[error("{0} has no open link")]
    NotActive(GateId),
    #[error("a gate cannot link to itself")]
    SelfLink,
}

/// Single owner of every link record.
#[derive(Clone, Debug, Default)]
pub struct LinkRegistry {
    records: Vec<LinkRecord>,
    next_id: u32,
}

impl LinkRegistry {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
            next_id: 0,
        }
    }

    /// Reserves a pending link ahead of the commit.
    pub fn reserve(
        &mut self,
        origin: GateId,
        destination: GateId,
        kind: DialType,
        now: Instant,
    ) -> Result<LinkId, LinkError> {
        self.ensure_free(origin, destination)?;
        Ok(self.insert(origin, destination, kind, LinkStatus::Pending, now))
    }

    /// Opens the link, promoting a matching reservation when one exists.
    pub fn open(
        &mut self,
        origin: GateId,
        destination: GateId,
        kind: DialType,
        now: Instant,
    ) -> Result<LinkId, LinkError> {
        if let Some(record) = self.records.iter_mut().find(|record| {
            record.origin == origin
                && record.destination == destination
                && record.status == LinkStatus::Pending
        }) {
            record.status = LinkStatus::Open;
            record.opened_at = Some(now);
            record.kind = kind;
            return Ok(record.id);
        }
        self.ensure_free(origin, destination)?;
        Ok(self.insert(origin, destination, kind, LinkStatus::Open, now))
    }

    /// Removes the record `gate` takes part in.
    pub fn release(&mut self, gate: GateId) -> Option<LinkRecord> {
        let position = self.records.iter().position(|record| record.involves(gate))?;
        Some(self.records.swap_remove(position))
    }

    #[must_use]
    pub fn link_for(&self, gate: GateId) -> Option<&LinkRecord> {
        self.records.iter().find(|record| record.involves(gate))
    }

    pub fn link_for_mut(&mut self, gate: GateId) -> Option<&mut LinkRecord> {
        self.records.iter_mut().find(|record| record.involves(gate))
    }

    #[must_use]
    pub fn get(&self, id: LinkId) -> Option<&LinkRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    /// Open-link partner of `gate`.
    #[must_use]
    pub fn partner(&self, gate: GateId) -> Option<GateId> {
        self.link_for(gate)
            .filter(|record| record.is_open())
            .map(|record| record.partner_of(gate))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, LinkRecord> {
        self.records.iter()
    }

    fn ensure_free(&self, origin: GateId, destination: GateId) -> Result<(), LinkError> {
        if origin == destination {
            return Err(LinkError::SelfLink);
        }
        for gate in [origin, destination] {
            if self.link_for(gate).is_some() {
                return Err(LinkError::Engaged(gate));
            }
        }
        Ok(())
    }

    fn insert(
        &mut self,
        origin: GateId,
        destination: GateId,
        kind: DialType,
        status: LinkStatus,
        now: Instant,
    ) -> LinkId {
        let id = LinkId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.records.push(LinkRecord {
            id,
            origin,
            destination,
            kind,
            status,
            reserved_at: now,
            opened_at: (status == LinkStatus::Open).then_some(now),
            transited: BTreeSet::new(),
        });
        id
    }
}

/// Commits a link between `origin` and `destination`.
///
/// This is the point of no return: every readiness check must already have
/// passed. A destination racing toward `origin` is superseded and becomes
/// the inbound side.
pub(crate) fn establish(
    ctx: &mut DialContext<'_>,
    origin: GateId,
    destination: GateId,
) -> Result<LinkId, StepError> {
    for gate in [origin, destination] {
        if ctx.gate(gate)?.state() == GateState::Active {
            return Err(LinkError::AlreadyActive(gate).into());
        }
    }

    let (kind, started_at, give_up) = {
        let attempt = ctx.attempt_mut(origin)?;
        (attempt.dial_type(), attempt.started_at, attempt.give_up.take())
    };
    if let Some(handle) = give_up {
        ctx.scheduler.cancel(handle);
    }

    let racing = ctx
        .gate(destination)?
        .attempt()
        .is_some_and(DialAttempt::is_outgoing);
    if racing {
        context::supersede(ctx, destination, origin)?;
    }

    let now = ctx.now;
    let id = ctx.links.open(origin, destination, kind, now)?;

    {
        let gate = ctx.gate_mut(origin)?;
        gate.state = GateState::Active;
        gate.linked = Some(destination);
        gate.chevron_count = gate.size().symbols();
        if let Some(attempt) = gate.attempt.as_mut() {
            attempt.is_locked = true;
            attempt.busy = false;
            attempt.awaiting_ring = None;
            attempt.pending = None;
            attempt.destination = Some(destination);
        }
    }

    let mirroring = ctx
        .gate(destination)?
        .attempt()
        .is_some_and(|attempt| attempt.is_inbound_from(origin));
    if !mirroring {
        let token = ctx.tokens.issue();
        ctx.gate_mut(destination)?.attempt = Some(DialAttempt::inbound(token, origin, kind, now));
        ctx.telemetry.record_inbound(destination, origin, now);
    }
    {
        let gate = ctx.gate_mut(destination)?;
        gate.state = GateState::Active;
        gate.linked = Some(origin);
        gate.chevron_count = gate.size().symbols();
    }

    ctx.effects
        .play_sound(origin, SoundCue::LinkOpen, core::time::Duration::ZERO);
    ctx.effects
        .play_sound(destination, SoundCue::LinkOpen, core::time::Duration::ZERO);
    ctx.telemetry
        .record_link_established(origin, destination, kind, Some(started_at), now);
    log_link_established(origin, destination, kind, id);

    let interval = ctx.profile(kind).inbound_interval;
    inbound::mirror_remaining(ctx, destination, now, interval)?;

    if let Some(max_link) = ctx.gate(origin)?.config().max_link {
        ctx.scheduler.schedule(
            now + max_link,
            TaskCategory::new(origin, Lane::Link),
            GateTask::Link(LinkTask::AutoClose { link: id }),
        );
    }

    Ok(id)
}

/// Closes the open link of `gate`, returning both endpoints to idle.
pub(crate) fn teardown(ctx: &mut DialContext<'_>, gate: GateId) -> Result<LinkId, LinkError> {
    let id = match ctx.links.link_for(gate) {
        Some(record) if record.is_open() => record.id,
        _ => return Err(LinkError::NotActive(gate)),
    };
    context::return_to_idle(ctx, gate);
    Ok(id)
}

/// Fires the auto-close deadline of `link` if it is still the gate's link.
pub(crate) fn auto_close(
    ctx: &mut DialContext<'_>,
    gate: GateId,
    link: LinkId,
) -> Result<(), StepError> {
    let current = ctx
        .links
        .link_for(gate)
        .is_some_and(|record| record.id == link && record.is_open());
    if current {
        log_auto_close(gate, link);
        teardown(ctx, gate)?;
    }
    Ok(())
}

fn log_link_established(origin: GateId, destination: GateId, kind: DialType, link: LinkId) {
    tracing::info!(%origin, %destination, %kind, %link, "link established");
}

fn log_auto_close(gate: GateId, link: LinkId) {
    tracing::info!(%gate, %link, "link reached its maximum duration");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservations_promote_to_open_links() {
        let mut registry = LinkRegistry::new();
        let pending = registry
            .reserve(GateId(0), GateId(1), DialType::Fast, Instant::from_secs(1))
            .expect("reservation should succeed");
        assert_eq!(registry.partner(GateId(0)), None);

        let open = registry
            .open(GateId(0), GateId(1), DialType::Fast, Instant::from_secs(7))
            .expect("open should succeed");
        assert_eq!(pending, open);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.partner(GateId(1)), Some(GateId(0)));
        let record = registry.get(open).expect("record should exist");
        assert_eq!(record.opened_at, Some(Instant::from_secs(7)));
        assert_eq!(record.reserved_at, Instant::from_secs(1));
    }

    #[test]
    fn a_gate_takes_part_in_one_link_at_a_time() {
        let mut registry = LinkRegistry::new();
        registry
            .open(GateId(0), GateId(1), DialType::Slow, Instant::ZERO)
            .expect("open should succeed");
        assert_eq!(
            registry.open(GateId(2), GateId(1), DialType::Slow, Instant::ZERO),
            Err(LinkError::Engaged(GateId(1)))
        );
        assert_eq!(
            registry.reserve(GateId(3), GateId(3), DialType::Fast, Instant::ZERO),
            Err(LinkError::SelfLink)
        );
    }

    #[test]
    fn release_frees_both_endpoints() {
        let mut registry = LinkRegistry::new();
        registry
            .open(GateId(4), GateId(5), DialType::Instant, Instant::ZERO)
            .expect("open should succeed");
        let record = registry.release(GateId(5)).expect("record should exist");
        assert_eq!(record.partner_of(GateId(5)), GateId(4));
        assert!(registry.is_empty());
        assert!(registry.link_for(GateId(4)).is_none());
    }

    #[test]
    fn objects_transit_once_per_link() {
        let mut registry = LinkRegistry::new();
        registry
            .open(GateId(0), GateId(1), DialType::Fast, Instant::ZERO)
            .expect("open should succeed");
        let record = registry.link_for_mut(GateId(0)).expect("record should exist");
        assert!(record.mark_transited(ObjectId(7)));
        assert!(!record.mark_transited(ObjectId(7)));
        assert!(record.has_transited(ObjectId(7)));
        assert_eq!(record.transit_count(), 1);
    }
}
