//! Telemetry event catalog and recorder for dialing and link transitions.
//!
//! Every protocol transition lands in a fixed-size ring buffer alongside a
//! typed payload. Event kinds encode to compact numeric codes so hosts can
//! ship them over narrow diagnostics channels and decode them again; unknown
//! codes decode to [`TelemetryEventKind::Custom`].

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::address::Symbol;
use crate::dialing::{DialType, NotReadyReason};
use crate::effects::ObjectId;
use crate::gate::GateId;

/// Identifier used when tracking emitted telemetry events.
pub type EventId = u32;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    DialStarted(DialType),
    LinkEstablished(DialType),
    SymbolEncoded,
    ChevronLocked,
    InboundStarted,
    DialFailed,
    DialCancelled,
    DialSuperseded,
    StopDeferred,
    LinkClosed,
    ObjectTransited,
    StepFault,
    Custom(u16),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::DialStarted(kind) => write!(f, "dial-started {kind}"),
            TelemetryEventKind::LinkEstablished(kind) => write!(f, "link-established {kind}"),
            TelemetryEventKind::SymbolEncoded => f.write_str("symbol-encoded"),
            TelemetryEventKind::ChevronLocked => f.write_str("chevron-locked"),
            TelemetryEventKind::InboundStarted => f.write_str("inbound-started"),
            TelemetryEventKind::DialFailed => f.write_str("dial-failed"),
            TelemetryEventKind::DialCancelled => f.write_str("dial-cancelled"),
            TelemetryEventKind::DialSuperseded => f.write_str("dial-superseded"),
            TelemetryEventKind::StopDeferred => f.write_str("stop-deferred"),
            TelemetryEventKind::LinkClosed => f.write_str("link-closed"),
            TelemetryEventKind::ObjectTransited => f.write_str("object-transited"),
            TelemetryEventKind::StepFault => f.write_str("step-fault"),
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl TelemetryEventKind {
    const DIAL_STARTED_BASE: u16 = 0x0000;
    const LINK_ESTABLISHED_BASE: u16 = 0x0004;
    const SYMBOL_ENCODED_CODE: u16 = 0x0010;
    const CHEVRON_LOCKED_CODE: u16 = 0x0011;
    const INBOUND_STARTED_CODE: u16 = 0x0012;
    const DIAL_FAILED_CODE: u16 = 0x0018;
    const DIAL_CANCELLED_CODE: u16 = 0x0019;
    const DIAL_SUPERSEDED_CODE: u16 = 0x001A;
    const STOP_DEFERRED_CODE: u16 = 0x001B;
    const LINK_CLOSED_CODE: u16 = 0x0020;
    const OBJECT_TRANSITED_CODE: u16 = 0x0021;
    const STEP_FAULT_CODE: u16 = 0x0030;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::DialStarted(kind) => Self::DIAL_STARTED_BASE + dial_index(kind),
            TelemetryEventKind::LinkEstablished(kind) => {
                Self::LINK_ESTABLISHED_BASE + dial_index(kind)
            }
            TelemetryEventKind::SymbolEncoded => Self::SYMBOL_ENCODED_CODE,
            TelemetryEventKind::ChevronLocked => Self::CHEVRON_LOCKED_CODE,
            TelemetryEventKind::InboundStarted => Self::INBOUND_STARTED_CODE,
            TelemetryEventKind::DialFailed => Self::DIAL_FAILED_CODE,
            TelemetryEventKind::DialCancelled => Self::DIAL_CANCELLED_CODE,
            TelemetryEventKind::DialSuperseded => Self::DIAL_SUPERSEDED_CODE,
            TelemetryEventKind::StopDeferred => Self::STOP_DEFERRED_CODE,
            TelemetryEventKind::LinkClosed => Self::LINK_CLOSED_CODE,
            TelemetryEventKind::ObjectTransited => Self::OBJECT_TRANSITED_CODE,
            TelemetryEventKind::StepFault => Self::STEP_FAULT_CODE,
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`TelemetryEventKind::Custom`].
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        match code {
            Self::SYMBOL_ENCODED_CODE => TelemetryEventKind::SymbolEncoded,
            Self::CHEVRON_LOCKED_CODE => TelemetryEventKind::ChevronLocked,
            Self::INBOUND_STARTED_CODE => TelemetryEventKind::InboundStarted,
            Self::DIAL_FAILED_CODE => TelemetryEventKind::DialFailed,
            Self::DIAL_CANCELLED_CODE => TelemetryEventKind::DialCancelled,
            Self::DIAL_SUPERSEDED_CODE => TelemetryEventKind::DialSuperseded,
            Self::STOP_DEFERRED_CODE => TelemetryEventKind::StopDeferred,
            Self::LINK_CLOSED_CODE => TelemetryEventKind::LinkClosed,
            Self::OBJECT_TRANSITED_CODE => TelemetryEventKind::ObjectTransited,
            Self::STEP_FAULT_CODE => TelemetryEventKind::StepFault,
            value if (Self::DIAL_STARTED_BASE..Self::LINK_ESTABLISHED_BASE).contains(&value) => {
                dial_from_index(value - Self::DIAL_STARTED_BASE)
                    .map_or(TelemetryEventKind::Custom(value), TelemetryEventKind::DialStarted)
            }
            value
                if (Self::LINK_ESTABLISHED_BASE..Self::LINK_ESTABLISHED_BASE + 4)
                    .contains(&value) =>
            {
                dial_from_index(value - Self::LINK_ESTABLISHED_BASE).map_or(
                    TelemetryEventKind::Custom(value),
                    TelemetryEventKind::LinkEstablished,
                )
            }
            other => TelemetryEventKind::Custom(other),
        }
    }
}

/// Why an attempt ended without a link.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FailureReason {
    /// Readiness check rejected the destination.
    NotReady(NotReadyReason),
    /// Stop request or explicit reset.
    Cancelled,
    /// Give-up deadline passed.
    GaveUp,
    /// A scheduled step returned an error.
    Fault,
    /// Implementation-specific extension.
    Custom(u8),
}

impl FailureReason {
    const NO_MATCH_CODE: u8 = 0x00;
    const SELF_TARGET_CODE: u8 = 0x01;
    const DESTINATION_ACTIVE_CODE: u8 = 0x02;
    const DESTINATION_BUSY_CODE: u8 = 0x03;
    const GLYPH_MISMATCH_CODE: u8 = 0x04;
    const CANCELLED_CODE: u8 = 0x10;
    const GAVE_UP_CODE: u8 = 0x11;
    const FAULT_CODE: u8 = 0x12;

    #[must_use]
    pub const fn to_raw(self) -> u8 {
        match self {
            FailureReason::NotReady(NotReadyReason::NoMatch) => Self::NO_MATCH_CODE,
            FailureReason::NotReady(NotReadyReason::SelfTarget) => Self::SELF_TARGET_CODE,
            FailureReason::NotReady(NotReadyReason::DestinationActive) => {
                Self::DESTINATION_ACTIVE_CODE
            }
            FailureReason::NotReady(NotReadyReason::DestinationBusy) => Self::DESTINATION_BUSY_CODE,
            FailureReason::NotReady(NotReadyReason::GlyphMismatch) => Self::GLYPH_MISMATCH_CODE,
            FailureReason::Cancelled => Self::CANCELLED_CODE,
            FailureReason::GaveUp => Self::GAVE_UP_CODE,
            FailureReason::Fault => Self::FAULT_CODE,
            FailureReason::Custom(code) => code,
        }
    }

    #[must_use]
    pub const fn from_raw(code: u8) -> Self {
        match code {
            Self::NO_MATCH_CODE => FailureReason::NotReady(NotReadyReason::NoMatch),
            Self::SELF_TARGET_CODE => FailureReason::NotReady(NotReadyReason::SelfTarget),
            Self::DESTINATION_ACTIVE_CODE => {
                FailureReason::NotReady(NotReadyReason::DestinationActive)
            }
            Self::DESTINATION_BUSY_CODE => FailureReason::NotReady(NotReadyReason::DestinationBusy),
            Self::GLYPH_MISMATCH_CODE => FailureReason::NotReady(NotReadyReason::GlyphMismatch),
            Self::CANCELLED_CODE => FailureReason::Cancelled,
            Self::GAVE_UP_CODE => FailureReason::GaveUp,
            Self::FAULT_CODE => FailureReason::Fault,
            other => FailureReason::Custom(other),
        }
    }

    #[must_use]
    pub const fn is_custom(self) -> bool {
        matches!(self, FailureReason::Custom(_))
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NotReady(reason) => write!(f, "{reason}"),
            FailureReason::Cancelled => f.write_str("cancelled"),
            FailureReason::GaveUp => f.write_str("gave up"),
            FailureReason::Fault => f.write_str("step fault"),
            FailureReason::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    None,
    Dial(DialTelemetry),
    Symbol(SymbolTelemetry),
    Link(LinkTelemetry),
    Failure(FailureTelemetry),
    Transit(TransitTelemetry),
}

impl TelemetryPayload {
    #[must_use]
    pub const fn none() -> Self {
        TelemetryPayload::None
    }

    /// Gate the record is primarily about.
    #[must_use]
    pub const fn gate(&self) -> Option<GateId> {
        match self {
            TelemetryPayload::None => None,
            TelemetryPayload::Dial(details) => Some(details.gate),
            TelemetryPayload::Symbol(details) => Some(details.gate),
            TelemetryPayload::Link(details) => Some(details.origin),
            TelemetryPayload::Failure(details) => Some(details.gate),
            TelemetryPayload::Transit(details) => Some(details.origin),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DialTelemetry {
    pub gate: GateId,
    /// Peer gate, for inbound mirrors and supersedes.
    pub peer: Option<GateId>,
}

/// Committed symbol payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SymbolTelemetry {
    pub gate: GateId,
    pub index: u8,
    pub symbol: Symbol,
    pub elapsed_since_previous: Option<Duration>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LinkTelemetry {
    pub origin: GateId,
    pub destination: GateId,
    /// Dial time for establishment, open time for closure.
    pub duration: Option<Duration>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FailureTelemetry {
    pub gate: GateId,
    pub reason: FailureReason,
    pub chevrons: u8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TransitTelemetry {
    pub origin: GateId,
    pub destination: GateId,
    pub object: ObjectId,
}

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 128;

/// Trait implemented by monotonic instant wrappers used for telemetry tracking.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    last_symbol_at: Option<(GateId, TInstant)>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            last_symbol_at: None,
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Id the next record will receive.
    pub const fn next_id(&self) -> EventId {
        self.next_event_id
    }

    pub fn record_dial_started(
        &mut self,
        gate: GateId,
        kind: DialType,
        timestamp: TInstant,
    ) -> EventId {
        self.last_symbol_at = None;
        self.record(
            TelemetryEventKind::DialStarted(kind),
            TelemetryPayload::Dial(DialTelemetry { gate, peer: None }),
            timestamp,
        )
    }

    /// Records a committed symbol and the time since the previous one on the same gate.
    pub fn record_symbol(
        &mut self,
        gate: GateId,
        index: usize,
        symbol: Symbol,
        locked: bool,
        timestamp: TInstant,
    ) -> EventId {
        let elapsed = match self.last_symbol_at {
            Some((previous_gate, previous)) if previous_gate == gate => {
                Some(timestamp.saturating_duration_since(previous))
            }
            _ => None,
        };
        self.last_symbol_at = Some((gate, timestamp));

        let payload = TelemetryPayload::Symbol(SymbolTelemetry {
            gate,
            index: truncate_count(index),
            symbol,
            elapsed_since_previous: elapsed,
        });
        let event = if locked {
            TelemetryEventKind::ChevronLocked
        } else {
            TelemetryEventKind::SymbolEncoded
        };
        self.record(event, payload, timestamp)
    }

    /// Records a gate starting to mirror a dial from `origin`.
    pub fn record_inbound(&mut self, gate: GateId, origin: GateId, timestamp: TInstant) -> EventId {
        self.record(
            TelemetryEventKind::InboundStarted,
            TelemetryPayload::Dial(DialTelemetry {
                gate,
                peer: Some(origin),
            }),
            timestamp,
        )
    }

    pub fn record_superseded(&mut self, gate: GateId, winner: GateId, timestamp: TInstant) -> EventId {
        self.record(
            TelemetryEventKind::DialSuperseded,
            TelemetryPayload::Dial(DialTelemetry {
                gate,
                peer: Some(winner),
            }),
            timestamp,
        )
    }

    pub fn record_stop_deferred(&mut self, gate: GateId, timestamp: TInstant) -> EventId {
        self.record(
            TelemetryEventKind::StopDeferred,
            TelemetryPayload::Dial(DialTelemetry { gate, peer: None }),
            timestamp,
        )
    }

    /// Records the end of an attempt that produced no link.
    pub fn record_failure(
        &mut self,
        gate: GateId,
        reason: FailureReason,
        chevrons: usize,
        timestamp: TInstant,
    ) -> EventId {
        let event = match reason {
            FailureReason::Cancelled => TelemetryEventKind::DialCancelled,
            FailureReason::Fault => TelemetryEventKind::StepFault,
            FailureReason::NotReady(_) | FailureReason::GaveUp | FailureReason::Custom(_) => {
                TelemetryEventKind::DialFailed
            }
        };
        let payload = TelemetryPayload::Failure(FailureTelemetry {
            gate,
            reason,
            chevrons: truncate_count(chevrons),
        });
        self.record(event, payload, timestamp)
    }

    pub fn record_link_established(
        &mut self,
        origin: GateId,
        destination: GateId,
        kind: DialType,
        started_at: Option<TInstant>,
        timestamp: TInstant,
    ) -> EventId {
        let duration = started_at.map(|start| timestamp.saturating_duration_since(start));
        self.record(
            TelemetryEventKind::LinkEstablished(kind),
            TelemetryPayload::Link(LinkTelemetry {
                origin,
                destination,
                duration,
            }),
            timestamp,
        )
    }

    pub fn record_link_closed(
        &mut self,
        origin: GateId,
        destination: GateId,
        opened_at: Option<TInstant>,
        timestamp: TInstant,
    ) -> EventId {
        let duration = opened_at.map(|open| timestamp.saturating_duration_since(open));
        self.record(
            TelemetryEventKind::LinkClosed,
            TelemetryPayload::Link(LinkTelemetry {
                origin,
                destination,
                duration,
            }),
            timestamp,
        )
    }

    pub fn record_transit(
        &mut self,
        origin: GateId,
        destination: GateId,
        object: ObjectId,
        timestamp: TInstant,
    ) -> EventId {
        self.record(
            TelemetryEventKind::ObjectTransited,
            TelemetryPayload::Transit(TransitTelemetry {
                origin,
                destination,
                object,
            }),
            timestamp,
        )
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

fn truncate_count(count: usize) -> u8 {
    u8::try_from(count).unwrap_or(u8::MAX)
}

const fn dial_index(kind: DialType) -> u16 {
    match kind {
        DialType::Fast => 0,
        DialType::Slow => 1,
        DialType::Instant => 2,
        DialType::Manual => 3,
    }
}

fn dial_from_index(index: u16) -> Option<DialType> {
    match index {
        0 => Some(DialType::Fast),
        1 => Some(DialType::Slow),
        2 => Some(DialType::Instant),
        3 => Some(DialType::Manual),
        _ => None,
    }
}
