//! Gate endpoints and the per-attempt dial state they carry.

use alloc::string::String;
use core::{fmt, time::Duration};

use crate::address::{Address, GateSize, Symbol};
use crate::chevron::ChevronBank;
use crate::clock::Instant;
use crate::dialing::{DialToken, DialType};
use crate::ring::{DEFAULT_RING_PROFILE, RingController, RingProfile};
use crate::scheduler::TaskHandle;

/// Longest a link stays open before it closes itself.
pub const DEFAULT_MAX_LINK: Duration = Duration::from_secs(38 * 60);

static EMPTY_ADDRESS: Address = Address::empty();

/// Index of a gate within its network.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct GateId(pub u16);

impl GateId {
    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gate#{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GateState {
    Idle,
    Dialing,
    Active,
}

impl GateState {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            GateState::Idle => "idle",
            GateState::Dialing => "dialing",
            GateState::Active => "active",
        }
    }
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Static description of a gate.
#[derive(Clone, Debug, PartialEq)]
pub struct GateConfig {
    pub name: String,
    /// Address other gates dial to reach this one.
    pub address: Address,
    pub size: GateSize,
    pub ring: RingProfile,
    /// Auto-close deadline for links this gate originates.
    pub max_link: Option<Duration>,
}

impl GateConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, address: Address, size: GateSize) -> Self {
        Self {
            name: name.into(),
            address,
            size,
            ring: DEFAULT_RING_PROFILE,
            max_link: Some(DEFAULT_MAX_LINK),
        }
    }

    #[must_use]
    pub fn with_ring(mut self, ring: RingProfile) -> Self {
        self.ring = ring;
        self
    }

    #[must_use]
    pub fn with_max_link(mut self, max_link: Option<Duration>) -> Self {
        self.max_link = max_link;
        self
    }
}

/// Which side of a dial this gate is on.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DialRole {
    /// This gate chose the destination.
    Outgoing(DialType),
    /// This gate mirrors a dial started by `from`.
    Inbound { from: GateId, kind: DialType },
}

/// Manual symbol whose rotation or engage is still in flight.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PendingSymbol {
    pub index: usize,
    pub symbol: Symbol,
    /// Final symbol of the address.
    pub locks: bool,
}

/// Transient state of one dial attempt.
///
/// Exists while the gate is dialing or linked and is dropped on every return
/// to idle, so nothing leaks into the next attempt.
#[derive(Clone, Debug)]
pub struct DialAttempt {
    pub token: DialToken,
    pub role: DialRole,
    /// Full address when known up front.
    pub target: Option<Address>,
    /// Symbols committed so far.
    pub dialed: Address,
    pub destination: Option<GateId>,
    pub started_at: Instant,
    pub stop_requested: bool,
    /// Stop requested inside the busy window, applied once it closes.
    pub deferred_stop: bool,
    pub busy: bool,
    pub is_locked: bool,
    pub is_locked_invalid: bool,
    /// Symbol index the ring is travelling to.
    pub awaiting_ring: Option<usize>,
    pub pending: Option<PendingSymbol>,
    pub give_up: Option<TaskHandle>,
}

impl DialAttempt {
    #[must_use]
    pub fn outgoing(token: DialToken, kind: DialType, target: Option<Address>, now: Instant) -> Self {
        Self::with_role(token, DialRole::Outgoing(kind), target, now)
    }

    #[must_use]
    pub fn inbound(token: DialToken, from: GateId, kind: DialType, now: Instant) -> Self {
        Self::with_role(token, DialRole::Inbound { from, kind }, None, now)
    }

    fn with_role(token: DialToken, role: DialRole, target: Option<Address>, now: Instant) -> Self {
        Self {
            token,
            role,
            target,
            dialed: Address::empty(),
            destination: None,
            started_at: now,
            stop_requested: false,
            deferred_stop: false,
            busy: false,
            is_locked: false,
            is_locked_invalid: false,
            awaiting_ring: None,
            pending: None,
            give_up: None,
        }
    }

    #[must_use]
    pub const fn dial_type(&self) -> DialType {
        match self.role {
            DialRole::Outgoing(kind) | DialRole::Inbound { kind, .. } => kind,
        }
    }

    #[must_use]
    pub const fn is_outgoing(&self) -> bool {
        matches!(self.role, DialRole::Outgoing(_))
    }

    #[must_use]
    pub fn is_inbound_from(&self, gate: GateId) -> bool {
        matches!(self.role, DialRole::Inbound { from, .. } if from == gate)
    }

    /// Symbol that belongs at `index` for this attempt.
    #[must_use]
    pub fn symbol_at(&self, index: usize) -> Option<Symbol> {
        if let Some(pending) = self.pending
            && pending.index == index
        {
            return Some(pending.symbol);
        }
        self.target.as_ref().and_then(|target| target.get(index))
    }

    /// `true` when this outgoing attempt is heading for `address`.
    ///
    /// A manual attempt only counts once its full address is dialed.
    #[must_use]
    pub fn heads_to(&self, address: &Address) -> bool {
        if !self.is_outgoing() {
            return false;
        }
        self.target.as_ref().unwrap_or(&self.dialed) == address
    }
}

/// One endpoint of the network.
#[derive(Clone, Debug)]
pub struct Gate {
    id: GateId,
    config: GateConfig,
    pub(crate) state: GateState,
    pub(crate) attempt: Option<DialAttempt>,
    pub(crate) chevron_count: usize,
    pub(crate) linked: Option<GateId>,
    pub(crate) ring: RingController,
    pub(crate) chevrons: ChevronBank,
}

impl Gate {
    #[must_use]
    pub fn new(id: GateId, config: GateConfig) -> Self {
        Self {
            id,
            state: GateState::Idle,
            attempt: None,
            chevron_count: 0,
            linked: None,
            ring: RingController::new(config.ring),
            chevrons: ChevronBank::new(id, config.size),
            config,
        }
    }

    #[must_use]
    pub const fn id(&self) -> GateId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    #[must_use]
    pub const fn config(&self) -> &GateConfig {
        &self.config
    }

    #[must_use]
    pub const fn address(&self) -> &Address {
        &self.config.address
    }

    #[must_use]
    pub const fn size(&self) -> GateSize {
        self.config.size
    }

    #[must_use]
    pub const fn glyph_count(&self) -> u8 {
        self.config.ring.glyph_count
    }

    #[must_use]
    pub const fn state(&self) -> GateState {
        self.state
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == GateState::Idle
    }

    #[must_use]
    pub const fn attempt(&self) -> Option<&DialAttempt> {
        self.attempt.as_ref()
    }

    /// Strategy of the current attempt; `None` when idle.
    #[must_use]
    pub fn dial_type(&self) -> Option<DialType> {
        self.attempt.as_ref().map(DialAttempt::dial_type)
    }

    #[must_use]
    pub fn dialing_address(&self) -> &Address {
        self.attempt
            .as_ref()
            .map_or(&EMPTY_ADDRESS, |attempt| &attempt.dialed)
    }

    #[must_use]
    pub const fn active_chevron_count(&self) -> usize {
        self.chevron_count
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.attempt.as_ref().is_some_and(|attempt| attempt.is_locked)
    }

    #[must_use]
    pub fn is_locked_invalid(&self) -> bool {
        self.attempt
            .as_ref()
            .is_some_and(|attempt| attempt.is_locked_invalid)
    }

    #[must_use]
    pub fn should_stop_dialing(&self) -> bool {
        self.attempt
            .as_ref()
            .is_some_and(|attempt| attempt.stop_requested)
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.attempt.as_ref().is_some_and(|attempt| attempt.busy)
    }

    #[must_use]
    pub const fn linked_gate(&self) -> Option<GateId> {
        self.linked
    }

    #[must_use]
    pub const fn ring(&self) -> &RingController {
        &self.ring
    }

    #[must_use]
    pub const fn chevrons(&self) -> &ChevronBank {
        &self.chevrons
    }

    /// Token of the current attempt, if any.
    #[must_use]
    pub fn token(&self) -> Option<DialToken> {
        self.attempt.as_ref().map(|attempt| attempt.token)
    }
}
