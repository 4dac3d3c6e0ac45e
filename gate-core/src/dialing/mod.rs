//! Dialing state machine shared by every strategy.
//!
//! A dial attempt is a chain of [`DialStep`]s queued on the gate's scheduler
//! lanes. Each step carries the [`DialToken`] of the attempt that queued it;
//! when the token no longer matches the gate's current attempt the step is
//! dropped, and when the attempt has a stop pending the step unwinds instead
//! of advancing. Strategies differ in pacing and symbol source only: they
//! share readiness, commit, failure and idle-reset through [`context`].

use core::{fmt, time::Duration};

use heapless::Vec;
use thiserror::Error;

use crate::address::{AddressError, Symbol};
use crate::chevron::ChevronError;
use crate::clock::Instant;
use crate::gate::{GateId, GateState};
use crate::link::{LinkError, LinkId};
use crate::ring::RotationError;
use crate::scheduler::TaskScheduler;
use crate::telemetry::TelemetryRecorder;

pub mod context;
pub mod fast;
pub mod inbound;
pub mod instant;
pub mod manual;
pub mod slow;

pub use context::{DialContext, Readiness, assess_destination};
pub use fast::FastDial;
pub use instant::InstantDial;
pub use manual::ManualDial;
pub use slow::SlowDial;

/// Scheduler instance used by a gate network.
pub type GateScheduler = TaskScheduler<TaskCategory, GateTask>;

/// Telemetry recorder used by a gate network.
pub type GateTelemetry = TelemetryRecorder<Instant>;

/// Pacing strategy of a dial attempt.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DialType {
    Fast,
    Slow,
    Instant,
    /// Symbol-by-symbol dialing from a dial-home device.
    Manual,
}

impl DialType {
    pub const ALL: [DialType; 4] = [
        DialType::Fast,
        DialType::Slow,
        DialType::Instant,
        DialType::Manual,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            DialType::Fast => "fast",
            DialType::Slow => "slow",
            DialType::Instant => "instant",
            DialType::Manual => "manual",
        }
    }

    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for DialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identity of one dial attempt.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DialToken(pub u32);

impl fmt::Display for DialToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dial#{}", self.0)
    }
}

/// Hands out fresh attempt tokens.
#[derive(Clone, Debug, Default)]
pub struct TokenSource {
    issued: u32,
}

impl TokenSource {
    #[must_use]
    pub const fn new() -> Self {
        Self { issued: 0 }
    }

    pub fn issue(&mut self) -> DialToken {
        self.issued = self.issued.wrapping_add(1);
        DialToken(self.issued)
    }
}

/// Scheduled continuation of an outgoing attempt.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DialStep {
    /// Resolve the destination early and start its inbound mirror.
    FastNotify,
    FastEncode { index: usize },
    /// Light the final chevron and enter the busy window.
    FastLock,
    FastCommit,
    RotateToSymbol { index: usize },
    /// Ring settled; `reached` is `false` when it coasted to a stop instead.
    RingArrived { index: usize, reached: bool },
    EngageChevron { index: usize },
    /// Cosmetic chevron after an instant link.
    InstantChevron { index: usize },
    Unwind,
    FailHoldElapsed,
    GiveUp,
}

impl DialStep {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            DialStep::FastNotify => "fast-notify",
            DialStep::FastEncode { .. } => "fast-encode",
            DialStep::FastLock => "fast-lock",
            DialStep::FastCommit => "fast-commit",
            DialStep::RotateToSymbol { .. } => "rotate",
            DialStep::RingArrived { .. } => "ring-arrived",
            DialStep::EngageChevron { .. } => "engage",
            DialStep::InstantChevron { .. } => "instant-chevron",
            DialStep::Unwind => "unwind",
            DialStep::FailHoldElapsed => "fail-hold-elapsed",
            DialStep::GiveUp => "give-up",
        }
    }
}

/// Scheduled step of a passive inbound mirror.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InboundStep {
    Chevron { index: usize },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LinkTask {
    AutoClose { link: LinkId },
}

/// Action stored in the scheduler.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GateTask {
    Dial { token: DialToken, step: DialStep },
    Inbound { token: DialToken, step: InboundStep },
    Link(LinkTask),
}

/// Scheduler lane within a gate; an idle reset cancels all of them.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Lane {
    Dialing,
    Inbound,
    Presentation,
    Link,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TaskCategory {
    pub gate: GateId,
    pub lane: Lane,
}

impl TaskCategory {
    #[must_use]
    pub const fn new(gate: GateId, lane: Lane) -> Self {
        Self { gate, lane }
    }
}

/// Why a destination cannot take a link right now.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NotReadyReason {
    NoMatch,
    SelfTarget,
    DestinationActive,
    /// Dialing elsewhere or mirroring another gate.
    DestinationBusy,
    GlyphMismatch,
}

impl NotReadyReason {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            NotReadyReason::NoMatch => "no gate at address",
            NotReadyReason::SelfTarget => "address is the dialing gate",
            NotReadyReason::DestinationActive => "destination already linked",
            NotReadyReason::DestinationBusy => "destination busy",
            NotReadyReason::GlyphMismatch => "destination uses a different glyph set",
        }
    }
}

impl fmt::Display for NotReadyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of [`stop_dial`](crate::network::GateNetwork::stop_dial).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StopOutcome {
    AlreadyIdle,
    /// Stop flag set; the attempt unwinds on the next tick.
    Stopping,
    AlreadyStopping,
    /// Requested inside the busy window; applied once the commit decision lands.
    Deferred,
    /// Passive inbound mirrors only follow their origin.
    Ignored,
    /// Gate is linked; close the link instead.
    NotDialing,
}

impl StopOutcome {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            StopOutcome::AlreadyIdle => "already idle",
            StopOutcome::Stopping => "stopping",
            StopOutcome::AlreadyStopping => "already stopping",
            StopOutcome::Deferred => "deferred until commit",
            StopOutcome::Ignored => "ignored (inbound)",
            StopOutcome::NotDialing => "not dialing (link open)",
        }
    }
}

/// Synchronous answer to a manual encode or lock.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ManualAck {
    pub index: usize,
    pub symbol: Symbol,
    /// `true` for the final, locking symbol.
    pub locks: bool,
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum DialError {
    #[error("unknown gate {0}")]
    UnknownGate(GateId),
    #[error("{gate} is {state}, not idle")]
    NotIdle { gate: GateId, state: GateState },
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error("manual dials take their symbols one at a time")]
    ManualAddress,
    #[error("address resolves to the dialing gate")]
    SelfTarget,
    #[error("destination unavailable: {0}")]
    DestinationUnavailable(NotReadyReason),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Step(#[from] StepError),
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ManualStepError {
    #[error(transparent)]
    Dial(#[from] DialError),
    #[error("{gate} is not running a manual dial")]
    NotManual { gate: GateId },
    #[error("dial is stopping")]
    Stopping,
    #[error("previous symbol is still engaging")]
    StepInFlight,
    #[error("ring is still rotating")]
    RingBusy,
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error("only {max} symbols may be encoded before the lock")]
    TooManySymbols { max: usize },
    #[error("lock needs {expected} encoded symbols, found {found}")]
    TooFewSymbols { expected: usize, found: usize },
}

/// Fault raised by a scheduled step; the owning gate is forced idle.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum StepError {
    #[error("unknown gate {0}")]
    UnknownGate(GateId),
    #[error("{0} has no dial attempt")]
    NoAttempt(GateId),
    #[error("no symbol for position {index}")]
    MissingSymbol { index: usize },
    #[error("step {} does not belong to a {kind} dial", .step.label())]
    UnexpectedStep { step: DialStep, kind: DialType },
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Rotation(#[from] RotationError),
    #[error(transparent)]
    Chevron(#[from] ChevronError),
    #[error(transparent)]
    Link(#[from] LinkError),
}

/// Pacing parameters for one strategy.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DialProfile {
    pub kind: DialType,
    /// Gap between symbols for paced strategies.
    pub symbol_interval: Duration,
    /// Busy window before the commit.
    pub lock_lead: Duration,
    /// Delay between ring arrival and chevron engage.
    pub chevron_engage: Duration,
    /// Rest between engage and the next rotation.
    pub symbol_pause: Duration,
    /// How long a locked-invalid gate shows its failure before resetting.
    pub fail_hold: Duration,
    /// Give-up deadline; manual dials re-arm it on every step.
    pub give_up_after: Option<Duration>,
    /// Gap between mirrored chevrons on the receiving gate.
    pub inbound_interval: Duration,
}

impl DialProfile {
    pub const fn new(kind: DialType) -> Self {
        Self {
            kind,
            symbol_interval: Duration::ZERO,
            lock_lead: Duration::ZERO,
            chevron_engage: Duration::ZERO,
            symbol_pause: Duration::ZERO,
            fail_hold: Duration::from_secs(2),
            give_up_after: None,
            inbound_interval: Duration::from_millis(150),
        }
    }

    pub const fn with_symbol_interval(mut self, interval: Duration) -> Self {
        self.symbol_interval = interval;
        self
    }

    pub const fn with_lock_lead(mut self, lead: Duration) -> Self {
        self.lock_lead = lead;
        self
    }

    pub const fn with_chevron_engage(mut self, engage: Duration) -> Self {
        self.chevron_engage = engage;
        self
    }

    pub const fn with_symbol_pause(mut self, pause: Duration) -> Self {
        self.symbol_pause = pause;
        self
    }

    pub const fn with_fail_hold(mut self, hold: Duration) -> Self {
        self.fail_hold = hold;
        self
    }

    pub const fn with_give_up_after(mut self, give_up: Option<Duration>) -> Self {
        self.give_up_after = give_up;
        self
    }

    pub const fn with_inbound_interval(mut self, interval: Duration) -> Self {
        self.inbound_interval = interval;
        self
    }

    /// Offset of the `n`th paced symbol from the start of the attempt.
    pub fn nth_symbol(&self, n: usize) -> Duration {
        self.symbol_interval
            .saturating_mul(u32::try_from(n).unwrap_or(u32::MAX))
    }
}

pub const FAST_PROFILE: DialProfile = DialProfile::new(DialType::Fast)
    .with_symbol_interval(Duration::from_secs(1))
    .with_lock_lead(Duration::from_millis(500))
    .with_inbound_interval(Duration::from_secs(1));

pub const SLOW_PROFILE: DialProfile = DialProfile::new(DialType::Slow)
    .with_chevron_engage(Duration::from_millis(1_500))
    .with_symbol_pause(Duration::from_millis(500))
    .with_give_up_after(Some(Duration::from_secs(120)));

pub const INSTANT_PROFILE: DialProfile = DialProfile::new(DialType::Instant)
    .with_symbol_interval(Duration::from_millis(100))
    .with_inbound_interval(Duration::from_millis(100));

pub const MANUAL_PROFILE: DialProfile = DialProfile::new(DialType::Manual)
    .with_chevron_engage(Duration::from_secs(1))
    .with_give_up_after(Some(Duration::from_secs(30)));

/// Built-in profile for `kind`.
#[must_use]
pub const fn default_profile(kind: DialType) -> DialProfile {
    match kind {
        DialType::Fast => FAST_PROFILE,
        DialType::Slow => SLOW_PROFILE,
        DialType::Instant => INSTANT_PROFILE,
        DialType::Manual => MANUAL_PROFILE,
    }
}

/// Maximum number of dial profiles tracked by the registry.
pub const MAX_DIAL_PROFILES: usize = 4;

/// Registry of per-strategy pacing overrides.
#[derive(Clone, Debug)]
pub struct ProfileRegistry<const CAPACITY: usize = MAX_DIAL_PROFILES> {
    profiles: Vec<DialProfile, CAPACITY>,
}

impl<const CAPACITY: usize> ProfileRegistry<CAPACITY> {
    /// Creates an empty registry.
    pub const fn new() -> Self {
        Self {
            profiles: Vec::new(),
        }
    }

    /// Registers (or replaces) the profile for its strategy.
    pub fn register(&mut self, profile: DialProfile) -> Result<(), ProfileRegistryError> {
        if let Some(existing) = self
            .profiles
            .iter_mut()
            .find(|existing| existing.kind == profile.kind)
        {
            *existing = profile;
            Ok(())
        } else {
            self.profiles
                .push(profile)
                .map_err(|_| ProfileRegistryError::RegistryFull)
        }
    }

    pub fn get(&self, kind: DialType) -> Option<&DialProfile> {
        self.profiles.iter().find(|profile| profile.kind == kind)
    }

    pub fn contains(&self, kind: DialType) -> bool {
        self.get(kind).is_some()
    }

    /// Registered profile for `kind`, or the built-in one.
    pub fn resolve(&self, kind: DialType) -> DialProfile {
        self.get(kind).copied().unwrap_or(default_profile(kind))
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, DialProfile> {
        self.profiles.iter()
    }
}

impl<const CAPACITY: usize> Default for ProfileRegistry<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum ProfileRegistryError {
    #[error("dial profile registry is full")]
    RegistryFull,
}

/// Pacing and symbol source of one dial strategy.
///
/// Implementations only schedule and advance their own steps; stop handling,
/// stale-token filtering and the give-up/fail-hold steps are shared.
pub trait DialStrategy: Sync {
    fn dial_type(&self) -> DialType;

    /// Whether the destination must share the initiator's glyph set.
    fn requires_matching_glyphs(&self) -> bool {
        true
    }

    /// Queues the first steps of a freshly validated attempt.
    fn begin(&self, ctx: &mut DialContext<'_>, gate: GateId) -> Result<(), DialError>;

    /// Runs one scheduled step of a live, non-stopping attempt.
    fn advance(
        &self,
        ctx: &mut DialContext<'_>,
        gate: GateId,
        step: DialStep,
    ) -> Result<(), StepError>;
}

pub static FAST: FastDial = FastDial;
pub static SLOW: SlowDial = SlowDial;
pub static INSTANT: InstantDial = InstantDial;
pub static MANUAL: ManualDial = ManualDial;

#[must_use]
pub fn strategy_for(kind: DialType) -> &'static dyn DialStrategy {
    match kind {
        DialType::Fast => &FAST,
        DialType::Slow => &SLOW,
        DialType::Instant => &INSTANT,
        DialType::Manual => &MANUAL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dial_types_parse_their_labels() {
        for kind in DialType::ALL {
            assert_eq!(DialType::from_label(kind.label()), Some(kind));
            assert_eq!(strategy_for(kind).dial_type(), kind);
        }
        assert_eq!(DialType::from_label("SLOW"), Some(DialType::Slow));
        assert_eq!(DialType::from_label("warp"), None);
    }

    #[test]
    fn only_instant_skips_the_glyph_check() {
        assert!(strategy_for(DialType::Fast).requires_matching_glyphs());
        assert!(strategy_for(DialType::Slow).requires_matching_glyphs());
        assert!(strategy_for(DialType::Manual).requires_matching_glyphs());
        assert!(!strategy_for(DialType::Instant).requires_matching_glyphs());
    }

    #[test]
    fn tokens_are_unique() {
        let mut tokens = TokenSource::new();
        let first = tokens.issue();
        let second = tokens.issue();
        assert_ne!(first, second);
    }

    #[test]
    fn registry_replaces_profiles_and_falls_back_to_defaults() {
        let mut registry = ProfileRegistry::<2>::new();
        assert!(registry.is_empty());
        assert_eq!(registry.resolve(DialType::Fast), FAST_PROFILE);

        let quick = FAST_PROFILE.with_symbol_interval(Duration::from_millis(200));
        registry.register(quick).expect("registration should succeed");
        registry
            .register(quick.with_lock_lead(Duration::from_millis(50)))
            .expect("replacement should succeed");
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.resolve(DialType::Fast).lock_lead,
            Duration::from_millis(50)
        );

        registry
            .register(SLOW_PROFILE)
            .expect("second profile should fit");
        assert_eq!(
            registry.register(MANUAL_PROFILE),
            Err(ProfileRegistryError::RegistryFull)
        );
        assert!(registry.contains(DialType::Slow));
        assert_eq!(registry.iter().count(), 2);
    }

    #[test]
    fn profile_offsets_scale_with_position() {
        assert_eq!(FAST_PROFILE.nth_symbol(0), Duration::ZERO);
        assert_eq!(FAST_PROFILE.nth_symbol(7), Duration::from_secs(7));
        assert_eq!(SLOW_PROFILE.give_up_after, Some(Duration::from_secs(120)));
    }
}
