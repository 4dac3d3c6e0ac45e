//! Rotation controller for a gate's symbol ring.
//!
//! The ring moves through `Stopped -> Starting -> FullSpeed -> Stopping ->
//! Stopped` while travelling toward a target angle. Rotation always continues
//! in the current spin direction; when the forward distance is shorter than a
//! full spin-up plus spin-down, a whole turn is added so the ring sweeps past
//! the target and lands on a fresh pass. Deceleration is recomputed on entering
//! `Stopping` so the ring lands on the target exactly.
//!
//! Angles are degrees in `[0, 360)`, normalised with [`unsigned_mod`].

use core::time::Duration;

use thiserror::Error;

use crate::address::{DEFAULT_GLYPH_COUNT, Symbol};
use crate::clock::{Instant, secs_f32};

/// Degrees in a full turn.
pub const FULL_TURN: f32 = 360.0;

/// Longest slice of simulated time integrated in one motion step.
const MAX_STEP: Duration = Duration::from_millis(5);

/// Remainder that is always non-negative, unlike `%` on negative operands.
#[must_use]
pub fn unsigned_mod(value: f32, modulus: f32) -> f32 {
    let remainder = value % modulus;
    let wrapped = if remainder < 0.0 {
        remainder + modulus
    } else {
        remainder
    };
    // Adding the modulus to a tiny negative remainder can round up to it.
    if wrapped >= modulus { 0.0 } else { wrapped }
}

/// Motion profile for a ring.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RingProfile {
    pub glyph_count: u8,
    /// Cruise speed in degrees per second.
    pub max_speed: f32,
    pub spin_up: Duration,
    pub spin_down: Duration,
    /// Arrival tolerance in degrees.
    pub tolerance: f32,
}

impl RingProfile {
    pub const fn new(
        glyph_count: u8,
        max_speed: f32,
        spin_up: Duration,
        spin_down: Duration,
        tolerance: f32,
    ) -> Self {
        Self {
            glyph_count,
            max_speed,
            spin_up,
            spin_down,
            tolerance,
        }
    }

    /// Angle at which `symbol` sits under the reference chevron.
    #[must_use]
    pub fn symbol_angle(&self, symbol: Symbol) -> f32 {
        let glyphs = f32::from(self.glyph_count.max(1));
        unsigned_mod(f32::from(symbol.index()) * FULL_TURN / glyphs, FULL_TURN)
    }

    /// Distance covered by a full spin-up followed by a full spin-down.
    #[must_use]
    pub fn minimum_travel(&self) -> f32 {
        self.max_speed * (secs_f32(self.spin_up) + secs_f32(self.spin_down)) / 2.0
    }

    fn acceleration(&self) -> f32 {
        rate(self.max_speed, self.spin_up)
    }

    fn nominal_deceleration(&self) -> f32 {
        rate(self.max_speed, self.spin_down)
    }
}

impl Default for RingProfile {
    fn default() -> Self {
        DEFAULT_RING_PROFILE
    }
}

/// Standard ring: 39 glyphs, 120°/s cruise, half-second ramps.
pub const DEFAULT_RING_PROFILE: RingProfile = RingProfile::new(
    DEFAULT_GLYPH_COUNT,
    120.0,
    Duration::from_millis(500),
    Duration::from_millis(500),
    0.25,
);

fn rate(speed: f32, ramp: Duration) -> f32 {
    let secs = secs_f32(ramp);
    if secs > 0.0 { speed / secs } else { f32::MAX }
}

/// Motion phase of the ring.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RingPhase {
    Stopped,
    Starting,
    FullSpeed,
    Stopping,
}

impl RingPhase {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            RingPhase::Stopped => "stopped",
            RingPhase::Starting => "starting",
            RingPhase::FullSpeed => "full-speed",
            RingPhase::Stopping => "stopping",
        }
    }
}

/// Spin direction seen from the front of the gate.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum SpinDirection {
    #[default]
    Clockwise,
    CounterClockwise,
}

impl SpinDirection {
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            SpinDirection::Clockwise => SpinDirection::CounterClockwise,
            SpinDirection::CounterClockwise => SpinDirection::Clockwise,
        }
    }

    const fn sign(self) -> f32 {
        match self {
            SpinDirection::Clockwise => 1.0,
            SpinDirection::CounterClockwise => -1.0,
        }
    }
}

/// In-flight approach toward a target.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RotationRequest {
    pub symbol: Symbol,
    pub target_angle: f32,
    pub direction: SpinDirection,
    /// Degrees still to travel.
    pub remaining: f32,
    cancelled: bool,
}

/// Completion reported by [`RingController::update`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RingEvent {
    /// Ring came to rest on the requested symbol.
    Arrived { symbol: Symbol, angle: f32 },
    /// Ring coasted to a stop after [`RingController::cancel`].
    Cancelled { symbol: Symbol },
}

impl RingEvent {
    /// `true` when the rotation reached its target.
    #[must_use]
    pub const fn reached(&self) -> bool {
        matches!(self, RingEvent::Arrived { .. })
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum RotationError {
    /// A rotation is still travelling or coasting.
    #[error("ring is already rotating")]
    InFlight,
    #[error("symbol {0} is not on this ring")]
    UnknownSymbol(Symbol),
    /// Direction changes are only accepted at rest.
    #[error("ring must be stopped to change direction")]
    NotStopped,
}

/// Drives one ring toward requested symbols.
#[derive(Clone, Debug)]
pub struct RingController {
    profile: RingProfile,
    angle: f32,
    speed: f32,
    deceleration: f32,
    phase: RingPhase,
    direction: SpinDirection,
    request: Option<RotationRequest>,
    last_update: Option<Instant>,
}

impl RingController {
    #[must_use]
    pub const fn new(profile: RingProfile) -> Self {
        Self {
            profile,
            angle: 0.0,
            speed: 0.0,
            deceleration: 0.0,
            phase: RingPhase::Stopped,
            direction: SpinDirection::Clockwise,
            request: None,
            last_update: None,
        }
    }

    #[must_use]
    pub const fn profile(&self) -> &RingProfile {
        &self.profile
    }

    #[must_use]
    pub const fn angle(&self) -> f32 {
        self.angle
    }

    #[must_use]
    pub const fn speed(&self) -> f32 {
        self.speed
    }

    #[must_use]
    pub const fn phase(&self) -> RingPhase {
        self.phase
    }

    #[must_use]
    pub const fn direction(&self) -> SpinDirection {
        self.direction
    }

    #[must_use]
    pub const fn request(&self) -> Option<&RotationRequest> {
        self.request.as_ref()
    }

    /// `true` while a rotation is travelling or coasting.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.request.is_some()
    }

    /// Starts rotating toward `symbol` plus `offset` degrees.
    ///
    /// Returns the normalised target angle. A second request while one is in
    /// flight is rejected.
    pub fn rotate_to_symbol(
        &mut self,
        symbol: Symbol,
        offset: f32,
        now: Instant,
    ) -> Result<f32, RotationError> {
        if self.request.is_some() {
            return Err(RotationError::InFlight);
        }
        if symbol.index() >= self.profile.glyph_count {
            return Err(RotationError::UnknownSymbol(symbol));
        }

        let target_angle = unsigned_mod(self.profile.symbol_angle(symbol) + offset, FULL_TURN);
        let mut travel = self.forward_distance(target_angle);
        let minimum = self.profile.minimum_travel();
        // Bounded so a pathological profile cannot spin forever.
        let mut turns = 0;
        while travel < minimum && turns < 8 {
            travel += FULL_TURN;
            turns += 1;
        }

        self.request = Some(RotationRequest {
            symbol,
            target_angle,
            direction: self.direction,
            remaining: travel,
            cancelled: false,
        });
        self.phase = RingPhase::Starting;
        self.last_update = Some(now);
        log_rotation_started(symbol, target_angle, travel, self.direction);
        Ok(target_angle)
    }

    /// Coasts the current rotation to a stop; resolves as [`RingEvent::Cancelled`].
    ///
    /// Returns `false` when nothing was rotating.
    pub fn cancel(&mut self) -> bool {
        match self.request.as_mut() {
            Some(request) if !request.cancelled => {
                request.cancelled = true;
                self.phase = RingPhase::Stopping;
                self.deceleration = self.profile.nominal_deceleration();
                true
            }
            _ => false,
        }
    }

    /// Halts immediately and drops any request without reporting an event.
    pub fn reset(&mut self) {
        self.speed = 0.0;
        self.deceleration = 0.0;
        self.phase = RingPhase::Stopped;
        self.direction = SpinDirection::Clockwise;
        self.request = None;
        self.last_update = None;
    }

    /// Reverses the spin direction for the next rotation.
    pub fn flip_direction(&mut self) -> Result<SpinDirection, RotationError> {
        if self.phase != RingPhase::Stopped || self.request.is_some() {
            return Err(RotationError::NotStopped);
        }
        self.direction = self.direction.reversed();
        Ok(self.direction)
    }

    /// Integrates motion up to `now`.
    pub fn update(&mut self, now: Instant) -> Option<RingEvent> {
        let last = self.last_update?;
        self.last_update = Some(now);
        if self.request.is_none() {
            return None;
        }

        let mut pending = now.saturating_duration_since(last);
        while !pending.is_zero() {
            let step = pending.min(MAX_STEP);
            pending -= step;
            if let Some(event) = self.step(secs_f32(step)) {
                self.last_update = None;
                return Some(event);
            }
        }
        None
    }

    fn step(&mut self, dt: f32) -> Option<RingEvent> {
        let request = self.request?;
        let initial = self.speed;
        self.speed = match self.phase {
            RingPhase::Starting => {
                (self.speed + self.profile.acceleration() * dt).min(self.profile.max_speed)
            }
            RingPhase::FullSpeed => self.profile.max_speed,
            RingPhase::Stopping => (self.speed - self.deceleration * dt).max(0.0),
            RingPhase::Stopped => 0.0,
        };
        if self.phase == RingPhase::Starting && self.speed >= self.profile.max_speed {
            self.phase = RingPhase::FullSpeed;
        }

        let mut advance = (initial + self.speed) / 2.0 * dt;
        if !request.cancelled {
            advance = advance.min(request.remaining);
        }
        let remaining = request.remaining - advance;
        self.angle = unsigned_mod(self.angle + request.direction.sign() * advance, FULL_TURN);
        if let Some(active) = self.request.as_mut() {
            active.remaining = remaining;
        }

        if request.cancelled {
            if self.speed <= 0.0 {
                return Some(self.settle_cancelled(request.symbol));
            }
            return None;
        }

        match self.phase {
            RingPhase::Starting | RingPhase::FullSpeed => {
                let braking = self.speed * self.speed / (2.0 * self.profile.nominal_deceleration());
                if remaining <= braking {
                    self.phase = RingPhase::Stopping;
                    self.deceleration = if remaining > 0.0 {
                        self.speed * self.speed / (2.0 * remaining)
                    } else {
                        f32::MAX
                    };
                }
            }
            RingPhase::Stopping | RingPhase::Stopped => {}
        }

        if remaining <= self.profile.tolerance
            || (self.phase == RingPhase::Stopping && self.speed <= 0.0)
        {
            return Some(self.settle_arrived(request));
        }
        None
    }

    fn settle_arrived(&mut self, request: RotationRequest) -> RingEvent {
        self.angle = request.target_angle;
        self.speed = 0.0;
        self.phase = RingPhase::Stopped;
        self.request = None;
        RingEvent::Arrived {
            symbol: request.symbol,
            angle: request.target_angle,
        }
    }

    fn settle_cancelled(&mut self, symbol: Symbol) -> RingEvent {
        self.speed = 0.0;
        self.phase = RingPhase::Stopped;
        self.request = None;
        RingEvent::Cancelled { symbol }
    }

    fn forward_distance(&self, target: f32) -> f32 {
        match self.direction {
            SpinDirection::Clockwise => unsigned_mod(target - self.angle, FULL_TURN),
            SpinDirection::CounterClockwise => unsigned_mod(self.angle - target, FULL_TURN),
        }
    }
}

impl Default for RingController {
    fn default() -> Self {
        Self::new(DEFAULT_RING_PROFILE)
    }
}

fn log_rotation_started(symbol: Symbol, target: f32, travel: f32, direction: SpinDirection) {
    tracing::trace!(
        symbol = symbol.index(),
        target,
        travel,
        direction = ?direction,
        "ring rotation started"
    );
}
