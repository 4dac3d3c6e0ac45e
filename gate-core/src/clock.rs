//! Monotonic time base shared by the scheduler, rings and telemetry.
//!
//! Everything in the protocol advances on a caller-supplied clock. Hosts feed
//! wall-clock frames, tests feed synthetic ones; nothing here reads a real
//! timer.

use core::{fmt, ops::Add, time::Duration};

use crate::telemetry::TelemetryInstant;

/// Point in time measured in microseconds since an arbitrary epoch.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Instant(u64);

impl Instant {
    /// Epoch of the virtual clock.
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1_000))
    }

    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1_000_000))
    }

    #[must_use]
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0 / 1_000
    }

    /// Returns the elapsed time since `earlier`, or zero when `earlier` is later.
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Instant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(micros))
    }
}

impl TelemetryInstant for Instant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Instant::saturating_duration_since(*self, earlier)
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}ms", self.as_millis())
    }
}

/// Converts a duration into fractional seconds without relying on `std`.
#[must_use]
pub(crate) fn secs_f32(duration: Duration) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let micros = duration.as_micros() as f32;
    micros / 1_000_000.0
}
