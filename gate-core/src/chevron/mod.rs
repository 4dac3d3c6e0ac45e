//! Chevron indicators owned by a gate.
//!
//! Each chevron only remembers whether it is lit. Cues and lights are pushed
//! to the host through [`GateEffects`] with the requested delay, so a whole
//! lock sequence can be staged in one call.

use core::time::Duration;

use heapless::Vec;
use thiserror::Error;

use crate::address::{GateSize, MAX_ADDRESS_LEN};
use crate::effects::{GateEffects, SoundCue};
use crate::gate::GateId;

/// How an activation should sound.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChevronVariant {
    /// Intermediate symbol committed by the dialing gate.
    Encode,
    /// Final, commit-significant chevron.
    Lock,
    /// Chevron mirrored on the receiving gate.
    Inbound,
}

impl ChevronVariant {
    const fn cue(self) -> SoundCue {
        match self {
            ChevronVariant::Encode => SoundCue::ChevronEncode,
            ChevronVariant::Lock => SoundCue::ChevronLock,
            ChevronVariant::Inbound => SoundCue::ChevronInbound,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum ChevronError {
    #[error("chevron {index} out of range for {len} chevrons")]
    OutOfRange { index: usize, len: usize },
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Chevron {
    lit: bool,
}

impl Chevron {
    #[must_use]
    pub const fn is_lit(self) -> bool {
        self.lit
    }
}

/// Ordered chevrons of one gate, fixed at the gate's size.
#[derive(Clone, Debug)]
pub struct ChevronBank {
    gate: GateId,
    chevrons: Vec<Chevron, MAX_ADDRESS_LEN>,
}

impl ChevronBank {
    #[must_use]
    pub fn new(gate: GateId, size: GateSize) -> Self {
        let mut chevrons = Vec::new();
        for _ in 0..size.symbols() {
            // Sizes never exceed MAX_ADDRESS_LEN.
            let _ = chevrons.push(Chevron::default());
        }
        Self { gate, chevrons }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chevrons.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chevrons.is_empty()
    }

    #[must_use]
    pub fn is_lit(&self, index: usize) -> bool {
        self.chevrons.get(index).is_some_and(|chevron| chevron.is_lit())
    }

    #[must_use]
    pub fn lit_count(&self) -> usize {
        self.chevrons.iter().filter(|chevron| chevron.is_lit()).count()
    }

    /// Index of the first chevron that is not lit.
    #[must_use]
    pub fn first_unlit(&self) -> Option<usize> {
        self.chevrons.iter().position(|chevron| !chevron.is_lit())
    }

    /// Plays the variant's cue after `delay` and optionally lights chevron `index`.
    pub fn activate(
        &mut self,
        effects: &mut dyn GateEffects,
        index: usize,
        delay: Duration,
        turn_on: bool,
        variant: ChevronVariant,
    ) -> Result<(), ChevronError> {
        let len = self.chevrons.len();
        let chevron = self
            .chevrons
            .get_mut(index)
            .ok_or(ChevronError::OutOfRange { index, len })?;
        effects.play_sound(self.gate, variant.cue(), delay);
        if turn_on {
            chevron.lit = true;
            effects.set_chevron_light(self.gate, index, true, delay);
        }
        Ok(())
    }

    /// Mirror of [`activate`](Self::activate); the release cue only plays for lit chevrons.
    pub fn deactivate(
        &mut self,
        effects: &mut dyn GateEffects,
        index: usize,
        delay: Duration,
        turn_off: bool,
    ) -> Result<(), ChevronError> {
        let len = self.chevrons.len();
        let chevron = self
            .chevrons
            .get_mut(index)
            .ok_or(ChevronError::OutOfRange { index, len })?;
        if !chevron.lit {
            return Ok(());
        }
        effects.play_sound(self.gate, SoundCue::ChevronRelease, delay);
        if turn_off {
            chevron.lit = false;
            effects.set_chevron_light(self.gate, index, false, delay);
        }
        Ok(())
    }

    /// Locks the first `count` chevrons, staggering each by `delay`.
    ///
    /// Returns how many chevrons were touched; `count` is clamped to the bank.
    pub fn lock_all(
        &mut self,
        effects: &mut dyn GateEffects,
        count: usize,
        delay: Duration,
        turn_on: bool,
    ) -> usize {
        let count = count.min(self.chevrons.len());
        let mut offset = Duration::ZERO;
        for index in 0..count {
            let variant = if index + 1 == count {
                ChevronVariant::Lock
            } else {
                ChevronVariant::Encode
            };
            // In range by construction.
            let _ = self.activate(effects, index, offset, turn_on, variant);
            offset += delay;
        }
        count
    }

    /// Releases every lit chevron, staggering each by `delay`.
    pub fn unlock_all(
        &mut self,
        effects: &mut dyn GateEffects,
        delay: Duration,
        turn_off: bool,
    ) -> usize {
        let mut offset = Duration::ZERO;
        let mut released = 0;
        for index in 0..self.chevrons.len() {
            if self.is_lit(index) {
                let _ = self.deactivate(effects, index, offset, turn_off);
                offset += delay;
                released += 1;
            }
        }
        released
    }
}
