//! Outbound collaborator calls made by the dialing protocol.
//!
//! Sound, mechanism motion, chevron lights and object authority are owned by
//! the host. The protocol only issues fire-and-forget requests through
//! [`GateEffects`]; nothing it decides depends on how they are carried out.

use alloc::vec::Vec;
use core::{fmt, time::Duration};

use crate::gate::GateId;

/// Replicated object that may pass through an open link.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

/// Authority that may own a replicated object.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum OwnerId {
    /// A connected participant.
    Peer(u32),
    /// The authority hosting a gate.
    Gate(GateId),
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerId::Peer(peer) => write!(f, "peer#{peer}"),
            OwnerId::Gate(gate) => write!(f, "{gate}"),
        }
    }
}

/// Audio cues the protocol may request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SoundCue {
    RingSpin,
    ChevronEncode,
    ChevronLock,
    ChevronInbound,
    ChevronRelease,
    DialFail,
    LinkOpen,
    LinkClose,
    Transit,
}

impl SoundCue {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            SoundCue::RingSpin => "ring-spin",
            SoundCue::ChevronEncode => "chevron-encode",
            SoundCue::ChevronLock => "chevron-lock",
            SoundCue::ChevronInbound => "chevron-inbound",
            SoundCue::ChevronRelease => "chevron-release",
            SoundCue::DialFail => "dial-fail",
            SoundCue::LinkOpen => "link-open",
            SoundCue::LinkClose => "link-close",
            SoundCue::Transit => "transit",
        }
    }
}

impl fmt::Display for SoundCue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Side-effect sink for presentation and authority handoff.
pub trait GateEffects {
    fn play_sound(&mut self, gate: GateId, cue: SoundCue, delay: Duration);

    /// Moves the ring mechanism toward `angle` over `blend`.
    fn rotate_mechanism(&mut self, gate: GateId, angle: f32, blend: Duration);

    fn set_chevron_light(&mut self, gate: GateId, index: usize, lit: bool, delay: Duration);

    fn transfer_ownership(&mut self, object: ObjectId, owner: OwnerId);

    fn drop_ownership(&mut self, object: ObjectId);
}

/// Discards every request.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopEffects;

impl GateEffects for NoopEffects {
    fn play_sound(&mut self, _gate: GateId, _cue: SoundCue, _delay: Duration) {}

    fn rotate_mechanism(&mut self, _gate: GateId, _angle: f32, _blend: Duration) {}

    fn set_chevron_light(&mut self, _gate: GateId, _index: usize, _lit: bool, _delay: Duration) {}

    fn transfer_ownership(&mut self, _object: ObjectId, _owner: OwnerId) {}

    fn drop_ownership(&mut self, _object: ObjectId) {}
}

/// One request captured by [`EffectLog`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Effect {
    Sound {
        gate: GateId,
        cue: SoundCue,
        delay: Duration,
    },
    Rotate {
        gate: GateId,
        angle: f32,
        blend: Duration,
    },
    Light {
        gate: GateId,
        index: usize,
        lit: bool,
        delay: Duration,
    },
    Transfer {
        object: ObjectId,
        owner: OwnerId,
    },
    Drop {
        object: ObjectId,
    },
}

impl Effect {
    /// Gate the effect concerns, when it concerns one.
    #[must_use]
    pub const fn gate(&self) -> Option<GateId> {
        match self {
            Effect::Sound { gate, .. } | Effect::Rotate { gate, .. } | Effect::Light { gate, .. } => {
                Some(*gate)
            }
            Effect::Transfer { .. } | Effect::Drop { .. } => None,
        }
    }
}

/// Records every request in order. Used by tests and the emulator narration.
///
/// Mechanism motion is frequent, so it is only kept when `track_motion` is set.
#[derive(Clone, Debug, Default)]
pub struct EffectLog {
    effects: Vec<Effect>,
    track_motion: bool,
}

impl EffectLog {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            effects: Vec::new(),
            track_motion: false,
        }
    }

    #[must_use]
    pub fn with_motion(mut self) -> Self {
        self.track_motion = true;
        self
    }

    #[must_use]
    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    /// Takes every recorded effect, leaving the log empty.
    pub fn drain(&mut self) -> Vec<Effect> {
        core::mem::take(&mut self.effects)
    }

    pub fn clear(&mut self) {
        self.effects.clear();
    }

    /// Cues played for `gate`, oldest first.
    pub fn sounds_for(&self, gate: GateId) -> impl Iterator<Item = SoundCue> + '_ {
        self.effects.iter().filter_map(move |effect| match effect {
            Effect::Sound { gate: owner, cue, .. } if *owner == gate => Some(*cue),
            _ => None,
        })
    }

    #[must_use]
    pub fn count_sound(&self, gate: GateId, cue: SoundCue) -> usize {
        self.sounds_for(gate).filter(|played| *played == cue).count()
    }

    /// Number of times a chevron on `gate` was switched on.
    #[must_use]
    pub fn lights_on(&self, gate: GateId) -> usize {
        self.effects
            .iter()
            .filter(|effect| {
                matches!(effect, Effect::Light { gate: owner, lit: true, .. } if *owner == gate)
            })
            .count()
    }
}

impl GateEffects for EffectLog {
    fn play_sound(&mut self, gate: GateId, cue: SoundCue, delay: Duration) {
        self.effects.push(Effect::Sound { gate, cue, delay });
    }

    fn rotate_mechanism(&mut self, gate: GateId, angle: f32, blend: Duration) {
        if self.track_motion {
            self.effects.push(Effect::Rotate { gate, angle, blend });
        }
    }

    fn set_chevron_light(&mut self, gate: GateId, index: usize, lit: bool, delay: Duration) {
        self.effects.push(Effect::Light {
            gate,
            index,
            lit,
            delay,
        });
    }

    fn transfer_ownership(&mut self, object: ObjectId, owner: OwnerId) {
        self.effects.push(Effect::Transfer { object, owner });
    }

    fn drop_ownership(&mut self, object: ObjectId) {
        self.effects.push(Effect::Drop { object });
    }
}
