#![allow(dead_code)]

use core::time::Duration;

use gate_core::address::{Address, GateSize};
use gate_core::clock::Instant;
use gate_core::effects::EffectLog;
use gate_core::gate::{GateConfig, GateId, GateState};
use gate_core::network::GateNetwork;
use gate_core::telemetry::TelemetryEventKind;

pub const EARTH: [u8; 7] = [28, 26, 5, 36, 11, 29, 0];
pub const ABYDOS: [u8; 7] = [26, 6, 14, 31, 11, 29, 0];
pub const CHULAK: [u8; 7] = [8, 1, 22, 14, 36, 19, 0];
pub const NOWHERE: [u8; 7] = [1, 2, 3, 4, 5, 6, 7];

pub const FRAME: Duration = Duration::from_millis(20);

pub struct Fixture {
    pub network: GateNetwork<EffectLog>,
    pub earth: GateId,
    pub abydos: GateId,
    pub chulak: GateId,
}

pub fn address(indices: &[u8]) -> Address {
    Address::from_indices(indices).expect("fixture address should build")
}

pub fn config(name: &str, indices: &[u8]) -> GateConfig {
    GateConfig::new(name, address(indices), GateSize::Seven)
}

pub fn fixture() -> Fixture {
    fixture_with(|config| config)
}

/// Three-gate network with `adjust` applied to every gate config.
pub fn fixture_with(adjust: impl Fn(GateConfig) -> GateConfig) -> Fixture {
    let mut network = GateNetwork::new(EffectLog::new());
    let earth = network
        .add_gate(adjust(config("earth", &EARTH)))
        .expect("earth should register");
    let abydos = network
        .add_gate(adjust(config("abydos", &ABYDOS)))
        .expect("abydos should register");
    let chulak = network
        .add_gate(adjust(config("chulak", &CHULAK)))
        .expect("chulak should register");
    Fixture {
        network,
        earth,
        abydos,
        chulak,
    }
}

impl Fixture {
    pub fn advance_to_millis(&mut self, millis: u64) {
        self.network.run_until(Instant::from_millis(millis), FRAME);
    }

    pub fn state(&self, gate: GateId) -> GateState {
        self.network
            .gate(gate)
            .expect("fixture gate should exist")
            .state()
    }

    pub fn chevrons(&self, gate: GateId) -> usize {
        self.network
            .gate(gate)
            .expect("fixture gate should exist")
            .active_chevron_count()
    }

    pub fn events(&self, kind: TelemetryEventKind) -> usize {
        self.network
            .telemetry()
            .oldest_first()
            .filter(|record| record.event == kind)
            .count()
    }

    /// Asserts the gate is idle with nothing left behind.
    pub fn assert_clean_idle(&self, gate: GateId) {
        let entry = self.network.gate(gate).expect("fixture gate should exist");
        assert_eq!(entry.state(), GateState::Idle);
        assert!(entry.attempt().is_none(), "attempt should be dropped");
        assert_eq!(entry.active_chevron_count(), 0);
        assert_eq!(entry.chevrons().lit_count(), 0);
        assert!(entry.linked_gate().is_none());
        assert!(!entry.ring().is_busy());
        assert!(self.network.links().link_for(gate).is_none());
        assert_eq!(self.network.pending_tasks(gate), 0);
    }
}
