//! Status surface for the REPL.
//!
//! [`GateStatus`] snapshots the parts of a gate an operator cares about, and
//! [`StatusFormatter`] renders it so every front-end prints the same lines.

use alloc::string::String;
use core::fmt;

use crate::address::{Address, GateSize};
use crate::gate::{DialRole, Gate, GateId, GateState};
use crate::ring::RingPhase;

/// Point-in-time view of one gate.
#[derive(Clone, Debug, PartialEq)]
pub struct GateStatus {
    pub id: GateId,
    pub name: String,
    pub address: Address,
    pub size: GateSize,
    pub state: GateState,
    pub role: Option<DialRole>,
    /// Symbols committed by the current attempt.
    pub dialed: Address,
    pub chevrons: usize,
    /// Name of the gate on the other end, dialing or linked.
    pub peer: Option<String>,
    pub ring_phase: RingPhase,
    pub ring_angle: f32,
    pub locked: bool,
    pub locked_invalid: bool,
    pub stopping: bool,
}

impl GateStatus {
    /// Captures `gate`, resolving its peer's name against `gates`.
    #[must_use]
    pub fn capture(gate: &Gate, gates: &[Gate]) -> Self {
        let attempt = gate.attempt();
        let peer_id = gate.linked_gate().or_else(|| {
            attempt.and_then(|attempt| match attempt.role {
                DialRole::Inbound { from, .. } => Some(from),
                DialRole::Outgoing(_) => attempt.destination,
            })
        });
        let peer = peer_id
            .and_then(|id| gates.get(id.index()))
            .map(|peer| String::from(peer.name()));

        Self {
            id: gate.id(),
            name: String::from(gate.name()),
            address: gate.address().clone(),
            size: gate.size(),
            state: gate.state(),
            role: attempt.map(|attempt| attempt.role),
            dialed: gate.dialing_address().clone(),
            chevrons: gate.active_chevron_count(),
            peer,
            ring_phase: gate.ring().phase(),
            ring_angle: gate.ring().angle(),
            locked: gate.is_locked(),
            locked_invalid: gate.is_locked_invalid(),
            stopping: gate.should_stop_dialing(),
        }
    }
}

/// Renders a [`GateStatus`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    status: &'a GateStatus,
}

impl<'a> StatusFormatter<'a> {
    #[must_use]
    pub const fn new(status: &'a GateStatus) -> Self {
        Self { status }
    }

    /// Writes the summary line (e.g. `earth 1-2-3-4-5-6-7 dialing fast-out chevrons=3/7 peer=abydos`).
    pub fn write_summary_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let status = self.status;
        write!(writer, "{} {} {}", status.name, status.address, status.state)?;
        match status.role {
            Some(DialRole::Outgoing(kind)) => write!(writer, " {}-out", kind.label())?,
            Some(DialRole::Inbound { kind, .. }) => write!(writer, " {}-in", kind.label())?,
            None => {}
        }
        write!(
            writer,
            " chevrons={}/{}",
            status.chevrons,
            status.size.symbols()
        )?;
        if let Some(peer) = &status.peer {
            write!(writer, " peer={peer}")?;
        }
        Ok(())
    }

    /// Writes the mechanism line (e.g. `ring=moving@123.4 dialed=1-2-3 flags=locked,invalid`).
    pub fn write_ring_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let status = self.status;
        write!(
            writer,
            "ring={}@{:.1} dialed={}",
            status.ring_phase.label(),
            status.ring_angle,
            status.dialed
        )?;

        let flags = [
            (status.locked, "locked"),
            (status.locked_invalid, "invalid"),
            (status.stopping, "stopping"),
        ];
        let mut first = true;
        for (_, flag) in flags.iter().filter(|(set, _)| *set) {
            writer.write_str(if first { " flags=" } else { "," })?;
            writer.write_str(flag)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::vec::Vec;
    use core::fmt::Write as _;

    use super::*;
    use crate::gate::GateConfig;

    fn gate(id: u16, name: &str, address: &[u8]) -> Gate {
        let address = Address::from_indices(address).expect("test address should build");
        Gate::new(GateId(id), GateConfig::new(name, address, GateSize::Seven))
    }

    #[test]
    fn idle_gate_renders_without_role_or_peer() {
        let gates: Vec<Gate> = alloc::vec![gate(0, "earth", &[1, 2, 3, 4, 5, 6, 7])];
        let status = GateStatus::capture(&gates[0], &gates);
        let formatter = StatusFormatter::new(&status);

        let mut summary = String::new();
        formatter
            .write_summary_line(&mut summary)
            .expect("formatting should succeed");
        assert_eq!(summary, "earth 1-2-3-4-5-6-7 idle chevrons=0/7");

        let mut ring = String::new();
        formatter
            .write_ring_line(&mut ring)
            .expect("formatting should succeed");
        assert_eq!(ring, "ring=stopped@0.0 dialed=-");
    }

    #[test]
    fn flags_are_comma_separated() {
        let gates: Vec<Gate> = alloc::vec![gate(0, "earth", &[1, 2, 3, 4, 5, 6, 7])];
        let mut status = GateStatus::capture(&gates[0], &gates);
        status.locked = true;
        status.locked_invalid = true;
        status.peer = Some(String::from("abydos"));

        let mut out = String::new();
        let formatter = StatusFormatter::new(&status);
        formatter
            .write_summary_line(&mut out)
            .expect("formatting should succeed");
        out.push('|');
        formatter
            .write_ring_line(&mut out)
            .expect("formatting should succeed");
        assert!(out.ends_with("peer=abydos|ring=stopped@0.0 dialed=- flags=locked,invalid"));
    }
}
