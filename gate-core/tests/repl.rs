mod common;

use common::fixture;
use gate_core::dialing::StopOutcome;
use gate_core::gate::GateState;
use gate_core::repl::commands::{CommandError, CommandExecutor, CommandOutcome};

#[test]
fn scripted_manual_dial_through_the_executor() {
    let fx = fixture();
    let (earth, abydos) = (fx.earth, fx.abydos);
    let mut executor = CommandExecutor::new(fx.network);

    for symbol in ["26", "6", "14", "31", "11", "29"] {
        let line = format!("encode earth {symbol}");
        let outcome = executor.execute(&line).expect("encode should succeed");
        assert!(matches!(outcome, CommandOutcome::Step { gate, .. } if gate == earth));
        executor.execute("advance 5s").expect("advance should succeed");
    }
    executor.execute("lock earth 0").expect("lock should succeed");
    let outcome = executor.execute("advance 5s").expect("advance should succeed");
    assert!(matches!(outcome, CommandOutcome::Advanced { fired, .. } if fired > 0));

    let network = executor.control();
    assert_eq!(network.gate(earth).map(|gate| gate.state()), Some(GateState::Active));
    assert_eq!(network.gate(abydos).map(|gate| gate.state()), Some(GateState::Active));

    let status = executor
        .execute("status abydos")
        .expect("status should succeed")
        .to_string();
    assert!(status.starts_with("abydos 26-6-14-31-11-29-0 active"), "{status}");
    assert!(status.contains("peer=earth"), "{status}");
}

#[test]
fn failures_leave_the_network_untouched() {
    let mut executor = CommandExecutor::new(fixture().network);

    assert!(matches!(
        executor.execute("dial earth fast 1-2-3"),
        Err(CommandError::Dial(_))
    ));
    assert!(matches!(
        executor.execute("dial atlantis 1-2-3-4-5-6-7"),
        Err(CommandError::UnknownGate("atlantis"))
    ));
    assert!(matches!(
        executor.execute("dial earth warp 1-2-3-4-5-6-7"),
        Err(CommandError::Parse(_))
    ));
    assert!(matches!(
        executor.execute("stop earth"),
        Ok(CommandOutcome::Stop {
            outcome: StopOutcome::AlreadyIdle,
            ..
        })
    ));
    assert!(
        executor
            .control()
            .gates()
            .iter()
            .all(|gate| gate.state() == GateState::Idle)
    );
}
