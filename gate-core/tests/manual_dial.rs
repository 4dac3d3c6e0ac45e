mod common;

use common::{ABYDOS, Fixture, address, fixture};
use gate_core::address::{AddressError, Symbol};
use gate_core::dialing::{DialType, ManualStepError, StopOutcome};
use gate_core::effects::SoundCue;
use gate_core::gate::GateState;
use gate_core::telemetry::{FailureReason, TelemetryEventKind, TelemetryPayload};

const STEP_MS: u64 = 5_000;

fn encode_and_settle(fx: &mut Fixture, symbol: u8) {
    let now = fx.network.now().as_millis();
    fx.network
        .encode_step(fx.earth, Symbol(symbol))
        .expect("symbol should be accepted");
    fx.advance_to_millis(now + STEP_MS);
}

#[test]
fn manual_dial_links_after_the_lock_engages() {
    let mut fx = fixture();
    let ack = fx
        .network
        .encode_step(fx.earth, Symbol(ABYDOS[0]))
        .expect("first symbol should start the dial");
    assert_eq!((ack.index, ack.locks), (0, false));
    let earth = fx.network.gate(fx.earth).expect("earth should exist");
    assert_eq!(earth.state(), GateState::Dialing);
    assert_eq!(earth.dial_type(), Some(DialType::Manual));
    fx.advance_to_millis(STEP_MS);

    for symbol in &ABYDOS[1..6] {
        encode_and_settle(&mut fx, *symbol);
    }
    assert_eq!(fx.chevrons(fx.earth), 6);
    assert_eq!(fx.state(fx.abydos), GateState::Idle);

    let ack = fx
        .network
        .lock_step(fx.earth, Symbol(ABYDOS[6]))
        .expect("final symbol should be accepted");
    assert_eq!((ack.index, ack.locks), (6, true));

    fx.advance_to_millis(fx.network.now().as_millis() + STEP_MS);
    assert_eq!(fx.state(fx.earth), GateState::Active);
    assert_eq!(fx.state(fx.abydos), GateState::Active);
    assert_eq!(fx.events(TelemetryEventKind::LinkEstablished(DialType::Manual)), 1);
    assert_eq!(
        fx.network.effects().count_sound(fx.earth, SoundCue::ChevronLock),
        1
    );
}

#[test]
fn a_second_symbol_waits_for_the_first() {
    let mut fx = fixture();
    fx.network
        .encode_step(fx.earth, Symbol(ABYDOS[0]))
        .expect("symbol should be accepted");
    assert_eq!(
        fx.network.encode_step(fx.earth, Symbol(ABYDOS[1])),
        Err(ManualStepError::StepInFlight)
    );

    fx.advance_to_millis(500);
    assert_eq!(
        fx.network.encode_step(fx.earth, Symbol(ABYDOS[1])),
        Err(ManualStepError::StepInFlight),
        "ring is still travelling"
    );

    fx.advance_to_millis(STEP_MS);
    fx.network
        .encode_step(fx.earth, Symbol(ABYDOS[1]))
        .expect("symbol should be accepted once engaged");
}

#[test]
fn symbol_count_is_enforced_in_both_directions() {
    let mut fx = fixture();
    assert_eq!(
        fx.network.lock_step(fx.earth, Symbol(0)),
        Err(ManualStepError::TooFewSymbols {
            expected: 6,
            found: 0
        })
    );
    fx.assert_clean_idle(fx.earth);

    encode_and_settle(&mut fx, ABYDOS[0]);
    assert_eq!(
        fx.network.lock_step(fx.earth, Symbol(ABYDOS[1])),
        Err(ManualStepError::TooFewSymbols {
            expected: 6,
            found: 1
        })
    );
    assert_eq!(
        fx.network.encode_step(fx.earth, Symbol(ABYDOS[0])),
        Err(ManualStepError::Address(AddressError::DuplicateSymbol(
            Symbol(ABYDOS[0])
        )))
    );
    assert!(matches!(
        fx.network.encode_step(fx.earth, Symbol(39)),
        Err(ManualStepError::Address(AddressError::UnknownSymbol { .. }))
    ));

    for symbol in &ABYDOS[1..6] {
        encode_and_settle(&mut fx, *symbol);
    }
    assert_eq!(
        fx.network.encode_step(fx.earth, Symbol(38)),
        Err(ManualStepError::TooManySymbols { max: 6 })
    );
}

#[test]
fn manual_steps_need_a_manual_dial() {
    let mut fx = fixture();
    fx.network
        .begin_dial(fx.earth, DialType::Fast, address(&ABYDOS))
        .expect("dial should start");
    assert_eq!(
        fx.network.encode_step(fx.earth, Symbol(3)),
        Err(ManualStepError::NotManual { gate: fx.earth })
    );
    assert!(matches!(
        fx.network.begin_dial(fx.chulak, DialType::Manual, address(&ABYDOS)),
        Err(gate_core::dialing::DialError::ManualAddress)
    ));
}

#[test]
fn stopped_manual_dial_rejects_further_symbols() {
    let mut fx = fixture();
    encode_and_settle(&mut fx, ABYDOS[0]);
    assert_eq!(
        fx.network.stop_dial(fx.earth).expect("stop should be accepted"),
        StopOutcome::Stopping
    );
    assert_eq!(
        fx.network.encode_step(fx.earth, Symbol(ABYDOS[1])),
        Err(ManualStepError::Stopping)
    );
    fx.advance_to_millis(STEP_MS + 100);
    fx.assert_clean_idle(fx.earth);
}

#[test]
fn idle_manual_dial_gives_up() {
    let mut fx = fixture();
    encode_and_settle(&mut fx, ABYDOS[0]);
    assert_eq!(fx.state(fx.earth), GateState::Dialing);

    fx.advance_to_millis(40_000);
    fx.assert_clean_idle(fx.earth);
    assert!(matches!(
        fx.network.telemetry().latest().map(|record| record.details),
        Some(TelemetryPayload::Failure(failure))
            if failure.reason == FailureReason::GaveUp && failure.chevrons == 1
    ));
    assert_eq!(
        fx.network.effects().count_sound(fx.earth, SoundCue::DialFail),
        1
    );
}
