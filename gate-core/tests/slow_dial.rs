mod common;

use common::{ABYDOS, NOWHERE, address, fixture};
use gate_core::dialing::{DialType, NotReadyReason, StopOutcome};
use gate_core::effects::SoundCue;
use gate_core::gate::GateState;
use gate_core::ring::RingPhase;
use gate_core::telemetry::{FailureReason, TelemetryEventKind, TelemetryPayload};

#[test]
fn slow_dial_engages_one_chevron_per_rotation() {
    let mut fx = fixture();
    fx.network
        .begin_dial(fx.earth, DialType::Slow, address(&ABYDOS))
        .expect("dial should start");

    fx.advance_to_millis(100);
    let earth = fx.network.gate(fx.earth).expect("earth should exist");
    assert!(earth.ring().is_busy(), "ring spins toward the first symbol");
    assert_eq!(earth.active_chevron_count(), 0);
    assert_eq!(
        fx.state(fx.abydos),
        GateState::Idle,
        "destination is not disturbed before the commit"
    );

    fx.advance_to_millis(60_000);
    assert_eq!(fx.state(fx.earth), GateState::Active);
    assert_eq!(fx.state(fx.abydos), GateState::Active);
    assert_eq!(fx.events(TelemetryEventKind::SymbolEncoded), 6);
    assert_eq!(fx.events(TelemetryEventKind::ChevronLocked), 1);
    assert_eq!(fx.events(TelemetryEventKind::LinkEstablished(DialType::Slow)), 1);

    let effects = fx.network.effects();
    assert_eq!(effects.count_sound(fx.earth, SoundCue::RingSpin), 7);
    assert_eq!(effects.count_sound(fx.earth, SoundCue::ChevronEncode), 6);
    assert_eq!(effects.count_sound(fx.earth, SoundCue::ChevronLock), 1);
    assert_eq!(effects.count_sound(fx.earth, SoundCue::DialFail), 0);

    let earth = fx.network.gate(fx.earth).expect("earth should exist");
    assert_eq!(earth.dialing_address(), &address(&ABYDOS));
    assert_eq!(earth.chevrons().lit_count(), 7);
}

#[test]
fn symbols_are_recorded_with_their_spacing() {
    let mut fx = fixture();
    fx.network
        .begin_dial(fx.earth, DialType::Slow, address(&ABYDOS))
        .expect("dial should start");
    fx.advance_to_millis(60_000);

    let spacings: Vec<_> = fx
        .network
        .telemetry()
        .oldest_first()
        .filter_map(|record| match record.details {
            TelemetryPayload::Symbol(symbol) => Some((symbol.index, symbol.elapsed_since_previous)),
            _ => None,
        })
        .collect();
    assert_eq!(spacings.len(), 7);
    assert_eq!(spacings[0], (0, None));
    for (position, (index, elapsed)) in spacings.iter().enumerate().skip(1) {
        assert_eq!(usize::from(*index), position);
        let elapsed = elapsed.expect("later symbols carry their spacing");
        assert!(
            elapsed.as_millis() >= 2_000,
            "engage and pause separate symbols, got {elapsed:?}"
        );
    }
}

#[test]
fn stop_mid_rotation_coasts_and_resets() {
    let mut fx = fixture();
    fx.network
        .begin_dial(fx.earth, DialType::Slow, address(&ABYDOS))
        .expect("dial should start");
    fx.advance_to_millis(1_000);
    assert_eq!(
        fx.network
            .gate(fx.earth)
            .expect("earth should exist")
            .ring()
            .phase(),
        RingPhase::FullSpeed
    );

    assert_eq!(
        fx.network.stop_dial(fx.earth).expect("stop should be accepted"),
        StopOutcome::Stopping
    );
    fx.advance_to_millis(1_100);
    fx.assert_clean_idle(fx.earth);
    assert_eq!(
        fx.network.effects().count_sound(fx.earth, SoundCue::DialFail),
        1
    );
    assert_eq!(
        fx.network.stop_dial(fx.earth).expect("stop should be accepted"),
        StopOutcome::AlreadyIdle
    );
}

#[test]
fn unknown_address_fails_only_at_the_final_chevron() {
    let mut fx = fixture();
    fx.network
        .begin_dial(fx.earth, DialType::Slow, address(&NOWHERE))
        .expect("dial should start");

    fx.advance_to_millis(5_000);
    assert_eq!(fx.state(fx.earth), GateState::Dialing);
    assert!(!fx.network.gate(fx.earth).expect("earth should exist").is_locked_invalid());

    fx.advance_to_millis(90_000);
    fx.assert_clean_idle(fx.earth);
    let failures: Vec<_> = fx
        .network
        .telemetry()
        .oldest_first()
        .filter_map(|record| match record.details {
            TelemetryPayload::Failure(failure) => Some(failure.reason),
            _ => None,
        })
        .collect();
    assert_eq!(
        failures,
        [FailureReason::NotReady(NotReadyReason::NoMatch)]
    );
}

#[test]
fn give_up_deadline_ends_a_stalled_dial() {
    let mut fx = fixture();
    let quick = gate_core::dialing::SLOW_PROFILE
        .with_give_up_after(Some(core::time::Duration::from_secs(3)));
    fx.network
        .register_profile(quick)
        .expect("profile should register");
    fx.network
        .begin_dial(fx.earth, DialType::Slow, address(&ABYDOS))
        .expect("dial should start");

    fx.advance_to_millis(3_100);
    fx.assert_clean_idle(fx.earth);
    assert_eq!(fx.events(TelemetryEventKind::DialFailed), 1);
    assert!(matches!(
        fx.network.telemetry().latest().map(|record| record.details),
        Some(TelemetryPayload::Failure(failure)) if failure.reason == FailureReason::GaveUp
    ));
}

#[test]
fn stop_after_two_chevrons_leaves_nothing_behind() {
    let mut fx = fixture();
    fx.network
        .begin_dial(fx.earth, DialType::Slow, address(&ABYDOS))
        .expect("dial should start");

    let mut now = 0;
    while fx.chevrons(fx.earth) < 2 {
        now += 20;
        assert!(now < 30_000, "two chevrons should engage well before the give-up");
        fx.advance_to_millis(now);
    }
    assert_eq!(fx.chevrons(fx.earth), 2);

    assert_eq!(
        fx.network.stop_dial(fx.earth).expect("stop should be accepted"),
        StopOutcome::Stopping
    );
    fx.advance_to_millis(now + 100);
    fx.assert_clean_idle(fx.earth);
    assert_eq!(fx.network.pending_in(fx.earth, gate_core::dialing::Lane::Dialing), 0);
    assert_eq!(
        fx.network.gate(fx.earth).expect("earth should exist").dialing_address(),
        &gate_core::address::Address::empty()
    );
    assert_eq!(fx.state(fx.abydos), GateState::Idle);
}
