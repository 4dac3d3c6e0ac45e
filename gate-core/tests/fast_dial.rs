mod common;

use core::time::Duration;

use common::{ABYDOS, NOWHERE, address, fixture};
use gate_core::dialing::{DialError, DialType, FAST_PROFILE, NotReadyReason, StopOutcome};
use gate_core::effects::SoundCue;
use gate_core::gate::GateState;
use gate_core::telemetry::{FailureReason, TelemetryEventKind, TelemetryPayload};

#[test]
fn fast_dial_commits_after_one_interval_per_symbol() {
    let mut fx = fixture();
    fx.network
        .begin_dial(fx.earth, DialType::Fast, address(&ABYDOS))
        .expect("dial should start");
    assert_eq!(fx.state(fx.earth), GateState::Dialing);

    fx.advance_to_millis(3_500);
    assert_eq!(fx.chevrons(fx.earth), 3);
    assert_eq!(fx.state(fx.abydos), GateState::Dialing);
    assert_eq!(fx.chevrons(fx.abydos), 3, "destination mirrors each encode");

    fx.advance_to_millis(6_600);
    let earth = fx.network.gate(fx.earth).expect("earth should exist");
    assert_eq!(earth.active_chevron_count(), 7, "final chevron locks before commit");
    assert!(earth.is_busy());
    assert_eq!(fx.state(fx.earth), GateState::Dialing);

    fx.advance_to_millis(7_000);
    assert_eq!(fx.state(fx.earth), GateState::Active);
    assert_eq!(fx.state(fx.abydos), GateState::Active);
    let link = fx
        .network
        .links()
        .link_for(fx.earth)
        .expect("link should be open");
    assert!(link.is_open());
    assert_eq!(link.origin, fx.earth);
    assert_eq!(link.destination, fx.abydos);

    let effects = fx.network.effects();
    assert_eq!(effects.count_sound(fx.earth, SoundCue::LinkOpen), 1);
    assert_eq!(effects.count_sound(fx.abydos, SoundCue::LinkOpen), 1);
    assert_eq!(fx.events(TelemetryEventKind::SymbolEncoded), 6);
    assert_eq!(fx.events(TelemetryEventKind::ChevronLocked), 1);
    assert_eq!(fx.events(TelemetryEventKind::LinkEstablished(DialType::Fast)), 1);

    fx.advance_to_millis(8_000);
    assert_eq!(
        fx.network
            .gate(fx.abydos)
            .expect("abydos should exist")
            .chevrons()
            .lit_count(),
        7,
        "receiving gate shows every chevron once linked"
    );
}

#[test]
fn stop_before_the_busy_window_unwinds_both_sides() {
    let mut fx = fixture();
    fx.network
        .begin_dial(fx.earth, DialType::Fast, address(&ABYDOS))
        .expect("dial should start");
    fx.advance_to_millis(3_000);

    assert_eq!(
        fx.network.stop_dial(fx.earth).expect("stop should be accepted"),
        StopOutcome::Stopping
    );
    assert_eq!(
        fx.network.stop_dial(fx.earth).expect("repeat stop should be accepted"),
        StopOutcome::AlreadyStopping
    );

    fx.advance_to_millis(3_100);
    fx.assert_clean_idle(fx.earth);
    fx.assert_clean_idle(fx.abydos);
    assert_eq!(
        fx.network.effects().count_sound(fx.earth, SoundCue::DialFail),
        1
    );
    assert_eq!(fx.events(TelemetryEventKind::DialCancelled), 1);

    assert_eq!(
        fx.network.stop_dial(fx.earth).expect("stop on idle should be accepted"),
        StopOutcome::AlreadyIdle
    );

    fx.advance_to_millis(10_000);
    fx.assert_clean_idle(fx.earth);
    assert_eq!(fx.events(TelemetryEventKind::LinkEstablished(DialType::Fast)), 0);
}

#[test]
fn stop_inside_the_busy_window_is_applied_after_commit() {
    let mut fx = fixture();
    fx.network
        .begin_dial(fx.earth, DialType::Fast, address(&ABYDOS))
        .expect("dial should start");
    fx.advance_to_millis(6_700);

    assert_eq!(
        fx.network.stop_dial(fx.earth).expect("stop should be accepted"),
        StopOutcome::Deferred
    );
    assert_eq!(fx.state(fx.earth), GateState::Dialing);

    fx.advance_to_millis(7_100);
    fx.assert_clean_idle(fx.earth);
    fx.assert_clean_idle(fx.abydos);
    assert_eq!(fx.events(TelemetryEventKind::StopDeferred), 1);
    assert_eq!(fx.events(TelemetryEventKind::LinkEstablished(DialType::Fast)), 1);
    assert_eq!(fx.events(TelemetryEventKind::LinkClosed), 1);
    assert_eq!(
        fx.network.effects().count_sound(fx.abydos, SoundCue::LinkClose),
        1
    );
}

#[test]
fn unknown_address_holds_locked_invalid_then_resets() {
    let mut fx = fixture();
    fx.network
        .begin_dial(fx.earth, DialType::Fast, address(&NOWHERE))
        .expect("dial should start");

    fx.advance_to_millis(7_000);
    let earth = fx.network.gate(fx.earth).expect("earth should exist");
    assert_eq!(earth.state(), GateState::Dialing);
    assert!(earth.is_locked_invalid());
    assert_eq!(
        fx.network.effects().count_sound(fx.earth, SoundCue::DialFail),
        1
    );
    let failure = fx
        .network
        .telemetry()
        .latest()
        .expect("failure should be recorded");
    assert_eq!(failure.event, TelemetryEventKind::DialFailed);
    assert!(matches!(
        failure.details,
        TelemetryPayload::Failure(details)
            if details.reason == FailureReason::NotReady(NotReadyReason::NoMatch)
                && details.chevrons == 7
    ));

    fx.advance_to_millis(8_900);
    assert_eq!(fx.state(fx.earth), GateState::Dialing);
    fx.advance_to_millis(9_000);
    fx.assert_clean_idle(fx.earth);
}

#[test]
fn stopping_a_locked_invalid_gate_resets_it_early() {
    let mut fx = fixture();
    fx.network
        .begin_dial(fx.earth, DialType::Fast, address(&NOWHERE))
        .expect("dial should start");
    fx.advance_to_millis(7_500);

    assert_eq!(
        fx.network.stop_dial(fx.earth).expect("stop should be accepted"),
        StopOutcome::Stopping
    );
    fx.advance_to_millis(7_600);
    fx.assert_clean_idle(fx.earth);
    assert_eq!(
        fx.network.effects().count_sound(fx.earth, SoundCue::DialFail),
        1,
        "no second failure cue"
    );
}

#[test]
fn self_dial_and_busy_gates_are_rejected_up_front() {
    let mut fx = fixture();
    let earth_address = fx
        .network
        .gate(fx.earth)
        .expect("earth should exist")
        .address()
        .clone();
    assert_eq!(
        fx.network
            .begin_dial(fx.earth, DialType::Fast, earth_address),
        Err(DialError::SelfTarget)
    );
    fx.assert_clean_idle(fx.earth);

    fx.network
        .begin_dial(fx.earth, DialType::Fast, address(&ABYDOS))
        .expect("dial should start");
    assert!(matches!(
        fx.network
            .begin_dial(fx.earth, DialType::Fast, address(&ABYDOS)),
        Err(DialError::NotIdle {
            state: GateState::Dialing,
            ..
        })
    ));
    assert!(matches!(
        fx.network
            .begin_dial(fx.chulak, DialType::Fast, address(&[1, 2, 3])),
        Err(DialError::Address(_))
    ));
    fx.assert_clean_idle(fx.chulak);
}

#[test]
fn active_destination_fails_the_commit() {
    let mut fx = fixture();
    fx.network
        .begin_dial(fx.earth, DialType::Fast, address(&ABYDOS))
        .expect("dial should start");
    fx.advance_to_millis(7_000);
    assert_eq!(fx.state(fx.abydos), GateState::Active);

    fx.network
        .begin_dial(fx.chulak, DialType::Fast, address(&ABYDOS))
        .expect("dial should start");
    fx.advance_to_millis(14_000);

    let chulak = fx.network.gate(fx.chulak).expect("chulak should exist");
    assert!(chulak.is_locked_invalid());
    assert_eq!(fx.state(fx.abydos), GateState::Active);
    assert_eq!(
        fx.network.links().partner(fx.abydos),
        Some(fx.earth),
        "existing link is untouched"
    );

    fx.advance_to_millis(16_000);
    fx.assert_clean_idle(fx.chulak);
}

#[test]
fn short_interval_locks_after_the_last_encode() {
    let mut fx = fixture();
    let quick = FAST_PROFILE.with_symbol_interval(Duration::from_millis(200));
    fx.network
        .register_profile(quick)
        .expect("profile should register");
    fx.network
        .begin_dial(fx.earth, DialType::Fast, address(&ABYDOS))
        .expect("dial should start");

    fx.advance_to_millis(1_100);
    let earth = fx.network.gate(fx.earth).expect("earth should exist");
    assert_eq!(earth.active_chevron_count(), 5);
    assert!(!earth.is_busy(), "busy window waits for the encodes");

    fx.advance_to_millis(1_300);
    let earth = fx.network.gate(fx.earth).expect("earth should exist");
    assert_eq!(earth.active_chevron_count(), 7);
    assert!(earth.is_busy());
    assert_eq!(earth.dialing_address(), &address(&ABYDOS));

    fx.advance_to_millis(1_400);
    assert_eq!(fx.state(fx.earth), GateState::Active);
    assert_eq!(fx.state(fx.abydos), GateState::Active);
    assert_eq!(fx.events(TelemetryEventKind::DialFailed), 0);
}
