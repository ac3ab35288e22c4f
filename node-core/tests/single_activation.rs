mod common;

use access_node_core::config::NodeConfig;
use access_node_core::gate::SystemState;
use access_node_core::io::{Level, OutputLine};
use access_node_core::node::TickActivity;
use access_node_core::store::AccessDecision;

use common::{ALICE, MALLORY, node, present, run_until, tick_at};

#[test]
fn valid_card_holds_the_relay_for_the_door_enable_period() {
    let mut node = node(NodeConfig::default());
    present(&mut node, Some(ALICE));

    let report = tick_at(&mut node, 0);
    assert_eq!(report.activity, TickActivity::Credential);
    assert_eq!(report.state, SystemState::Activated);
    assert_eq!(node.outputs().relay(), Level::High);
    assert_eq!(node.outputs().level(OutputLine::GreenLed), Level::High);

    let report = run_until(&mut node, 7_999).expect("ticks ran");
    assert_eq!(
        report.state,
        SystemState::Activated,
        "a held card must not re-trigger or close the gate"
    );
    assert_eq!(node.outputs().relay(), Level::High);

    let report = tick_at(&mut node, 8_000);
    assert_eq!(report.state, SystemState::Idle);
    assert_eq!(node.outputs().relay(), Level::Low);
}

#[test]
fn second_presentation_closes_an_open_gate() {
    let mut node = node(NodeConfig::default());

    present(&mut node, Some(ALICE));
    tick_at(&mut node, 0);

    present(&mut node, None);
    assert_eq!(tick_at(&mut node, 500).activity, TickActivity::ReaderPolled);

    present(&mut node, Some(ALICE));
    let report = tick_at(&mut node, 1_000);
    assert_eq!(report.state, SystemState::Idle);
    assert_eq!(node.outputs().relay(), Level::Low);

    let decisions: Vec<AccessDecision> = node
        .store()
        .inner
        .log()
        .map(|entry| entry.decision)
        .collect();
    assert_eq!(decisions, [AccessDecision::Granted, AccessDecision::Closed]);
}

#[test]
fn held_card_toggles_when_suppression_is_off() {
    let mut node = node(NodeConfig::default().with_hold_suppression(false));
    present(&mut node, Some(ALICE));

    assert_eq!(tick_at(&mut node, 0).state, SystemState::Activated);
    assert_eq!(tick_at(&mut node, 500).state, SystemState::Idle);
    assert_eq!(tick_at(&mut node, 1_000).state, SystemState::Activated);
}

#[test]
fn reader_is_polled_once_per_read_interval() {
    let mut node = node(NodeConfig::default());
    tick_at(&mut node, 0);
    run_until(&mut node, 1_499);

    assert_eq!(node.reader_mut().polls, 3);
}

#[test]
fn unknown_card_is_denied_logged_and_flashes_red() {
    let mut node = node(NodeConfig::default());
    present(&mut node, Some(MALLORY));

    let report = tick_at(&mut node, 0);
    assert_eq!(report.state, SystemState::Idle);
    assert_eq!(node.outputs().relay(), Level::Low);
    assert_eq!(node.outputs().level(OutputLine::RedLed), Level::High);

    let entry = node.store().inner.log().last().copied().expect("logged");
    assert_eq!(entry.credential, MALLORY);
    assert_eq!(entry.decision, AccessDecision::Denied);

    tick_at(&mut node, 1_700);
    assert_eq!(node.outputs().level(OutputLine::RedLed), Level::Low);
}

#[test]
fn green_heartbeat_blinks_while_idle() {
    let mut node = node(NodeConfig::default());

    tick_at(&mut node, 0);
    assert_eq!(node.outputs().level(OutputLine::GreenLed), Level::High);

    tick_at(&mut node, 600);
    assert_eq!(node.outputs().level(OutputLine::GreenLed), Level::Low);

    tick_at(&mut node, 1_100);
    assert_eq!(node.outputs().level(OutputLine::GreenLed), Level::High);
}
