mod common;

use access_node_core::codec::{Command, ProtocolGeneration, RadioCodec, Reply};
use access_node_core::config::{NodeConfig, SecondPresentationPolicy};
use access_node_core::credential::CredentialId;
use access_node_core::gate::{ActivationMode, SystemState};
use access_node_core::io::{Level, OutputLine};
use access_node_core::store::AccessDecision;

use common::{ALICE, BOB, MALLORY, TestNode, node, present, queue_command, tick_at};

fn double_mode(policy: SecondPresentationPolicy) -> TestNode {
    node(
        NodeConfig::default()
            .with_initial_mode(ActivationMode::Double)
            .with_second_presentation(policy),
    )
}

/// Presents `card` on the tick at `ms`, then takes it away.
fn swipe(node: &mut TestNode, card: CredentialId, ms: u64) -> SystemState {
    node.reader_mut().card = Some(card);
    node.reader_mut().polls = 0;
    let report = tick_at(node, ms);
    assert_eq!(node.reader_mut().polls, 1, "reader should be due at {ms}ms");
    present(node, None);
    report.state
}

fn last_decision(node: &TestNode) -> Option<AccessDecision> {
    node.store().inner.log().last().map(|entry| entry.decision)
}

#[test]
fn two_distinct_cards_within_the_window_open_the_gate() {
    let mut node = double_mode(SecondPresentationPolicy::DistinctCredential);

    assert_eq!(swipe(&mut node, ALICE, 0), SystemState::TriggeredOnce);
    assert_eq!(node.outputs().relay(), Level::Low);

    assert_eq!(swipe(&mut node, BOB, 2_000), SystemState::Activated);
    assert_eq!(node.outputs().relay(), Level::High);

    assert_eq!(tick_at(&mut node, 9_999).state, SystemState::Activated);
    assert_eq!(tick_at(&mut node, 10_000).state, SystemState::Idle);
}

#[test]
fn same_card_twice_does_not_count_by_default() {
    let mut node = double_mode(SecondPresentationPolicy::DistinctCredential);

    swipe(&mut node, ALICE, 0);
    tick_at(&mut node, 500);
    assert_eq!(swipe(&mut node, ALICE, 1_000), SystemState::TriggeredOnce);
    assert_eq!(last_decision(&node), Some(AccessDecision::Repeat));
    assert_eq!(node.outputs().relay(), Level::Low);

    assert_eq!(tick_at(&mut node, 5_000).state, SystemState::TriggeredOnce);
    assert_eq!(tick_at(&mut node, 5_001).state, SystemState::Idle);
}

#[test]
fn same_card_twice_counts_under_any_valid_policy() {
    let mut node = double_mode(SecondPresentationPolicy::AnyValid);

    swipe(&mut node, ALICE, 0);
    tick_at(&mut node, 500);
    assert_eq!(swipe(&mut node, ALICE, 1_000), SystemState::Activated);
    assert_eq!(last_decision(&node), Some(AccessDecision::Granted));
}

#[test]
fn second_card_on_the_window_edge_still_counts() {
    let mut node = double_mode(SecondPresentationPolicy::DistinctCredential);

    swipe(&mut node, ALICE, 0);
    assert_eq!(swipe(&mut node, BOB, 5_000), SystemState::Activated);
}

#[test]
fn late_second_card_starts_a_new_pair_instead_of_opening() {
    let mut node = double_mode(SecondPresentationPolicy::DistinctCredential);

    swipe(&mut node, ALICE, 0);
    assert_eq!(swipe(&mut node, BOB, 5_001), SystemState::TriggeredOnce);
    assert_eq!(last_decision(&node), Some(AccessDecision::FirstOfPair));
    assert_eq!(node.outputs().relay(), Level::Low);
}

#[test]
fn unknown_second_card_keeps_the_pending_pair() {
    let mut node = double_mode(SecondPresentationPolicy::DistinctCredential);

    swipe(&mut node, ALICE, 0);
    assert_eq!(swipe(&mut node, MALLORY, 1_000), SystemState::TriggeredOnce);
    assert_eq!(last_decision(&node), Some(AccessDecision::Denied));
    assert_eq!(node.outputs().level(OutputLine::RedLed), Level::High);

    assert_eq!(swipe(&mut node, BOB, 2_000), SystemState::Activated);
}

#[test]
fn mode_commands_switch_activation_mode_over_the_air() {
    let mut node = node(NodeConfig::default());
    let codec = RadioCodec::new(ProtocolGeneration::Legacy10);

    queue_command(&mut node, Command::DoubleActivation);
    let report = tick_at(&mut node, 0);
    assert_eq!(report.reply, Some(Reply::Ok));
    assert_eq!(report.state, SystemState::Idle);
    assert_eq!(node.status().mode, ActivationMode::Double);
    assert_eq!(node.radio().sent.last(), Some(&codec.encode(Reply::Ok)));

    assert_eq!(swipe(&mut node, ALICE, 1), SystemState::TriggeredOnce);

    queue_command(&mut node, Command::SingleActivation);
    let report = tick_at(&mut node, 2);
    assert_eq!(report.state, SystemState::Idle);
    assert_eq!(node.status().mode, ActivationMode::Single);
}
