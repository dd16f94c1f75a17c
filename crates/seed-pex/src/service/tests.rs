//! Tests for the seed reactor service

use std::sync::Arc;

use super::*;
use crate::domain::{
    CandidateAddress, DialError, NetworkAddress, PexMessage, ReactorConfig, ReactorError,
    WireAddress,
};
use crate::ports::{Envelope, Peer, Reactor};
use crate::testing::{
    node_id, private_addr, routable_addr, BookCall, MockExchange, MockPeer, MockSwitch,
    RecordingAddressBook,
};

struct Harness {
    book: Arc<RecordingAddressBook>,
    switch: Arc<MockSwitch>,
    base: Arc<MockExchange>,
    reactor: SeedReactor,
}

fn harness(config: ReactorConfig) -> Harness {
    let book = Arc::new(RecordingAddressBook::new());
    let switch = Arc::new(MockSwitch::new(routable_addr(250)));
    let base = Arc::new(MockExchange::new());
    let reactor = SeedReactor::new(config, book.clone(), switch.clone(), base.clone()).unwrap();
    Harness {
        book,
        switch,
        base,
        reactor,
    }
}

fn context(h: &Harness, strict: bool) -> DialContext {
    DialContext::new(h.book.clone(), h.switch.clone(), strict)
}

fn list(addrs: &[NetworkAddress]) -> PexMessage {
    PexMessage::address_list(addrs)
}

fn envelope(peer: &Arc<MockPeer>, message: PexMessage) -> Envelope {
    Envelope::new(peer.clone() as Arc<dyn Peer>, message)
}

// =============================================================================
// TEST GROUP 1: Message handling
// =============================================================================

#[test]
fn test_address_request_is_delegated_verbatim() {
    let h = harness(ReactorConfig::for_testing());
    let sender = Arc::new(MockPeer::inbound(routable_addr(1)));

    h.reactor.receive(envelope(&sender, PexMessage::AddressRequest));

    assert_eq!(
        h.base.received(),
        vec![(sender.id(), PexMessage::AddressRequest)]
    );
    assert_eq!(h.reactor.queued(), 0);
}

#[test]
fn test_address_list_enqueues_every_address() {
    let h = harness(ReactorConfig::for_testing());
    let sender = Arc::new(MockPeer::inbound(routable_addr(1)));

    h.reactor.receive(envelope(
        &sender,
        list(&[routable_addr(2), routable_addr(3), private_addr(4)]),
    ));

    assert_eq!(h.reactor.queued(), 3);
    assert!(h.base.received().is_empty());
    assert!(h.book.calls().is_empty());
}

#[test]
fn test_malformed_address_list_enqueues_nothing() {
    let h = harness(ReactorConfig::for_testing());
    let sender = Arc::new(MockPeer::inbound(routable_addr(1)));

    let mut addrs: Vec<WireAddress> = [routable_addr(2), routable_addr(3)]
        .iter()
        .map(WireAddress::from)
        .collect();
    addrs.push(WireAddress {
        id: "not-hex".into(),
        ip: "1.1.1.1".into(),
        port: 26656,
    });
    h.reactor
        .receive(envelope(&sender, PexMessage::AddressList { addrs }));
    assert_eq!(h.reactor.queued(), 0);

    h.reactor.receive(envelope(&sender, list(&[routable_addr(5)])));
    assert_eq!(h.reactor.queued(), 1);
}

#[test]
fn test_unknown_message_is_ignored() {
    let h = harness(ReactorConfig::for_testing());
    let sender = Arc::new(MockPeer::inbound(routable_addr(1)));

    h.reactor.receive(envelope(&sender, PexMessage::Unknown));

    assert!(h.base.received().is_empty());
    assert_eq!(h.reactor.queued(), 0);
}

#[test]
fn test_full_queue_drops_new_items() {
    let mut config = ReactorConfig::for_testing();
    config.dial_queue_capacity = 2;
    let h = harness(config);
    let sender = MockPeer::inbound(routable_addr(1));

    let queued = h.reactor.handle_address_list(
        &sender,
        &[routable_addr(2), routable_addr(3), routable_addr(4)]
            .iter()
            .map(WireAddress::from)
            .collect::<Vec<_>>(),
    );

    assert_eq!(queued, 2);
    assert_eq!(h.reactor.queued(), 2);
}

#[tokio::test]
async fn test_queue_is_fifo() {
    let queue = DialQueue::new(4);
    for n in 1..=3 {
        assert_eq!(
            queue.try_enqueue(CandidateAddress::new(routable_addr(n), None)),
            EnqueueOutcome::Enqueued
        );
    }
    assert_eq!(queue.len(), 3);
    for n in 1..=3 {
        assert_eq!(queue.next().await.unwrap().addr, routable_addr(n));
    }
    assert!(queue.is_empty());
    assert_eq!(queue.capacity(), 4);
}

// =============================================================================
// TEST GROUP 2: Peer admission
// =============================================================================

#[test]
fn test_add_peer_without_address_is_rejected() {
    let h = harness(ReactorConfig::for_testing());
    h.reactor
        .add_peer(Arc::new(MockPeer::without_address(node_id(1))));

    assert!(h.book.calls().is_empty());
    assert!(h.base.added().is_empty());
}

#[test]
fn test_add_peer_non_routable_rejected_in_strict_mode() {
    let h = harness(ReactorConfig::for_testing());
    h.reactor
        .add_peer(Arc::new(MockPeer::inbound(private_addr(1))));

    assert!(h.book.calls().is_empty());
    assert!(h.base.added().is_empty());
}

#[test]
fn test_add_peer_non_routable_accepted_when_lenient() {
    let mut config = ReactorConfig::for_testing();
    config.strict_routability = false;
    let h = harness(config);
    let addr = private_addr(1);
    h.reactor.add_peer(Arc::new(MockPeer::inbound(addr)));

    assert_eq!(h.book.calls(), vec![BookCall::MarkGood(addr.id)]);
    assert_eq!(h.base.added(), vec![addr.id]);
}

#[test]
fn test_add_peer_marks_good_then_delegates() {
    let h = harness(ReactorConfig::for_testing());
    let addr = routable_addr(1);
    h.reactor.add_peer(Arc::new(MockPeer::inbound(addr)));

    assert_eq!(h.book.calls(), vec![BookCall::MarkGood(addr.id)]);
    assert_eq!(h.base.added(), vec![addr.id]);
}

#[test]
fn test_remove_peer_is_delegated() {
    let h = harness(ReactorConfig::for_testing());
    let peer = MockPeer::inbound(routable_addr(1));
    h.reactor.remove_peer(&peer, "closed");
    assert_eq!(h.base.removed(), vec![peer.id()]);
}

#[test]
fn test_peer_selection_reads_book() {
    let h = harness(ReactorConfig::for_testing());
    h.book.set_selection(vec![routable_addr(1), routable_addr(2)]);
    assert_eq!(
        h.reactor.peer_selection(),
        vec![routable_addr(1), routable_addr(2)]
    );
}

// =============================================================================
// TEST GROUP 3: Dial processing
// =============================================================================

#[tokio::test]
async fn test_process_success_adds_then_marks_good() {
    let h = harness(ReactorConfig::for_testing());
    let ctx = context(&h, true);
    let target = routable_addr(1);
    let src = routable_addr(2);

    let outcome = ctx.process(CandidateAddress::new(target, Some(src))).await;

    assert_eq!(outcome, DialOutcome::Registered);
    assert_eq!(
        h.book.calls(),
        vec![
            BookCall::AddAddress { addr: target, src },
            BookCall::MarkGood(target.id),
        ]
    );
}

#[tokio::test]
async fn test_process_without_source_uses_self_address() {
    let h = harness(ReactorConfig::for_testing());
    let ctx = context(&h, true);
    let target = routable_addr(1);

    ctx.process(CandidateAddress::new(target, None)).await;

    assert_eq!(
        h.book.calls()[0],
        BookCall::AddAddress {
            addr: target,
            src: routable_addr(250)
        }
    );
}

#[tokio::test]
async fn test_process_failure_marks_attempt_only() {
    let h = harness(ReactorConfig::for_testing());
    let ctx = context(&h, true);
    let target = routable_addr(1);
    h.switch.fail_dials_to(target);

    let outcome = ctx.process(CandidateAddress::new(target, None)).await;

    assert!(matches!(outcome, DialOutcome::DialFailed(_)));
    assert_eq!(h.book.calls(), vec![BookCall::MarkAttempt(target)]);
}

#[tokio::test]
async fn test_process_strict_skips_non_routable_without_side_effects() {
    let h = harness(ReactorConfig::for_testing());
    let ctx = context(&h, true);

    let outcome = ctx.process(CandidateAddress::new(private_addr(1), None)).await;

    assert_eq!(outcome, DialOutcome::Skipped(SkipReason::NotRoutable));
    assert_eq!(h.switch.dial_count(), 0);
    assert!(h.book.calls().is_empty());
}

#[tokio::test]
async fn test_process_lenient_dials_non_routable() {
    let h = harness(ReactorConfig::for_testing());
    let ctx = context(&h, false);

    let outcome = ctx.process(CandidateAddress::new(private_addr(1), None)).await;

    assert_eq!(outcome, DialOutcome::Registered);
    assert_eq!(h.switch.dial_count(), 1);
}

#[tokio::test]
async fn test_process_skips_existing_connection() {
    let h = harness(ReactorConfig::for_testing());
    let ctx = context(&h, true);
    let target = routable_addr(1);
    h.switch.mark_existing(target);

    let outcome = ctx.process(CandidateAddress::new(target, None)).await;

    assert_eq!(outcome, DialOutcome::Skipped(SkipReason::AlreadyConnected));
    assert_eq!(h.switch.dial_count(), 0);
    assert!(h.book.calls().is_empty());
}

#[tokio::test]
async fn test_process_switch_limit_refusal_leaves_book_untouched() {
    let h = harness(ReactorConfig::for_testing());
    let ctx = context(&h, true);
    let target = routable_addr(1);
    h.switch.refuse_dials_to(target, DialError::LimitReached);

    let outcome = ctx.process(CandidateAddress::new(target, None)).await;

    assert_eq!(outcome, DialOutcome::Skipped(SkipReason::Refused));
    assert!(h.book.calls().is_empty());
}

#[tokio::test]
async fn test_process_lost_dial_race_is_not_an_attempt() {
    let h = harness(ReactorConfig::for_testing());
    let ctx = context(&h, true);
    let target = routable_addr(1);
    h.switch.refuse_dials_to(target, DialError::AlreadyConnected);

    let outcome = ctx.process(CandidateAddress::new(target, None)).await;

    assert_eq!(outcome, DialOutcome::Skipped(SkipReason::AlreadyConnected));
    assert!(h.book.calls().is_empty());
}

#[tokio::test]
async fn test_process_skips_unspecified_address() {
    let h = harness(ReactorConfig::for_testing());
    let ctx = context(&h, false);
    let mut target = routable_addr(1);
    target.port = 0;

    let outcome = ctx.process(CandidateAddress::new(target, None)).await;

    assert_eq!(outcome, DialOutcome::Skipped(SkipReason::Unspecified));
    assert_eq!(h.switch.dial_count(), 0);
}

#[tokio::test]
async fn test_process_registration_failure_is_not_marked_good() {
    let h = harness(ReactorConfig::for_testing());
    let ctx = context(&h, true);
    h.book.fail_add_address(true);

    let outcome = ctx.process(CandidateAddress::new(routable_addr(1), None)).await;

    assert!(matches!(outcome, DialOutcome::RegistrationFailed(_)));
    assert_eq!(h.book.add_address_count(), 1);
    assert_eq!(h.book.mark_good_count(), 0);
}

// =============================================================================
// TEST GROUP 4: Lifecycle
// =============================================================================

#[test]
fn test_invalid_config_rejected() {
    let mut config = ReactorConfig::for_testing();
    config.dial_workers = 0;
    let result = SeedReactor::new(
        config,
        Arc::new(RecordingAddressBook::new()),
        Arc::new(MockSwitch::new(routable_addr(250))),
        Arc::new(MockExchange::new()),
    );
    assert!(matches!(result, Err(ReactorError::InvalidConfig(_))));
}

#[test]
fn test_start_outside_runtime_fails() {
    let h = harness(ReactorConfig::for_testing());
    assert_eq!(h.reactor.start(), Err(ReactorError::NoRuntime));
    assert_eq!(h.base.start_count(), 0);
}

#[tokio::test]
async fn test_start_and_stop() {
    let h = harness(ReactorConfig::for_testing());
    h.reactor.start().unwrap();
    assert!(h.reactor.is_running());
    assert_eq!(h.base.start_count(), 1);

    assert_eq!(h.reactor.start(), Err(ReactorError::AlreadyStarted));

    h.reactor.stop().unwrap();
    h.reactor.wait_for_workers().await;
    assert!(!h.reactor.is_running());
    assert_eq!(h.base.stop_count(), 1);

    assert_eq!(h.reactor.stop(), Err(ReactorError::NotRunning));
    assert_eq!(h.reactor.start(), Err(ReactorError::NotRunning));
}

#[tokio::test]
async fn test_stop_before_start_fails() {
    let h = harness(ReactorConfig::for_testing());
    assert_eq!(h.reactor.stop(), Err(ReactorError::NotRunning));
    assert_eq!(h.base.stop_count(), 0);
}

#[tokio::test]
async fn test_base_start_failure_is_fatal_and_stops_workers() {
    let h = harness(ReactorConfig::for_testing());
    h.base.fail_start();

    let result = h.reactor.start();

    assert!(matches!(result, Err(ReactorError::BaseStart(_))));
    assert!(!h.reactor.is_running());
    // Workers were signalled and exit on their own.
    h.reactor.wait_for_workers().await;
}
