//! End-to-end reactor scenarios: running workers, mock transport.

use std::sync::Arc;
use std::time::Duration;

use seed_pex::testing::{
    private_addr, routable_addr, BookCall, MockExchange, MockPeer, MockSwitch, RecordingAddressBook,
};
use seed_pex::{
    AddrBook, AddrBookConfig, AddressState, Envelope, NetworkAddress, Peer, PexMessage, Reactor,
    ReactorConfig, SeedReactor, SystemTimeSource, WireAddress,
};

struct Setup {
    book: Arc<RecordingAddressBook>,
    switch: Arc<MockSwitch>,
    reactor: SeedReactor,
}

fn setup(config: ReactorConfig) -> Setup {
    let book = Arc::new(RecordingAddressBook::new());
    let switch = Arc::new(MockSwitch::new(routable_addr(250)));
    let reactor = SeedReactor::new(
        config,
        book.clone(),
        switch.clone(),
        Arc::new(MockExchange::new()),
    )
    .unwrap();
    Setup {
        book,
        switch,
        reactor,
    }
}

fn gossip(reactor: &dyn Reactor, from: NetworkAddress, addrs: &[NetworkAddress]) {
    let peer: Arc<dyn Peer> = Arc::new(MockPeer::inbound(from));
    reactor.receive(Envelope::new(peer, PexMessage::address_list(addrs)));
}

async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..300 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test]
async fn gossiped_addresses_are_dialed_then_stored_then_marked_good() {
    let s = setup(ReactorConfig::for_testing());
    s.reactor.start().unwrap();

    let reporter = routable_addr(9);
    gossip(&s.reactor, reporter, &[routable_addr(1), routable_addr(2)]);

    eventually("both marked good", || s.book.mark_good_count() == 2).await;
    let calls = s.book.calls();
    for addr in [routable_addr(1), routable_addr(2)] {
        let added = calls
            .iter()
            .position(|c| *c == BookCall::AddAddress { addr, src: reporter })
            .unwrap();
        let good = calls
            .iter()
            .position(|c| *c == BookCall::MarkGood(addr.id))
            .unwrap();
        assert!(added < good, "{addr} marked good before it was stored");
    }

    s.reactor.stop().unwrap();
    s.reactor.wait_for_workers().await;
}

#[tokio::test]
async fn failed_dials_are_recorded_as_attempts_only() {
    let s = setup(ReactorConfig::for_testing());
    s.switch.fail_dials_to(routable_addr(1));
    s.reactor.start().unwrap();

    gossip(&s.reactor, routable_addr(9), &[routable_addr(1)]);

    eventually("attempt recorded", || s.book.mark_attempt_count() == 1).await;
    assert_eq!(s.book.calls(), vec![BookCall::MarkAttempt(routable_addr(1))]);

    s.reactor.stop().unwrap();
    s.reactor.wait_for_workers().await;
}

#[tokio::test]
async fn strict_mode_never_dials_private_addresses() {
    let s = setup(ReactorConfig::for_testing());
    s.reactor.start().unwrap();

    gossip(&s.reactor, routable_addr(9), &[private_addr(1), routable_addr(2)]);

    eventually("public address stored", || s.book.mark_good_count() == 1).await;
    assert_eq!(s.switch.dialed(), vec![routable_addr(2)]);

    s.reactor.stop().unwrap();
    s.reactor.wait_for_workers().await;
}

#[tokio::test]
async fn duplicate_candidates_are_dialed_once() {
    let s = setup(ReactorConfig::for_testing());
    s.switch.set_dial_delay(Duration::from_millis(50));
    s.reactor.start().unwrap();

    let addr = routable_addr(1);
    gossip(&s.reactor, routable_addr(9), &[addr, addr]);
    gossip(&s.reactor, routable_addr(8), &[addr]);

    eventually("queue drained", || s.reactor.queued() == 0).await;
    eventually("dial finished", || s.book.mark_good_count() == 1).await;
    assert_eq!(s.switch.dial_count(), 1);

    s.reactor.stop().unwrap();
    s.reactor.wait_for_workers().await;
}

#[tokio::test]
async fn overflow_drops_latest_and_filters_after_dequeue() {
    let s = setup(ReactorConfig {
        dial_queue_capacity: 2,
        dial_workers: 1,
        strict_routability: true,
    });
    s.reactor.start().unwrap();

    let (a, b, c) = (routable_addr(1), private_addr(2), routable_addr(3));
    let reporter = routable_addr(9);
    gossip(&s.reactor, reporter, &[a, b, c]);

    eventually("first address stored", || s.book.mark_good_count() == 1).await;
    eventually("queue drained", || s.reactor.queued() == 0).await;
    s.reactor.stop().unwrap();
    s.reactor.wait_for_workers().await;

    assert_eq!(s.switch.dialed(), vec![a]);
    assert_eq!(
        s.book.calls(),
        vec![
            BookCall::AddAddress { addr: a, src: reporter },
            BookCall::MarkGood(a.id),
        ]
    );
}

#[tokio::test]
async fn malformed_list_is_discarded_but_later_lists_are_processed() {
    let s = setup(ReactorConfig::for_testing());
    s.reactor.start().unwrap();
    let peer: Arc<dyn Peer> = Arc::new(MockPeer::inbound(routable_addr(9)));

    let mut addrs: Vec<WireAddress> = [routable_addr(1), routable_addr(2)]
        .iter()
        .map(WireAddress::from)
        .collect();
    addrs[1].port = 70_000;
    s.reactor.receive(Envelope::new(
        peer.clone(),
        PexMessage::AddressList { addrs },
    ));
    assert_eq!(s.reactor.queued(), 0);

    s.reactor
        .receive(Envelope::new(peer, PexMessage::address_list(&[routable_addr(3)])));

    eventually("valid list dialed", || s.book.mark_good_count() == 1).await;
    assert_eq!(s.switch.dialed(), vec![routable_addr(3)]);

    s.reactor.stop().unwrap();
    s.reactor.wait_for_workers().await;
}

#[tokio::test]
async fn shutdown_waits_for_at_most_the_dial_in_flight() {
    let s = setup(ReactorConfig {
        dial_queue_capacity: 8,
        dial_workers: 1,
        strict_routability: true,
    });
    s.switch.set_dial_delay(Duration::from_millis(200));
    s.reactor.start().unwrap();

    gossip(
        &s.reactor,
        routable_addr(9),
        &[routable_addr(1), routable_addr(2), routable_addr(3)],
    );
    eventually("dial in flight", || s.switch.in_flight() == 1).await;

    s.reactor.stop().unwrap();
    tokio::time::timeout(Duration::from_secs(2), s.reactor.wait_for_workers())
        .await
        .expect("workers did not exit");

    assert_eq!(s.switch.dial_count(), 1);
    assert_eq!(s.reactor.queued(), 2);
}

#[tokio::test]
async fn dialed_addresses_land_in_tried_table_of_real_book() {
    let book = Arc::new(AddrBook::new(
        AddrBookConfig::default(),
        Arc::new(SystemTimeSource),
    ));
    let switch = Arc::new(MockSwitch::new(routable_addr(250)));
    let reactor = SeedReactor::new(
        ReactorConfig::for_testing(),
        book.clone(),
        switch.clone(),
        Arc::new(MockExchange::new()),
    )
    .unwrap();
    reactor.start().unwrap();

    gossip(&reactor, routable_addr(9), &[routable_addr(1), routable_addr(2)]);

    eventually("both stored", || book.size() == 2).await;
    eventually("both promoted", || {
        [routable_addr(1), routable_addr(2)]
            .iter()
            .all(|a| book.get(&a.id).map(|e| e.state) == Some(AddressState::Good))
    })
    .await;
    assert_eq!(book.stats().tried_count, 2);

    reactor.stop().unwrap();
    reactor.wait_for_workers().await;
}
