use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::domain::{DialError, ExchangeError, PexMessage};
use crate::ports::{Envelope, Peer, PexProtocol};
use crate::testing::{routable_addr, BookCall, MockPeer, MockSwitch, RecordingAddressBook};

fn setup(config: ExchangeConfig) -> (Arc<RecordingAddressBook>, Arc<MockSwitch>, SeedExchange) {
    let book = Arc::new(RecordingAddressBook::new());
    let switch = Arc::new(MockSwitch::new(routable_addr(250)));
    let exchange = SeedExchange::new(config, book.clone(), switch.clone());
    (book, switch, exchange)
}

fn request_from(peer: &Arc<MockPeer>) -> Envelope {
    Envelope::new(peer.clone() as Arc<dyn Peer>, PexMessage::AddressRequest)
}

#[test]
fn test_address_request_replies_and_disconnects_inbound() {
    let (book, switch, exchange) = setup(ExchangeConfig::default());
    book.set_selection(vec![routable_addr(1), routable_addr(2)]);
    let requester = Arc::new(MockPeer::inbound(routable_addr(9)));

    exchange.receive(request_from(&requester));

    assert_eq!(
        requester.sent(),
        vec![PexMessage::address_list(&[routable_addr(1), routable_addr(2)])]
    );
    assert_eq!(switch.stopped_peers().len(), 1);
    assert_eq!(switch.stopped_peers()[0].0, requester.id());
}

#[test]
fn test_address_request_from_outbound_peer_keeps_connection() {
    let (_book, switch, exchange) = setup(ExchangeConfig::default());
    let requester = Arc::new(MockPeer::outbound(routable_addr(9)));

    exchange.receive(request_from(&requester));

    assert_eq!(requester.sent().len(), 1);
    assert!(switch.stopped_peers().is_empty());
}

#[test]
fn test_repeated_address_request_is_rate_limited() {
    let (_book, switch, exchange) = setup(ExchangeConfig::default());
    let requester = Arc::new(MockPeer::outbound(routable_addr(9)));

    exchange.receive(request_from(&requester));
    exchange.receive(request_from(&requester));

    assert_eq!(requester.sent().len(), 1);
    assert_eq!(
        switch.stopped_peers(),
        vec![(requester.id(), "too many address requests".to_string())]
    );
}

#[test]
fn test_remove_peer_resets_rate_limit() {
    let (_book, _switch, exchange) = setup(ExchangeConfig::default());
    let requester = Arc::new(MockPeer::outbound(routable_addr(9)));

    exchange.receive(request_from(&requester));
    exchange.remove_peer(&*requester, "closed");
    exchange.receive(request_from(&requester));

    assert_eq!(requester.sent().len(), 2);
}

#[test]
fn test_inbound_peer_listen_address_is_stored() {
    let (book, _switch, exchange) = setup(ExchangeConfig::default());
    let addr = routable_addr(3);

    exchange.add_peer(Arc::new(MockPeer::inbound(addr)));

    assert_eq!(book.calls(), vec![BookCall::AddAddress { addr, src: addr }]);
}

#[test]
fn test_outbound_peer_is_asked_for_addresses_when_book_needs_more() {
    let (book, _switch, exchange) = setup(ExchangeConfig::default());

    let satisfied = Arc::new(MockPeer::outbound(routable_addr(3)));
    exchange.add_peer(satisfied.clone());
    assert!(satisfied.sent().is_empty());

    book.set_need_more(true);
    let hungry = Arc::new(MockPeer::outbound(routable_addr(4)));
    exchange.add_peer(hungry.clone());
    assert_eq!(hungry.sent(), vec![PexMessage::AddressRequest]);
    assert!(book.calls().is_empty());
}

#[tokio::test]
async fn test_empty_book_dials_seeds() {
    let seeds = vec![routable_addr(1), routable_addr(2)];
    let (_book, switch, exchange) = setup(ExchangeConfig::with_seeds(seeds.clone()));

    exchange.ensure_peers().await;

    let mut dialed = switch.dialed();
    dialed.sort_by_key(|a| a.id);
    assert_eq!(dialed, seeds);
}

#[tokio::test]
async fn test_crawl_marks_failed_dials() {
    let (book, switch, exchange) = setup(ExchangeConfig::default());
    book.set_selection(vec![routable_addr(1)]);
    let good = routable_addr(5);
    let bad = routable_addr(6);
    book.push_pick(good);
    book.push_pick(bad);
    switch.fail_dials_to(bad);

    exchange.ensure_peers().await;

    assert_eq!(switch.dial_count(), 2);
    assert_eq!(book.calls(), vec![BookCall::MarkAttempt(bad)]);
}

#[tokio::test]
async fn test_crawl_does_not_mark_refused_dials() {
    let (book, switch, exchange) = setup(ExchangeConfig::default());
    book.set_selection(vec![routable_addr(1)]);
    let capped = routable_addr(5);
    book.push_pick(capped);
    switch.refuse_dials_to(capped, DialError::LimitReached);

    exchange.ensure_peers().await;

    assert_eq!(switch.dial_count(), 1);
    assert!(book.calls().is_empty());
}

#[tokio::test]
async fn test_lingering_outbound_peers_are_disconnected() {
    let (book, switch, exchange) = setup(ExchangeConfig::default());
    book.set_selection(vec![routable_addr(1)]);
    let old = MockPeer::outbound(routable_addr(7)).with_connected_for(Duration::from_secs(600));
    let fresh = MockPeer::outbound(routable_addr(8));
    switch.add_peer(Arc::new(old));
    switch.add_peer(Arc::new(fresh));

    exchange.ensure_peers().await;

    assert_eq!(
        switch.stopped_peers(),
        vec![(routable_addr(7).id, "crawl complete".to_string())]
    );
}

#[tokio::test]
async fn test_outbound_peers_asked_for_addresses_each_round() {
    let (book, switch, exchange) = setup(ExchangeConfig::default());
    book.set_selection(vec![routable_addr(1)]);
    book.set_need_more(true);
    let peer = Arc::new(MockPeer::outbound(routable_addr(7)));
    switch.add_peer(peer.clone());

    exchange.ensure_peers().await;

    assert_eq!(peer.sent(), vec![PexMessage::AddressRequest]);
}

#[tokio::test]
async fn test_lifecycle() {
    let (_book, _switch, exchange) = setup(ExchangeConfig::default());
    assert_eq!(exchange.stop(), Err(ExchangeError::NotRunning));

    exchange.start().unwrap();
    assert!(exchange.is_running());
    assert_eq!(exchange.start(), Err(ExchangeError::AlreadyStarted));

    exchange.stop().unwrap();
    assert!(!exchange.is_running());
    assert_eq!(exchange.stop(), Err(ExchangeError::NotRunning));
    assert_eq!(exchange.start(), Err(ExchangeError::NotRunning));
}

#[test]
fn test_start_outside_runtime_fails() {
    let (_book, _switch, exchange) = setup(ExchangeConfig::default());
    assert_eq!(exchange.start(), Err(ExchangeError::NoRuntime));
}
