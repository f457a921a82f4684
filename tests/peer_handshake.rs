//! Peer handshake flow and violation-score disconnect semantics through
//! the public `peer` API.

use bedrock_consensus::consensus_params::Network;
use bedrock_consensus::peer::{self, events, HandshakeState, PeerActor, PeerEvent, VersionAnnouncement};

fn version() -> VersionAnnouncement {
    VersionAnnouncement {
        protocol_version: 70016,
        services: 1,
        nonce: 7,
        user_agent: "/bedrock:0.1/".to_string(),
        start_height: 850_000,
        relay: true,
    }
}

#[tokio::test]
async fn well_ordered_handshake_reaches_finished() {
    let (tx, mut rx) = events::channel();
    let mut actor = PeerActor::new(([127, 0, 0, 1], 8333).into(), Network::Mainnet, tx);

    assert!(actor.check_magic(Network::Mainnet.magic()));
    actor.start_handshake();
    actor.receive_version(version());
    actor.receive_verack();

    let status = actor.status();
    assert_eq!(status.handshake_state, HandshakeState::Finished);
    assert_eq!(status.protocol_version, Some(70016));
    assert_eq!(status.violation_score, 0);
    assert!(!status.disconnected);

    // Every mutation above should have produced a StatusChanged event and
    // no Disconnected event.
    let mut saw_status_change = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            PeerEvent::StatusChanged(_) => saw_status_change = true,
            PeerEvent::Disconnected { .. } => panic!("well-behaved handshake must not disconnect"),
        }
    }
    assert!(saw_status_change);
}

#[tokio::test]
async fn two_big_violations_cross_the_disconnect_threshold_exactly_once() {
    let (tx, mut rx) = events::channel();
    let mut actor = PeerActor::new(([127, 0, 0, 1], 8333).into(), Network::Mainnet, tx);

    // Two Big (50) violations sum to exactly the 100-point disconnect
    // threshold, which is inclusive.
    actor.record_malformed_message();
    actor.record_malformed_message();

    assert_eq!(actor.status().violation_score, 100);
    assert!(actor.status().disconnected);

    let disconnect_count = std::iter::from_fn(|| rx.try_recv().ok())
        .filter(|event| matches!(event, PeerEvent::Disconnected { .. }))
        .count();
    assert_eq!(disconnect_count, 1);
}

#[tokio::test]
async fn out_of_order_verack_scores_a_medium_violation_without_finishing() {
    let (tx, _rx) = events::channel();
    let mut actor = PeerActor::new(([127, 0, 0, 1], 8333).into(), Network::Mainnet, tx);

    actor.receive_verack();

    let status = actor.status();
    assert_eq!(status.violation_score, peer::violation::MEDIUM);
    assert_ne!(status.handshake_state, HandshakeState::Finished);
}

#[tokio::test]
async fn wrong_network_magic_is_rejected_and_scored_as_a_big_violation() {
    let (tx, _rx) = events::channel();
    let mut actor = PeerActor::new(([127, 0, 0, 1], 18333).into(), Network::Testnet, tx);

    assert!(!actor.check_magic(Network::Mainnet.magic()));
    assert_eq!(actor.status().violation_score, peer::violation::BIG);
}

#[tokio::test]
async fn repeated_small_violations_below_threshold_do_not_disconnect() {
    let (tx, _rx) = events::channel();
    let mut actor = PeerActor::new(([127, 0, 0, 1], 8333).into(), Network::Mainnet, tx);

    for _ in 0..9 {
        actor.add_violation(peer::violation::SMALL);
    }

    assert_eq!(actor.status().violation_score, 90);
    assert!(!actor.status().disconnected);
}
