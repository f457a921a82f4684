//! Peer connection actor and NodeStatus state machine (C8)
//!
//! A `PeerActor` is the sole owner and mutator of one peer's
//! `NodeStatus` (spec §5 ownership rule). Every mutation emits a
//! [`events::PeerEvent`] so the peer manager, UI bindings, and
//! integration tests can observe state without ever touching the
//! actor's internals directly.
//!
//! Grounded on `other_examples/..._BTCDecoded-reference-node__src-network-protocol.rs`
//! for the magic-byte/version-message shape this module validates
//! against; the violation-score/disconnect-once/observable-event design
//! itself has no teacher counterpart and is built directly from spec
//! §4.6 and §9.

pub mod events;
pub mod node_status;

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::consensus_params::Network;
pub use events::{DisconnectReason, PeerEvent, StatusChange};
pub use node_status::{violation, HandshakeState, NodeStatus};

/// Default handshake deadline (spec §9 "default 60 s").
pub const DEFAULT_HANDSHAKE_DEADLINE: Duration = Duration::from_secs(60);

/// Claimed peer identity carried by a version message — the subset of
/// `VersionMessage` (see the grounding file) this crate actually
/// validates; the full P2P message catalogue is out of scope here.
#[derive(Debug, Clone)]
pub struct VersionAnnouncement {
    pub protocol_version: i32,
    pub services: u64,
    pub nonce: u64,
    pub user_agent: String,
    pub start_height: i32,
    pub relay: bool,
}

/// Owns one peer's `NodeStatus` and emits observable events for every
/// mutation. Not `Clone` — ownership is meant to be exclusive.
pub struct PeerActor {
    status: NodeStatus,
    network: Network,
    events: mpsc::Sender<PeerEvent>,
    handshake_deadline: Duration,
    handshake_started_at: Option<Instant>,
}

impl PeerActor {
    pub fn new(remote_address: SocketAddr, network: Network, events: mpsc::Sender<PeerEvent>) -> Self {
        Self {
            status: NodeStatus::new(remote_address),
            network,
            events,
            handshake_deadline: DEFAULT_HANDSHAKE_DEADLINE,
            handshake_started_at: None,
        }
    }

    /// Read-only snapshot for external observers (spec §5: "external
    /// readers obtain snapshots ... never by taking a lock on internal
    /// fields" — here that's a plain clone, no lock exists to take).
    pub fn status(&self) -> NodeStatus {
        self.status.clone()
    }

    fn emit(&self, field: &'static str, new_value: String) {
        let change = StatusChange { peer: self.status.remote_address, field, new_value };
        let _ = self.events.try_send(PeerEvent::StatusChanged(change));
    }

    fn emit_disconnect(&self, reason: DisconnectReason) {
        let _ = self.events.try_send(PeerEvent::Disconnected { peer: self.status.remote_address, reason });
    }

    /// Bump the violation score, emitting a status-change event and, if
    /// this bump crosses `DisconnectAt`, exactly one disconnect event.
    pub fn add_violation(&mut self, amount: u32) {
        let disconnected = self.status.add_violation(amount);
        self.emit("violation_score", self.status.violation_score.to_string());
        if disconnected {
            self.emit_disconnect(DisconnectReason::ViolationThreshold);
        }
    }

    pub fn mark_disconnected(&mut self) {
        if self.status.mark_disconnected() {
            self.emit("disconnected", "true".to_string());
            self.emit_disconnect(DisconnectReason::Requested);
        }
    }

    pub fn set_send_compact_ver(&mut self, version: u64) {
        if self.status.set_send_compact_ver(version) {
            self.emit("send_compact_ver", version.to_string());
        }
    }

    pub fn stamp_last_seen(&mut self, timestamp: u64) {
        self.status.stamp_last_seen(timestamp);
        self.emit("last_seen", timestamp.to_string());
    }

    /// Validate an observed magic against this peer's network. A
    /// mismatch is an "obviously hostile message" (spec §4.6) and adds
    /// a Big violation.
    pub fn check_magic(&mut self, magic: [u8; 4]) -> bool {
        if magic == self.network.magic() {
            true
        } else {
            self.add_violation(violation::BIG);
            false
        }
    }

    /// Begin the handshake clock. Call once, when the actor sends or
    /// receives its first version message.
    pub fn start_handshake(&mut self) {
        self.handshake_started_at = Some(Instant::now());
        self.set_handshake_state(HandshakeState::SentVersion);
    }

    fn set_handshake_state(&mut self, state: HandshakeState) {
        self.status.set_handshake_state(state);
        self.emit("handshake_state", format!("{:?}", state));
    }

    /// Record an incoming version announcement. Out-of-order receipt
    /// (handshake not in `None`/`SentVersion`) is a Medium violation per
    /// spec §4.6; well-ordered receipt advances the state machine.
    pub fn receive_version(&mut self, version: VersionAnnouncement) {
        match self.status.handshake_state {
            HandshakeState::None | HandshakeState::SentVersion => {
                self.status.protocol_version = Some(version.protocol_version);
                self.status.services = version.services;
                self.status.nonce = version.nonce;
                self.status.user_agent = version.user_agent;
                self.status.start_height = version.start_height;
                self.status.relay = version.relay;
                self.emit("protocol_version", version.protocol_version.to_string());
                let next = match self.status.handshake_state {
                    HandshakeState::None => HandshakeState::ReceivedVersion,
                    _ => HandshakeState::VersionReceived,
                };
                self.set_handshake_state(next);
            }
            _ => self.add_violation(violation::MEDIUM),
        }
    }

    /// Record the peer's verack, completing the handshake. Receiving it
    /// before a version exchange has reached `VersionReceived`/
    /// `ReceivedVersion` is out-of-order (Medium violation).
    pub fn receive_verack(&mut self) {
        match self.status.handshake_state {
            HandshakeState::ReceivedVersion | HandshakeState::VersionReceived => {
                self.set_handshake_state(HandshakeState::Finished);
            }
            _ => self.add_violation(violation::MEDIUM),
        }
    }

    /// Check the handshake deadline. If it has not finished and the
    /// deadline has elapsed, force a Big violation and disconnect
    /// (spec §9 "exceeding it forces a Big violation and disconnect").
    pub fn check_handshake_timeout(&mut self) {
        if self.status.handshake_state == HandshakeState::Finished {
            return;
        }
        if let Some(started) = self.handshake_started_at {
            if started.elapsed() >= self.handshake_deadline {
                self.add_violation(violation::BIG);
                self.mark_disconnected();
            }
        }
    }

    /// Record an oversized or checksum-mismatched message — always
    /// hostile regardless of handshake progress (spec §9's
    /// "don't special-case the skipped branch" principle applied to
    /// violation accounting: scored the same whether or not the peer is
    /// already mid-disconnect).
    pub fn record_malformed_message(&mut self) {
        self.add_violation(violation::BIG);
    }
}
