//! Observable peer events (C8)
//!
//! Every `NodeStatus` mutation emits a `StatusChange` so the peer
//! manager and integration tests can observe state without taking a
//! lock on the actor's internals (spec §5 ownership rule: external
//! readers obtain snapshots through the change-notification channel).

use std::net::SocketAddr;

use tokio::sync::mpsc;

/// A single field mutation on a peer's `NodeStatus`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub peer: SocketAddr,
    pub field: &'static str,
    pub new_value: String,
}

/// Why a peer was disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Violation score reached `DisconnectAt`.
    ViolationThreshold,
    /// Handshake did not finish within the configured deadline.
    HandshakeTimeout,
    /// Caller requested disconnect directly (no rule violation implied).
    Requested,
}

/// An event emitted by a peer actor.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    StatusChanged(StatusChange),
    Disconnected { peer: SocketAddr, reason: DisconnectReason },
}

/// Default channel capacity. The peer manager is expected to drain this
/// promptly; a bounded channel gives backpressure instead of unbounded
/// memory growth if it falls behind.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Construct a peer event channel. The sender side is handed to a
/// `PeerActor`; the receiver side is handed to whatever subscribes
/// (peer manager, integration test, UI binding).
pub fn channel() -> (mpsc::Sender<PeerEvent>, mpsc::Receiver<PeerEvent>) {
    mpsc::channel(EVENT_CHANNEL_CAPACITY)
}
