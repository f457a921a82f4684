//! Per-peer handshake and reputation record (C8)
//!
//! `NodeStatus` is plain data; all the invariants around it (monotonic
//! `send_compact_ver`, exactly-once disconnect, change notification) are
//! enforced by the setters here and driven by `peer::PeerActor`, the
//! record's sole owner.

use std::net::SocketAddr;

/// Handshake progression. Transitions are strictly:
/// `None -> (SentVersion|ReceivedVersion) -> VersionReceived -> Finished`.
/// Any other transition is an out-of-order message (Medium violation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    None,
    SentVersion,
    ReceivedVersion,
    VersionReceived,
    Finished,
}

/// Violation point values (spec §4.6). Each bump is an independent event;
/// callers choose the severity that matches the infraction.
pub mod violation {
    pub const SMALL: u32 = 10;
    pub const MEDIUM: u32 = 20;
    pub const BIG: u32 = 50;
    /// Reaching this (inclusive) forces disconnect, fired exactly once.
    pub const DISCONNECT_AT: u32 = 100;
}

/// A peer's handshake and reputation state.
///
/// Field mutations go only through the methods below, each of which
/// reports whether it crossed the disconnect threshold so the owning
/// actor can emit the disconnect event exactly once.
#[derive(Debug, Clone)]
pub struct NodeStatus {
    pub remote_address: SocketAddr,
    pub protocol_version: Option<i32>,
    pub services: u64,
    pub nonce: u64,
    pub user_agent: String,
    pub start_height: i32,
    pub relay: bool,
    pub fee_filter: Option<i64>,
    pub send_compact_ver: u64,
    pub send_compact: bool,
    pub last_seen: u64,
    pub handshake_state: HandshakeState,
    pub violation_score: u32,
    pub disconnected: bool,
}

impl NodeStatus {
    pub fn new(remote_address: SocketAddr) -> Self {
        Self {
            remote_address,
            protocol_version: None,
            services: 0,
            nonce: 0,
            user_agent: String::new(),
            start_height: 0,
            relay: true,
            fee_filter: None,
            send_compact_ver: 0,
            send_compact: false,
            last_seen: 0,
            handshake_state: HandshakeState::None,
            violation_score: 0,
            disconnected: false,
        }
    }

    /// Bump the violation score by `amount`. Returns `true` exactly the
    /// first time the cumulative score reaches `DISCONNECT_AT` — the
    /// caller fires the disconnect event on that transition and never
    /// again, even if later bumps keep the score saturated above it.
    pub fn add_violation(&mut self, amount: u32) -> bool {
        let was_over = self.violation_score >= violation::DISCONNECT_AT;
        self.violation_score = self.violation_score.saturating_add(amount);
        let now_over = self.violation_score >= violation::DISCONNECT_AT;
        if now_over && !was_over {
            self.disconnected = true;
            true
        } else {
            false
        }
    }

    /// Explicitly mark disconnected. Returns `true` only on the
    /// false-to-true transition (the event fires at most once), matching
    /// `add_violation`'s "disconnect event fires at most once" invariant.
    pub fn mark_disconnected(&mut self) -> bool {
        if self.disconnected {
            false
        } else {
            self.disconnected = true;
            true
        }
    }

    /// Monotonic `SendCompactVer`: assignment with a lesser value is
    /// silently ignored (spec §4.6, §9 Open Question — "monotonic update
    /// is authoritative"). Returns whether the value actually changed.
    pub fn set_send_compact_ver(&mut self, version: u64) -> bool {
        if version > self.send_compact_ver {
            self.send_compact_ver = version;
            true
        } else {
            false
        }
    }

    pub fn stamp_last_seen(&mut self, timestamp: u64) {
        self.last_seen = timestamp;
    }

    pub fn set_handshake_state(&mut self, state: HandshakeState) {
        self.handshake_state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status() -> NodeStatus {
        NodeStatus::new(([127, 0, 0, 1], 8333).into())
    }

    #[test]
    fn two_big_violations_disconnect_exactly_once() {
        let mut s = status();
        assert!(!s.add_violation(violation::BIG));
        assert!(s.add_violation(violation::BIG));
        assert!(s.disconnected);
        // A further bump must not re-fire the event.
        assert!(!s.add_violation(violation::BIG));
    }

    #[test]
    fn send_compact_ver_is_monotonic() {
        let mut s = status();
        assert!(s.set_send_compact_ver(2));
        assert!(!s.set_send_compact_ver(1));
        assert_eq!(s.send_compact_ver, 2);
        assert!(s.set_send_compact_ver(3));
        assert_eq!(s.send_compact_ver, 3);
    }

    #[test]
    fn mark_disconnected_fires_once() {
        let mut s = status();
        assert!(s.mark_disconnected());
        assert!(!s.mark_disconnected());
    }

    #[test]
    fn violation_sum_reaching_threshold_disconnects() {
        let mut s = status();
        assert!(!s.add_violation(violation::SMALL));
        assert!(!s.add_violation(violation::MEDIUM));
        assert!(!s.add_violation(violation::MEDIUM));
        // 10 + 20 + 20 = 50, still below 100.
        assert!(!s.disconnected);
        assert!(s.add_violation(violation::BIG));
        // 50 + 50 = 100, hits the threshold.
        assert!(s.disconnected);
    }
}
