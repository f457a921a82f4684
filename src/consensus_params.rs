//! Network-dependent consensus parameter table (C9)
//!
//! The teacher's `constants.rs` is a flat module of mainnet numeric
//! constants with no notion of "which network" — there's no `Network`
//! enum and no magic bytes at all. This module adds both: a closed
//! `Network` enum and a `ConsensusParams` table keyed off it, so BIP
//! activation state and P2P magic bytes can be looked up per network
//! instead of hard-coded to mainnet everywhere.
//!
//! Magic constants and the `Network` shape are grounded in
//! `other_examples/..._BTCDecoded-reference-node__src-network-protocol.rs`
//! (`BITCOIN_MAGIC_MAINNET/TESTNET/REGTEST`), written by the teacher's
//! own author organization.

use crate::constants::*;

/// Which Bitcoin network a peer or validation context is operating on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

/// P2P message magic bytes (spec §6 "Magic constants").
impl Network {
    pub fn magic(self) -> [u8; 4] {
        match self {
            Network::Mainnet => [0xf9, 0xbe, 0xb4, 0xd9],
            Network::Testnet => [0x0b, 0x11, 0x09, 0x07],
            Network::Regtest => [0xfa, 0xbf, 0xb5, 0xda],
        }
    }

    /// Recover a network from an observed magic, if it matches one of the
    /// three known values. Used by the peer handshake to reject an
    /// unrecognized magic as a protocol violation (spec §4.6 "bad magic").
    pub fn from_magic(magic: [u8; 4]) -> Option<Self> {
        [Network::Mainnet, Network::Testnet, Network::Regtest].into_iter().find(|&n| n.magic() == magic)
    }
}

/// BIP activation heights and per-network numeric limits. `None` means
/// "not yet active"; Regtest typically sets every gate to `Some(0)` so
/// test chains exercise the full rule set from genesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsensusParams {
    pub network: Network,
    pub max_money: i64,
    pub halving_interval: u64,
    pub initial_subsidy: i64,
    pub difficulty_adjustment_interval: u64,
    pub target_time_per_block: u64,
    pub max_block_serialized_size: usize,
    pub max_block_weight: usize,
    pub max_block_sigops_cost: u64,
    pub coinbase_maturity: u64,
    /// BIP16 (P2SH) activation height.
    pub bip16_height: Option<u32>,
    /// BIP66 (strict DER) activation height.
    pub bip66_height: Option<u32>,
    /// BIP65 (OP_CHECKLOCKTIMEVERIFY) activation height.
    pub bip65_height: Option<u32>,
    /// BIP112 (OP_CHECKSEQUENCEVERIFY) activation height.
    pub bip112_height: Option<u32>,
    /// BIP141/143 (segwit) activation height.
    pub segwit_height: Option<u32>,
    /// BIP341/342 (Taproot) activation height.
    pub taproot_height: Option<u32>,
}

const MAINNET: ConsensusParams = ConsensusParams {
    network: Network::Mainnet,
    max_money: MAX_MONEY,
    halving_interval: HALVING_INTERVAL,
    initial_subsidy: INITIAL_SUBSIDY,
    difficulty_adjustment_interval: DIFFICULTY_ADJUSTMENT_INTERVAL,
    target_time_per_block: TARGET_TIME_PER_BLOCK,
    max_block_serialized_size: MAX_BLOCK_SERIALIZED_SIZE,
    max_block_weight: MAX_BLOCK_WEIGHT,
    max_block_sigops_cost: MAX_BLOCK_SIGOPS_COST,
    coinbase_maturity: COINBASE_MATURITY,
    bip16_height: Some(173_805),
    bip66_height: Some(363_725),
    bip65_height: Some(388_381),
    bip112_height: Some(419_328),
    segwit_height: Some(481_824),
    taproot_height: Some(709_632),
};

const TESTNET: ConsensusParams = ConsensusParams {
    network: Network::Testnet,
    bip16_height: Some(0),
    bip66_height: Some(330_776),
    bip65_height: Some(581_885),
    bip112_height: Some(770_112),
    segwit_height: Some(834_624),
    taproot_height: Some(1_864_000),
    ..MAINNET
};

const REGTEST: ConsensusParams = ConsensusParams {
    network: Network::Regtest,
    bip16_height: Some(0),
    bip66_height: Some(0),
    bip65_height: Some(0),
    bip112_height: Some(0),
    segwit_height: Some(0),
    taproot_height: Some(0),
    ..MAINNET
};

impl ConsensusParams {
    /// Look up the static parameter table for a network.
    pub fn for_network(network: Network) -> &'static ConsensusParams {
        match network {
            Network::Mainnet => &MAINNET,
            Network::Testnet => &TESTNET,
            Network::Regtest => &REGTEST,
        }
    }

    /// Derive the script evaluation flags active at `height` on this
    /// network — the table C5 needs to decide which BIP gates apply to a
    /// given block (spec §10 "consumed by C5").
    pub fn script_flags_at(&self, height: u32) -> crate::types::ScriptFlags {
        let active = |gate: Option<u32>| gate.is_some_and(|h| height >= h);
        crate::types::ScriptFlags {
            p2sh: active(self.bip16_height),
            strict_der: active(self.bip66_height),
            checklocktimeverify: active(self.bip65_height),
            checksequenceverify: active(self.bip112_height),
            segwit: active(self.segwit_height),
            bip143: active(self.segwit_height),
            taproot: active(self.taproot_height),
            minimal_data: active(self.bip16_height),
            clean_stack: active(self.bip16_height),
            discourage_upgradable_nops: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_are_distinct_and_round_trip() {
        assert_eq!(Network::from_magic(Network::Mainnet.magic()), Some(Network::Mainnet));
        assert_eq!(Network::from_magic(Network::Testnet.magic()), Some(Network::Testnet));
        assert_eq!(Network::from_magic(Network::Regtest.magic()), Some(Network::Regtest));
        assert_eq!(Network::from_magic([0, 0, 0, 0]), None);
    }

    #[test]
    fn regtest_activates_every_gate_from_genesis() {
        let params = ConsensusParams::for_network(Network::Regtest);
        let flags = params.script_flags_at(0);
        assert!(flags.p2sh);
        assert!(flags.segwit);
        assert!(flags.taproot);
    }

    #[test]
    fn mainnet_segwit_not_active_before_activation_height() {
        let params = ConsensusParams::for_network(Network::Mainnet);
        let before = params.script_flags_at(481_823);
        let after = params.script_flags_at(481_824);
        assert!(!before.segwit);
        assert!(after.segwit);
    }

    #[test]
    fn for_network_returns_matching_network() {
        assert_eq!(ConsensusParams::for_network(Network::Mainnet).network, Network::Mainnet);
        assert_eq!(ConsensusParams::for_network(Network::Testnet).network, Network::Testnet);
    }
}
