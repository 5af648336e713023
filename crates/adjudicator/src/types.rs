//! On-chain channel types: identifiers, parameters, constants, and status.
//!
//! The byte layout of everything stored on-chain lives in [crate::encoding].

use crate::encoding;
use crate::wallet::{BackendConfig, Participant, WalletError};
use anyhow::Context;
use serde::{Serialize, Serializer};
use std::fmt;

/// Block height at which a cell was created.
pub type BlockNumber = u64;

/// Stable off-chain name of a channel (hash of its [ChannelParams]).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChannelId(pub [u8; 32]);

impl ChannelId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse a 32-byte id from hex, with or without `0x`.
    pub fn from_hex(s: &str) -> anyhow::Result<Self> {
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s)).context("parse channel id hex")?;
        let id: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| anyhow::anyhow!("Expected 32 bytes, got {}", b.len()))?;
        Ok(Self(id))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelId({})", self)
    }
}

impl Serialize for ChannelId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Reference to a transaction output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OutPoint {
    pub tx_hash: [u8; 32],
    pub index: u32,
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}:{}", hex::encode(self.tx_hash), self.index)
    }
}

/// Identity of the on-chain record instance backing a channel: the out point
/// consumed when the channel was started (the "thread token").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChannelToken(pub OutPoint);

impl fmt::Display for ChannelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// CKB script hash type. Discriminants are the on-chain byte values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HashType {
    Data = 0,
    Type = 1,
    Data1 = 2,
    Data2 = 4,
}

impl HashType {
    pub fn from_u8(n: u8) -> Option<Self> {
        match n {
            0 => Some(HashType::Data),
            1 => Some(HashType::Type),
            2 => Some(HashType::Data1),
            4 => Some(HashType::Data2),
            _ => None,
        }
    }

    /// Name used by the node's JSON-RPC.
    pub fn as_str(&self) -> &'static str {
        match self {
            HashType::Data => "data",
            HashType::Type => "type",
            HashType::Data1 => "data1",
            HashType::Data2 => "data2",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "data" => Some(HashType::Data),
            "type" => Some(HashType::Type),
            "data1" => Some(HashType::Data1),
            "data2" => Some(HashType::Data2),
            _ => None,
        }
    }
}

/// Code identity of a script, without args. Used to search for all cells of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptPattern {
    pub code_hash: [u8; 32],
    pub hash_type: HashType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub code_hash: [u8; 32],
    pub hash_type: HashType,
    pub args: Vec<u8>,
}

impl Script {
    pub fn matches(&self, pattern: &ScriptPattern) -> bool {
        self.code_hash == pattern.code_hash && self.hash_type == pattern.hash_type
    }
}

/// Immutable channel configuration fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelParams {
    /// Compressed secp256k1 public key of the proposer.
    pub party_a: [u8; 33],
    pub party_b: [u8; 33],
    pub nonce: [u8; 32],
    /// Challenge window in milliseconds.
    pub challenge_duration: u64,
    pub is_ledger_channel: bool,
    pub is_virtual_channel: bool,
}

impl ChannelParams {
    /// Blake2b-256 over the encoded params.
    pub fn channel_id(&self) -> ChannelId {
        ChannelId(encoding::blake2b_256(&encoding::encode_params(self)))
    }

    /// Decode both parties with the given backend.
    pub fn participants(&self, backend: &BackendConfig) -> Result<[Participant; 2], WalletError> {
        Ok([
            backend.addresses.decode_address(&self.party_a)?,
            backend.addresses.decode_address(&self.party_b)?,
        ])
    }
}

/// PCTS script args: everything about a channel that never changes on-chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConstants {
    pub params: ChannelParams,
    pub pcls_code_hash: [u8; 32],
    pub pcls_hash_type: HashType,
    pub pfls_code_hash: [u8; 32],
    pub pfls_hash_type: HashType,
    pub pfls_min_capacity: u64,
    pub thread_token: ChannelToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelState {
    pub channel_id: ChannelId,
    pub version: u64,
    pub balances: [u64; 2],
    pub is_final: bool,
    pub app_data: Vec<u8>,
}

/// Mutable part of a channel cell (its output data). This is what gets polled and diffed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStatus {
    pub state: ChannelState,
    pub funded: bool,
    pub disputed: bool,
}

impl ChannelStatus {
    /// Canonical on-chain bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        encoding::encode_status(self)
    }

    pub fn version(&self) -> u64 {
        self.state.version
    }
}

/// One discovered channel cell: constants and status always come from the same cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveChannel {
    /// Block in which the cell was created.
    pub block_number: BlockNumber,
    pub constants: ChannelConstants,
    pub status: ChannelStatus,
}
