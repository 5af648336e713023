//! Off-chain adjudicator watcher for two-party payment channels on a cell-based ledger.
//!
//! - **Discovery**: finds the live channel cell (PCTS) by channel id or thread token,
//!   on top of any [CellSource] (e.g. [CkbRpcClient], the node's JSON-RPC).
//! - **PollingSubscription**: polls that cell, diffs successive statuses, and publishes
//!   [AdjudicatorEvent]s when a funded channel enters dispute, with the dispute
//!   deadline computed from the block time and the challenge duration.

pub mod client;
pub mod config;
pub mod differ;
pub mod discovery;
pub mod encoding;
pub mod error;
pub mod event;
pub mod rpc;
pub mod subscription;
pub mod timeout;
pub mod types;
pub mod wallet;

pub use client::{CellSource, ClientError, LedgerClient, LiveCell};
pub use config::{ClientConfig, PollFailurePolicy, SubscriptionConfig};
pub use differ::{diff, StatusChange};
pub use discovery::Discovery;
pub use error::{ProtocolViolation, SubscriptionError};
pub use event::{AdjudicatorEvent, RegisteredEvent, Timeout};
pub use rpc::CkbRpcClient;
pub use subscription::PollingSubscription;
pub use types::{
    BlockNumber, ChannelConstants, ChannelId, ChannelParams, ChannelState, ChannelStatus,
    ChannelToken, HashType, LiveChannel, OutPoint, Script, ScriptPattern,
};
pub use wallet::{BackendConfig, Participant};

/// Discovery over a CKB node.
pub type CkbLedger = Discovery<CkbRpcClient>;

/// Connect a [CkbLedger] using `config`.
pub fn ckb_ledger(config: &ClientConfig) -> Result<CkbLedger, ClientError> {
    Ok(Discovery::new(CkbRpcClient::from_config(config)?, config.pcts))
}
