//! Ledger access seams.
//!
//! - [CellSource]: generic ledger reads (live cells by script pattern, block time).
//! - [LedgerClient]: channel-level queries the subscription needs; implemented on top
//!   of a cell source by [crate::discovery::Discovery].

use crate::types::{BlockNumber, ChannelId, ChannelToken, LiveChannel, OutPoint, Script, ScriptPattern};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Nothing on the ledger matches the query. Usually transient for a subscription
    /// (channel not started yet, or the cell is being replaced).
    #[error("not found: {0}")]
    NotFound(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("decode error: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }
}

/// A live (unspent) cell as returned by the node's indexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveCell {
    pub out_point: OutPoint,
    pub type_script: Option<Script>,
    pub output_data: Vec<u8>,
    /// Block in which the cell was created.
    pub block_number: BlockNumber,
}

#[async_trait]
pub trait CellSource: Send + Sync {
    /// All live cells whose type script matches `pattern` (any args), newest first.
    async fn live_cells(&self, pattern: &ScriptPattern) -> Result<Vec<LiveCell>, ClientError>;

    /// Header timestamp of `block`.
    async fn block_timestamp(&self, block: BlockNumber) -> Result<DateTime<Utc>, ClientError>;
}

/// Channel lookups against the current ledger tip.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// The live channel cell pinned by `token`.
    async fn find_by_token(&self, token: &ChannelToken) -> Result<LiveChannel, ClientError>;

    /// A live channel cell whose state carries `id`. If several exist, any one of them.
    async fn find_by_id(&self, id: &ChannelId) -> Result<LiveChannel, ClientError>;

    async fn resolve_block_time(&self, block: BlockNumber) -> Result<DateTime<Utc>, ClientError>;
}

#[async_trait]
impl<T: CellSource + ?Sized> CellSource for Arc<T> {
    async fn live_cells(&self, pattern: &ScriptPattern) -> Result<Vec<LiveCell>, ClientError> {
        (**self).live_cells(pattern).await
    }

    async fn block_timestamp(&self, block: BlockNumber) -> Result<DateTime<Utc>, ClientError> {
        (**self).block_timestamp(block).await
    }
}
