//! Terminal subscription errors and protocol violations.

use crate::client::ClientError;
use crate::types::BlockNumber;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Observed on-chain behaviour (or configuration) the watcher has no safe way to handle.
/// Never retried: the subscription stops.
#[derive(Debug, Error)]
pub enum ProtocolViolation {
    #[error("channel received update but is not disputed. old status: {previous}, new status: {current}")]
    FundedNotDisputed { previous: String, current: String },

    #[error("channel version decreased from {previous} to {current}")]
    VersionRegression { previous: u64, current: u64 },

    #[error("challenge duration {0} ms is too large, max: {max}", max = i64::MAX)]
    ChallengeDurationOverflow(u64),

    #[error("dispute deadline out of range: start {start}, duration {duration_ms} ms")]
    DeadlineOverflow {
        start: DateTime<Utc>,
        duration_ms: i64,
    },

    #[error("could not get time of block {block} after {attempts} attempts: {source}")]
    BlockTimeUnavailable {
        block: BlockNumber,
        attempts: usize,
        source: ClientError,
    },
}

/// Why a subscription's event stream ended.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("subscription closed by cancellation")]
    Closed,

    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] ProtocolViolation),

    #[error("giving up after {attempts} consecutive failed polls: {source}")]
    PollFailuresExhausted { attempts: u32, source: ClientError },
}

impl SubscriptionError {
    pub fn is_closed(&self) -> bool {
        matches!(self, SubscriptionError::Closed)
    }

    pub fn violation(&self) -> Option<&ProtocolViolation> {
        match self {
            SubscriptionError::ProtocolViolation(v) => Some(v),
            _ => None,
        }
    }
}
