//! Subscription and ledger client configuration.

use crate::types::ScriptPattern;
use std::time::Duration;

pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(4);
pub const DEFAULT_BUFFER_SIZE: usize = 3;
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Polling subscription configuration.
#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    /// Delay between two polls of the channel cell.
    pub polling_interval: Duration,
    /// Capacity of the event channel; a full channel blocks the poll loop.
    pub buffer_size: usize,
    /// What to do when polls keep failing.
    pub poll_failures: PollFailurePolicy,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            polling_interval: DEFAULT_POLLING_INTERVAL,
            buffer_size: DEFAULT_BUFFER_SIZE,
            poll_failures: PollFailurePolicy::default(),
        }
    }
}

/// Handling of failed polls (node unreachable, channel cell not found).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollFailurePolicy {
    /// Skip the tick and poll again at the next interval, indefinitely.
    #[default]
    RetryForever,
    /// Close the subscription after this many failed polls in a row.
    Bounded { max_consecutive: u32 },
}

/// CKB node client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// HTTP JSON-RPC URL of a node with the indexer module enabled.
    pub rpc_url: String,
    /// Code identity of the channel type script (PCTS).
    pub pcts: ScriptPattern,
    /// Cells per `get_cells` page.
    pub page_size: u32,
}

impl ClientConfig {
    pub fn new(rpc_url: impl Into<String>, pcts: ScriptPattern) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            pcts,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HashType;

    #[test]
    fn subscription_config_default() {
        let c = SubscriptionConfig::default();
        assert_eq!(c.polling_interval, Duration::from_secs(4));
        assert_eq!(c.buffer_size, 3);
        assert_eq!(c.poll_failures, PollFailurePolicy::RetryForever);
    }

    #[test]
    fn client_config_new() {
        let pcts = ScriptPattern {
            code_hash: [1; 32],
            hash_type: HashType::Type,
        };
        let c = ClientConfig::new("http://127.0.0.1:8114", pcts);
        assert_eq!(c.rpc_url, "http://127.0.0.1:8114");
        assert_eq!(c.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(c.pcts, pcts);
    }
}
