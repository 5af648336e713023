//! Events published to the channel-protocol engine.

use crate::types::ChannelId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Absolute point in time after which a dispute can be resolved.
///
/// Kept as a deadline rather than a countdown so consumers can derive the remaining
/// time at any later instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Timeout {
    pub deadline: DateTime<Utc>,
}

impl Timeout {
    pub fn at(deadline: DateTime<Utc>) -> Self {
        Self { deadline }
    }

    pub fn is_elapsed(&self) -> bool {
        self.is_elapsed_at(Utc::now())
    }

    pub fn is_elapsed_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.remaining_at(Utc::now())
    }

    /// Time left at `now`; zero once elapsed.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        (self.deadline - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Sleep until the deadline has passed.
    pub async fn wait(&self) {
        tokio::time::sleep(self.remaining()).await;
    }
}

/// A dispute was registered on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisteredEvent {
    pub channel_id: ChannelId,
    /// Version of the disputed state.
    pub version: u64,
    pub timeout: Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdjudicatorEvent {
    Registered(RegisteredEvent),
}

impl AdjudicatorEvent {
    pub fn channel_id(&self) -> ChannelId {
        match self {
            AdjudicatorEvent::Registered(ev) => ev.channel_id,
        }
    }

    pub fn version(&self) -> u64 {
        match self {
            AdjudicatorEvent::Registered(ev) => ev.version,
        }
    }

    pub fn timeout(&self) -> &Timeout {
        match self {
            AdjudicatorEvent::Registered(ev) => &ev.timeout,
        }
    }
}
