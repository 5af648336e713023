//! Diffing of consecutive channel status snapshots.

use crate::error::ProtocolViolation;
use crate::types::ChannelStatus;

/// Outcome of comparing the last seen status with a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// First snapshot of the subscription; becomes the baseline.
    Baseline,
    /// Byte-identical to the previous snapshot.
    Unchanged,
    /// Previous snapshot was not funded; the new one replaces it without an event.
    Funding,
    /// A funded channel entered dispute; an event must be emitted.
    Dispute,
}

impl StatusChange {
    /// True if the new snapshot replaces the previous one.
    pub fn advances_baseline(&self) -> bool {
        !matches!(self, StatusChange::Unchanged)
    }
}

/// Classify the transition `previous -> current`.
pub fn diff(
    previous: Option<&ChannelStatus>,
    current: &ChannelStatus,
) -> Result<StatusChange, ProtocolViolation> {
    let Some(previous) = previous else {
        return Ok(StatusChange::Baseline);
    };
    let previous_bytes = previous.to_bytes();
    let current_bytes = current.to_bytes();
    if previous_bytes == current_bytes {
        return Ok(StatusChange::Unchanged);
    }
    if current.version() < previous.version() {
        return Err(ProtocolViolation::VersionRegression {
            previous: previous.version(),
            current: current.version(),
        });
    }
    if !previous.funded {
        return Ok(StatusChange::Funding);
    }
    if !current.disputed {
        return Err(ProtocolViolation::FundedNotDisputed {
            previous: hex::encode(previous_bytes),
            current: hex::encode(current_bytes),
        });
    }
    Ok(StatusChange::Dispute)
}
